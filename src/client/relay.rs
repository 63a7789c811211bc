//! Relay Stream Client
//!
//! Holds the session's one relay connection over the Server-Sent Events
//! transport: a long-lived `GET /realtime/stream` downstream, and one
//! `POST /realtime/{connectionId}/events` per upstream client event.
//!
//! A lost stream is reopened with exponential backoff. Every new stream
//! gets a new connection id, so room joins must be replayed; the
//! `Reconnected` notice tells the session controller to do that.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::client::api::ChatApi;
use crate::client::{ClientError, ClientResult};
use crate::shared::event::{ClientEvent, Connected, ServerEvent};

/// What the relay client reports to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayNotice {
    /// First stream of the session is up
    Connected(Connected),
    /// A later stream is up; rooms must be re-joined
    Reconnected(Connected),
    Event(ServerEvent),
    /// The stream was lost; a reconnect is pending
    Disconnected,
}

/// Exponential reconnect delay
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; doubles the next one up to the cap
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(self.current * 2, self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Incremental `text/event-stream` parser
///
/// Yields the joined `data:` lines of each complete event. Event names,
/// ids and comments are skipped; the JSON envelope carries the name.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut ready = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(|c| c == '\n' || c == '\r');

            if line.is_empty() {
                if !self.data.is_empty() {
                    ready.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
        }

        ready
    }
}

type SharedConnection = Arc<RwLock<Option<Connected>>>;

/// Handle to the background relay task
#[derive(Debug)]
pub struct RelayClient {
    api: ChatApi,
    connection: SharedConnection,
    task: JoinHandle<()>,
}

impl RelayClient {
    /// Start the relay task. Notices arrive on the returned receiver;
    /// dropping it stops the task.
    pub fn spawn(api: ChatApi) -> (Self, mpsc::UnboundedReceiver<RelayNotice>) {
        let (notices, receiver) = mpsc::unbounded_channel();
        let connection: SharedConnection = Arc::new(RwLock::new(None));
        let task = tokio::spawn(run_relay(api.clone(), connection.clone(), notices));
        (
            Self {
                api,
                connection,
                task,
            },
            receiver,
        )
    }

    /// The live connection, if any
    pub async fn connection(&self) -> Option<Connected> {
        *self.connection.read().await
    }

    /// Send one client event on the live connection
    pub async fn send(&self, event: ClientEvent) -> ClientResult<()> {
        let connection = self.connection().await.ok_or(ClientError::NotConnected)?;
        self.api
            .send_relay_event(connection.connection_id, &event)
            .await
    }

    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Read one stream until it ends. Returns false once the owner is gone.
async fn pump_stream(
    response: reqwest::Response,
    connection: &SharedConnection,
    notices: &mpsc::UnboundedSender<RelayNotice>,
    backoff: &mut Backoff,
    connected_before: &mut bool,
) -> bool {
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::default();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("[Relay] Stream read failed: {}", e);
                return true;
            }
        };

        for payload in decoder.push(&chunk) {
            let event = match serde_json::from_str::<ServerEvent>(&payload) {
                Ok(event) => event,
                Err(e) => {
                    tracing::debug!("[Relay] Skipping undecodable event: {}", e);
                    continue;
                }
            };

            let notice = match event {
                ServerEvent::Connected(hello) => {
                    *connection.write().await = Some(hello);
                    backoff.reset();
                    tracing::info!("[Relay] Connected as {}", hello.connection_id);
                    if std::mem::replace(connected_before, true) {
                        RelayNotice::Reconnected(hello)
                    } else {
                        RelayNotice::Connected(hello)
                    }
                }
                other => RelayNotice::Event(other),
            };

            if notices.send(notice).is_err() {
                return false;
            }
        }
    }

    true
}

async fn run_relay(
    api: ChatApi,
    connection: SharedConnection,
    notices: mpsc::UnboundedSender<RelayNotice>,
) {
    let mut backoff = Backoff::new(api.config().reconnect_initial, api.config().reconnect_max);
    let mut connected_before = false;

    loop {
        match api.open_stream().await {
            Ok(response) => {
                let owner_alive = pump_stream(
                    response,
                    &connection,
                    &notices,
                    &mut backoff,
                    &mut connected_before,
                )
                .await;
                if !owner_alive {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!("[Relay] Failed to open stream (will retry): {}", e);
            }
        }

        let was_connected = connection.write().await.take().is_some();
        if was_connected && notices.send(RelayNotice::Disconnected).is_err() {
            return;
        }
        if notices.is_closed() {
            return;
        }

        let delay = backoff.next_delay();
        tracing::debug!("[Relay] Reconnecting in {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}
