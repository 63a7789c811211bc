//! WebSocket transport
//!
//! `GET /realtime/ws?userId=..|token=..`. Inbound text frames are client
//! events, outbound text frames are server events, both in the
//! `{"event": ..., "data": ...}` envelope.

use axum::{
    extract::{
        rejection::QueryRejection,
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};

use crate::backend::error::BackendError;
use crate::backend::realtime::broadcast::Relay;
use crate::backend::realtime::session::handle_client_frame;
use crate::backend::realtime::subscription::{authenticate_handshake, HandshakeParams};
use crate::backend::server::state::AppState;
use crate::shared::event::{Connected, ServerEvent};

/// Handle GET /realtime/ws
///
/// The handshake is authenticated before the upgrade is looked at; a
/// refused handshake gets a plain 401 response.
pub async fn handle_websocket(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<HandshakeParams>, QueryRejection>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, BackendError> {
    let Query(params) = params?;
    let caller = authenticate_handshake(&app_state, &headers, &params).await?;
    let ws = ws.map_err(|e| BackendError::validation(e.body_text()))?;
    let relay = app_state.relay.clone();
    Ok(ws.on_upgrade(move |socket| run_socket(relay, caller.user_id, socket)))
}

async fn send_event(
    sink: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(axum::Error::new)?;
    sink.send(Message::Text(json.into())).await
}

async fn run_socket(relay: Relay, user_id: i64, socket: WebSocket) {
    let (connection_id, mut outbound) = relay.connect(user_id).await;
    let (mut sink, mut inbound) = socket.split();

    let hello = ServerEvent::Connected(Connected {
        connection_id,
        user_id,
    });
    if send_event(&mut sink, &hello).await.is_ok() {
        loop {
            tokio::select! {
                event = outbound.recv() => match event {
                    Some(event) => {
                        if send_event(&mut sink, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                frame = inbound.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(&relay, connection_id, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Pong is handled by axum
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("[Relay] WebSocket {} errored: {}", connection_id, e);
                        break;
                    }
                },
            }
        }
    }

    relay.disconnect(connection_id).await;
}
