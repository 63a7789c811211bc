//! Middleware Module
//!
//! HTTP middleware for the backend server.
//!
//! - **`auth`** - caller resolution for protected routes
//!
//! Request logging and CORS come from `tower-http` layers applied in
//! [`create_router`](crate::backend::routes::router::create_router).

pub mod auth;

pub use auth::{
    auth_middleware, resolve_caller, resolve_from_headers, AuthUser, AuthenticatedUser,
};
