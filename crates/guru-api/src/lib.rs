//! Guru API crate - axum HTTP server and route handlers.
//!
//! Exposes the business intelligence endpoint, the chat endpoint and a
//! health check, behind an optional static allow-list.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
