//! # kanban-server
//!
//! Axum HTTP + `WebSocket` gateway in front of the kanban hub.
//!
//! - `GET /ws`: token and membership checked before the upgrade, then one
//!   session per socket (write pump, read pump, heartbeat)
//! - `GET /projects/{project_id}/online-users`: member presence for a room
//! - `GET /health` and `GET /metrics`
//! - [`auth::JwtAdmission`]: HS256 session tokens plus a membership directory
//! - Graceful shutdown via `CancellationToken`; the dispatcher closes every
//!   connection when it stops

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod response;
pub mod server;
pub mod shutdown;
pub mod telemetry;
pub mod websocket;

pub use auth::{Claims, JwtAdmission, issue_token};
pub use config::ServerConfig;
pub use error::{ApiError, ServerError};
pub use server::{AppState, KanbanServer};
pub use shutdown::ShutdownCoordinator;
