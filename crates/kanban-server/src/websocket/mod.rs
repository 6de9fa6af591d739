//! WebSocket upgrade handling, sessions, heartbeat and inbound replies.

pub mod heartbeat;
pub mod protocol;
pub mod session;
pub mod upgrade;
