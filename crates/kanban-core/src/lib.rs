//! # kanban-core
//!
//! Shared vocabulary for the kanban realtime hub:
//!
//! - **Branded IDs**: `UserId`, `ProjectId`, `ConnectionId` as newtypes
//! - **Event catalog**: [`EventName`] with the fixed set of wire tags
//! - **Envelopes**: [`Envelope`] (`{"name","data"}`) and [`StatusEnvelope`]
//!   (`{"status","message"}`) as they appear on the socket
//! - **Destinations**: [`Destination`] routing policy for a published event
//! - **Domain events**: [`DomainEvent`], the typed union producers build from

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod payloads;

pub use events::{Destination, Envelope, EnvelopeError, EventName, StatusEnvelope};
pub use ids::{ConnectionId, ProjectId, UserId};
pub use payloads::{DomainEvent, UserStatus, UserStatusPayload};
