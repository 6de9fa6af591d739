//! # kanban-hub
//!
//! The realtime connection hub.
//!
//! - [`Connection`]: one admitted client and its bounded outbound queue
//! - [`Registry`]: identity to connection map, owned by the dispatcher
//! - [`Hub`] / [`HubHandle`]: the single run loop that serializes registration,
//!   removal, fan-out and online-users queries, and the cloneable handle
//!   producers use to reach it
//! - [`presence`]: `user.status.updated` notices on registry transitions
//! - [`admission`]: the gate consulted before a connection exists
//!
//! Delivery is best effort. A connection whose queue is full when a frame
//! arrives is evicted and closed; it misses that frame and everything after.
//! Clients are expected to reconnect and reload state over REST.

#![deny(unsafe_code)]

pub mod admission;
pub mod connection;
pub mod dispatcher;
pub mod metrics;
pub mod presence;
pub mod registry;

pub use admission::{
    AdmissionError, AdmissionGate, InMemoryMembership, MembershipDirectory, check_membership,
};
pub use connection::{Connection, EnqueueError, Frame};
pub use dispatcher::{Hub, HubConfig, HubError, HubHandle};
pub use presence::{PresenceNotice, member_statuses};
pub use registry::Registry;
