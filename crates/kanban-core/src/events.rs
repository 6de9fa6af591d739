//! Event catalog, wire envelopes, and routing destinations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ProjectId, UserId};

/// Fixed catalog of event tags pushed to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    /// A column was added to a board.
    #[serde(rename = "column.created")]
    ColumnCreated,
    /// A column was renamed or recolored.
    #[serde(rename = "column.updated")]
    ColumnUpdated,
    /// A column was removed.
    #[serde(rename = "column.deleted")]
    ColumnDeleted,
    /// A task was created.
    #[serde(rename = "task.created")]
    TaskCreated,
    /// A task's title or content changed.
    #[serde(rename = "task.updated")]
    TaskUpdated,
    /// A task was removed.
    #[serde(rename = "task.deleted")]
    TaskDeleted,
    /// A task changed column.
    #[serde(rename = "task.moved")]
    TaskMoved,
    /// A team was created inside a project.
    #[serde(rename = "team.created")]
    TeamCreated,
    /// A team was renamed or its role changed.
    #[serde(rename = "team.updated")]
    TeamUpdated,
    /// A team was removed.
    #[serde(rename = "team.deleted")]
    TeamDeleted,
    /// Members were attached to a team.
    #[serde(rename = "team.members.added")]
    TeamMembersAdded,
    /// A user was invited to a project.
    #[serde(rename = "invitation.created")]
    InvitationCreated,
    /// A user joined a project.
    #[serde(rename = "project.member.created")]
    ProjectMemberCreated,
    /// A member's role or team changed.
    #[serde(rename = "project.member.updated")]
    ProjectMemberUpdated,
    /// A project was removed.
    #[serde(rename = "project.deleted")]
    ProjectDeleted,
    /// A user went online or offline.
    #[serde(rename = "user.status.updated")]
    UserStatusUpdated,
}

impl EventName {
    /// Every tag in the catalog.
    pub const ALL: [EventName; 16] = [
        Self::ColumnCreated,
        Self::ColumnUpdated,
        Self::ColumnDeleted,
        Self::TaskCreated,
        Self::TaskUpdated,
        Self::TaskDeleted,
        Self::TaskMoved,
        Self::TeamCreated,
        Self::TeamUpdated,
        Self::TeamDeleted,
        Self::TeamMembersAdded,
        Self::InvitationCreated,
        Self::ProjectMemberCreated,
        Self::ProjectMemberUpdated,
        Self::ProjectDeleted,
        Self::UserStatusUpdated,
    ];

    /// Wire tag, e.g. `"task.moved"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ColumnCreated => "column.created",
            Self::ColumnUpdated => "column.updated",
            Self::ColumnDeleted => "column.deleted",
            Self::TaskCreated => "task.created",
            Self::TaskUpdated => "task.updated",
            Self::TaskDeleted => "task.deleted",
            Self::TaskMoved => "task.moved",
            Self::TeamCreated => "team.created",
            Self::TeamUpdated => "team.updated",
            Self::TeamDeleted => "team.deleted",
            Self::TeamMembersAdded => "team.members.added",
            Self::InvitationCreated => "invitation.created",
            Self::ProjectMemberCreated => "project.member.created",
            Self::ProjectMemberUpdated => "project.member.updated",
            Self::ProjectDeleted => "project.deleted",
            Self::UserStatusUpdated => "user.status.updated",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| EnvelopeError::UnknownEvent(s.to_owned()))
    }
}

/// Errors raised while building or encoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The payload could not be converted to JSON.
    #[error("failed to serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The tag is not part of the catalog.
    #[error("unknown event name: {0}")]
    UnknownEvent(String),
}

/// One frame pushed to a client: `{"name": <tag>, "data": <json>}`.
///
/// The hub never looks inside `data`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event tag from the catalog.
    pub name: EventName,
    /// Event-specific payload.
    pub data: Value,
}

impl Envelope {
    /// Build an envelope from any serializable payload.
    pub fn new(name: EventName, data: &impl Serialize) -> Result<Self, EnvelopeError> {
        Ok(Self {
            name,
            data: serde_json::to_value(data)?,
        })
    }

    /// Encode as the text frame written to the socket.
    pub fn to_frame(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Hub-level protocol error or abort: `{"status": false, "message": …}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEnvelope {
    /// Always `false` for errors and aborts.
    pub status: bool,
    /// Human-readable reason.
    pub message: String,
}

impl StatusEnvelope {
    /// Error reply to a frame the hub could not understand.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
        }
    }

    /// Abort reply to a well-formed frame the hub refuses to act on.
    pub fn abort(message: impl Into<String>) -> Self {
        Self::error(message)
    }

    /// Encode as a text frame.
    pub fn to_frame(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Who a published envelope is routed to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    /// The single live connection of one user, if any.
    User(UserId),
    /// Every connection scoped to one project room.
    Room(ProjectId),
    /// Every live connection.
    All,
}

impl Destination {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Room(_) => "room",
            Self::All => "all",
        }
    }
}
