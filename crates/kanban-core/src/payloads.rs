//! Typed payloads for every event in the catalog.
//!
//! The CRUD layer builds a [`DomainEvent`] after a successful mutation and
//! hands it to the hub; the hub only ever sees the serialized frame.
//! Timestamps are carried as the RFC 3339 strings the REST layer already
//! renders, so the push payload matches the REST response byte for byte.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::events::{Envelope, EnvelopeError, EventName};
use crate::ids::UserId;

/// Full column as returned on creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub project_id: String,
    pub created_at: String,
}

/// Changed column fields only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Full task as returned on creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub project_id: String,
    pub column_id: String,
    pub created_at: String,
}

/// Changed task fields only. Used for both `task.updated` and `task.moved`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub role: String,
    pub project_id: String,
    pub created_at: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub team_id: String,
    pub user_id: String,
    pub created_at: String,
}

/// Members attached to a team in one request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembersAdded {
    pub team_id: String,
    pub members: Vec<TeamMember>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

/// Invitation pushed to the invitee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: String,
    pub inviter: User,
    pub invitee: User,
    pub project: Project,
    pub message: Option<String>,
    pub status: String,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub role: String,
    pub team_id: Option<String>,
    pub created_at: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMemberUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

/// Payload of every `*.deleted` event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deleted {
    pub id: String,
}

/// Presence state of one user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Has a live connection.
    Online,
    /// No live connection.
    Offline,
}

impl UserStatus {
    /// Wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// `user.status.updated` payload, also the row shape of the online-users listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatusPayload {
    pub id: UserId,
    pub status: UserStatus,
}

impl UserStatusPayload {
    /// Status row for `id`.
    pub fn new(id: UserId, status: UserStatus) -> Self {
        Self { id, status }
    }
}

/// Tagged union over the event catalog.
///
/// Serializes directly to the wire envelope shape `{"name", "data"}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data")]
pub enum DomainEvent {
    #[serde(rename = "column.created")]
    ColumnCreated(Column),
    #[serde(rename = "column.updated")]
    ColumnUpdated(ColumnUpdate),
    #[serde(rename = "column.deleted")]
    ColumnDeleted(Deleted),
    #[serde(rename = "task.created")]
    TaskCreated(Task),
    #[serde(rename = "task.updated")]
    TaskUpdated(TaskUpdate),
    #[serde(rename = "task.deleted")]
    TaskDeleted(Deleted),
    #[serde(rename = "task.moved")]
    TaskMoved(TaskUpdate),
    #[serde(rename = "team.created")]
    TeamCreated(Team),
    #[serde(rename = "team.updated")]
    TeamUpdated(TeamUpdate),
    #[serde(rename = "team.deleted")]
    TeamDeleted(Deleted),
    #[serde(rename = "team.members.added")]
    TeamMembersAdded(TeamMembersAdded),
    #[serde(rename = "invitation.created")]
    InvitationCreated(Invitation),
    #[serde(rename = "project.member.created")]
    ProjectMemberCreated(ProjectMember),
    #[serde(rename = "project.member.updated")]
    ProjectMemberUpdated(ProjectMemberUpdate),
    #[serde(rename = "project.deleted")]
    ProjectDeleted(Deleted),
    #[serde(rename = "user.status.updated")]
    UserStatusUpdated(UserStatusPayload),
}

impl DomainEvent {
    /// Catalog tag of this event.
    pub fn name(&self) -> EventName {
        match self {
            Self::ColumnCreated(_) => EventName::ColumnCreated,
            Self::ColumnUpdated(_) => EventName::ColumnUpdated,
            Self::ColumnDeleted(_) => EventName::ColumnDeleted,
            Self::TaskCreated(_) => EventName::TaskCreated,
            Self::TaskUpdated(_) => EventName::TaskUpdated,
            Self::TaskDeleted(_) => EventName::TaskDeleted,
            Self::TaskMoved(_) => EventName::TaskMoved,
            Self::TeamCreated(_) => EventName::TeamCreated,
            Self::TeamUpdated(_) => EventName::TeamUpdated,
            Self::TeamDeleted(_) => EventName::TeamDeleted,
            Self::TeamMembersAdded(_) => EventName::TeamMembersAdded,
            Self::InvitationCreated(_) => EventName::InvitationCreated,
            Self::ProjectMemberCreated(_) => EventName::ProjectMemberCreated,
            Self::ProjectMemberUpdated(_) => EventName::ProjectMemberUpdated,
            Self::ProjectDeleted(_) => EventName::ProjectDeleted,
            Self::UserStatusUpdated(_) => EventName::UserStatusUpdated,
        }
    }

    /// Convert to the untyped envelope.
    pub fn to_envelope(&self) -> Result<Envelope, EnvelopeError> {
        let value = serde_json::to_value(self)?;
        let data = match value {
            serde_json::Value::Object(mut map) => map.remove("data").unwrap_or_default(),
            _ => serde_json::Value::Null,
        };
        Ok(Envelope {
            name: self.name(),
            data,
        })
    }

    /// Encode straight to a text frame.
    pub fn to_frame(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}
