//! Presence notices derived from registry transitions.
//!
//! A notice is delivered to the room's other members; the subject never
//! receives its own status change. Unscoped connections produce no notices.

use std::collections::BTreeSet;

use kanban_core::{DomainEvent, EnvelopeError, ProjectId, UserId, UserStatus, UserStatusPayload};

use crate::connection::{Connection, Frame};

/// A `user.status.updated` event bound for one room.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresenceNotice {
    /// Room that should hear about it.
    pub room: ProjectId,
    /// Whose status changed.
    pub subject: UserId,
    /// New status.
    pub status: UserStatus,
}

impl PresenceNotice {
    /// Serialized `user.status.updated` frame.
    pub fn frame(&self) -> Result<Frame, EnvelopeError> {
        let event = DomainEvent::UserStatusUpdated(UserStatusPayload::new(
            self.subject.clone(),
            self.status,
        ));
        Ok(Frame::from(event.to_frame()?))
    }
}

/// Notices for `added` entering the registry, possibly replacing `replaced`.
///
/// Replacement inside the same room is silent; moving rooms tells the old
/// room the user left and the new room the user arrived.
pub fn on_register(added: &Connection, replaced: Option<&Connection>) -> Vec<PresenceNotice> {
    let old_room = replaced.and_then(Connection::room);
    let new_room = added.room();
    if old_room.is_some() && old_room == new_room {
        return Vec::new();
    }

    let mut notices = Vec::with_capacity(2);
    if let Some(room) = old_room {
        notices.push(PresenceNotice {
            room: room.clone(),
            subject: added.user().clone(),
            status: UserStatus::Offline,
        });
    }
    if let Some(room) = new_room {
        notices.push(PresenceNotice {
            room: room.clone(),
            subject: added.user().clone(),
            status: UserStatus::Online,
        });
    }
    notices
}

/// Notice for `removed` leaving the registry.
pub fn on_unregister(removed: &Connection) -> Option<PresenceNotice> {
    removed.room().map(|room| PresenceNotice {
        room: room.clone(),
        subject: removed.user().clone(),
        status: UserStatus::Offline,
    })
}

/// Status rows for a room listing.
///
/// Every known member is reported, `online` when connected to the room.
/// Connected users the member list does not know about are still reported
/// online. Rows are sorted by id.
pub fn member_statuses(members: &[UserId], online: &[UserId]) -> Vec<UserStatusPayload> {
    let online: BTreeSet<&UserId> = online.iter().collect();
    let mut ids: BTreeSet<&UserId> = members.iter().collect();
    ids.extend(online.iter().copied());
    ids.into_iter()
        .map(|id| {
            let status = if online.contains(id) {
                UserStatus::Online
            } else {
                UserStatus::Offline
            };
            UserStatusPayload::new(id.clone(), status)
        })
        .collect()
}
