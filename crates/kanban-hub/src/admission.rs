//! Admission boundary: who may open a connection, and into which room.
//!
//! The hub never verifies credentials itself. The gateway calls an
//! [`AdmissionGate`] before a [`Connection`](crate::Connection) exists; a
//! refusal means no registry state is touched.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use kanban_core::{ProjectId, UserId};
use parking_lot::RwLock;

/// Why an upgrade was refused.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// No credential supplied.
    #[error("missing token")]
    MissingToken,
    /// Credential malformed or signature invalid.
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// Credential past its expiry.
    #[error("token expired")]
    Expired,
    /// Authenticated, but not a member of the requested room.
    #[error("user {user} is not a member of project {room}")]
    NotMember {
        /// Authenticated identity.
        user: UserId,
        /// Requested room.
        room: ProjectId,
    },
    /// The membership source could not answer.
    #[error("membership lookup failed: {0}")]
    Directory(String),
}

impl AdmissionError {
    /// Authenticated but not allowed, as opposed to not authenticated.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::NotMember { .. })
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::InvalidToken(_) => "invalid_token",
            Self::Expired => "expired",
            Self::NotMember { .. } => "not_member",
            Self::Directory(_) => "directory",
        }
    }
}

/// Decides whether a connection attempt is admitted.
#[async_trait]
pub trait AdmissionGate: Send + Sync {
    /// Verify `token` and, when `room` is given, membership in it.
    ///
    /// Returns the authenticated identity to attach to the connection.
    async fn admit(&self, token: &str, room: Option<&ProjectId>)
    -> Result<UserId, AdmissionError>;
}

/// Source of project membership.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Whether `user` belongs to `room`.
    async fn is_member(&self, room: &ProjectId, user: &UserId) -> Result<bool, AdmissionError>;

    /// Every member of `room`, sorted.
    async fn members(&self, room: &ProjectId) -> Result<Vec<UserId>, AdmissionError>;
}

/// Membership check shared by gate implementations.
///
/// Unscoped connections (`room == None`) need no membership.
pub async fn check_membership(
    directory: &dyn MembershipDirectory,
    user: &UserId,
    room: Option<&ProjectId>,
) -> Result<(), AdmissionError> {
    let Some(room) = room else {
        return Ok(());
    };
    if directory.is_member(room, user).await? {
        Ok(())
    } else {
        Err(AdmissionError::NotMember {
            user: user.clone(),
            room: room.clone(),
        })
    }
}

/// Membership table held in memory.
///
/// Seeded from settings by the binary; a deployment backed by the project
/// database supplies its own [`MembershipDirectory`].
#[derive(Debug, Default)]
pub struct InMemoryMembership {
    rooms: RwLock<HashMap<ProjectId, BTreeSet<UserId>>>,
}

impl InMemoryMembership {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory seeded from a `project -> [user]` table.
    pub fn from_table(table: &BTreeMap<String, Vec<String>>) -> Self {
        let dir = Self::new();
        for (room, users) in table {
            let room = ProjectId::from(room.as_str());
            for user in users {
                dir.add(room.clone(), UserId::from(user.as_str()));
            }
        }
        dir
    }

    /// Add `user` to `room`.
    pub fn add(&self, room: ProjectId, user: UserId) {
        let _ = self.rooms.write().entry(room).or_default().insert(user);
    }

    /// Remove `user` from `room`. Returns whether it was a member.
    pub fn remove(&self, room: &ProjectId, user: &UserId) -> bool {
        let mut rooms = self.rooms.write();
        let Some(members) = rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(user);
        if members.is_empty() {
            let _ = rooms.remove(room);
        }
        removed
    }
}

#[async_trait]
impl MembershipDirectory for InMemoryMembership {
    async fn is_member(&self, room: &ProjectId, user: &UserId) -> Result<bool, AdmissionError> {
        Ok(self
            .rooms
            .read()
            .get(room)
            .is_some_and(|members| members.contains(user)))
    }

    async fn members(&self, room: &ProjectId) -> Result<Vec<UserId>, AdmissionError> {
        Ok(self
            .rooms
            .read()
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn in_memory_membership() {
        let dir = InMemoryMembership::new();
        dir.add(ProjectId::from("p1"), UserId::from("b"));
        dir.add(ProjectId::from("p1"), UserId::from("a"));

        let p1 = ProjectId::from("p1");
        assert!(dir.is_member(&p1, &UserId::from("a")).await.unwrap());
        assert!(!dir.is_member(&p1, &UserId::from("z")).await.unwrap());
        assert_eq!(
            dir.members(&p1).await.unwrap(),
            vec![UserId::from("a"), UserId::from("b")]
        );
        assert!(dir.members(&ProjectId::from("p9")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_member() {
        let dir = InMemoryMembership::new();
        let p1 = ProjectId::from("p1");
        dir.add(p1.clone(), UserId::from("a"));
        assert!(dir.remove(&p1, &UserId::from("a")));
        assert!(!dir.remove(&p1, &UserId::from("a")));
        assert!(!dir.is_member(&p1, &UserId::from("a")).await.unwrap());
    }

    #[tokio::test]
    async fn seeded_from_table() {
        let mut table = BTreeMap::new();
        let _ = table.insert("p1".to_string(), vec!["a".to_string(), "b".to_string()]);
        let dir = InMemoryMembership::from_table(&table);
        assert!(
            dir.is_member(&ProjectId::from("p1"), &UserId::from("b"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn unscoped_skips_directory() {
        let mut dir = MockMembershipDirectory::new();
        let _ = dir.expect_is_member().never();
        check_membership(&dir, &UserId::from("a"), None).await.unwrap();
    }

    #[tokio::test]
    async fn non_member_is_forbidden() {
        let mut dir = MockMembershipDirectory::new();
        let _ = dir
            .expect_is_member()
            .with(eq(ProjectId::from("p1")), eq(UserId::from("a")))
            .times(1)
            .returning(|_, _| Ok(false));

        let err = check_membership(&dir, &UserId::from("a"), Some(&ProjectId::from("p1")))
            .await
            .unwrap_err();
        assert!(err.is_forbidden());
        assert_eq!(err.reason(), "not_member");
    }

    #[tokio::test]
    async fn directory_failure_propagates() {
        let mut dir = MockMembershipDirectory::new();
        let _ = dir
            .expect_is_member()
            .returning(|_, _| Err(AdmissionError::Directory("db down".into())));

        let err = check_membership(&dir, &UserId::from("a"), Some(&ProjectId::from("p1")))
            .await
            .unwrap_err();
        assert_matches!(err, AdmissionError::Directory(_));
        assert!(!err.is_forbidden());
    }

    #[test]
    fn error_reasons() {
        assert_eq!(AdmissionError::MissingToken.reason(), "missing_token");
        assert_eq!(AdmissionError::Expired.reason(), "expired");
        assert_eq!(
            AdmissionError::InvalidToken("bad".into()).to_string(),
            "invalid token: bad"
        );
    }
}
