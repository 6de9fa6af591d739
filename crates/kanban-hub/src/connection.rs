//! One admitted client connection and its bounded outbound queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use kanban_core::{ConnectionId, ProjectId, UserId};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A serialized text frame, shared between every recipient of one publish.
pub type Frame = Arc<str>;

/// Why a frame could not be queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    /// The queue is at capacity; the consumer is not keeping up.
    #[error("outbound queue full")]
    Full,
    /// The queue has been closed.
    #[error("connection closed")]
    Closed,
}

/// Represents an admitted client.
///
/// The write pump owns the receiving half of the queue; the hub holds the
/// sending half inside the connection. [`Connection::close`] drops that sender,
/// which ends the write pump once buffered frames are flushed, and cancels
/// [`Connection::teardown`] so the read pump stops too.
pub struct Connection {
    id: ConnectionId,
    user: UserId,
    room: Option<ProjectId>,
    tx: Mutex<Option<mpsc::Sender<Frame>>>,
    closed: AtomicBool,
    teardown: CancellationToken,
    is_alive: AtomicBool,
    connected_at: Instant,
}

impl Connection {
    /// Create a connection with an outbound queue of `capacity` frames.
    ///
    /// Returns the receiving half for the write pump.
    pub fn new(
        user: UserId,
        room: Option<ProjectId>,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let conn = Self {
            id: ConnectionId::new(),
            user,
            room,
            tx: Mutex::new(Some(tx)),
            closed: AtomicBool::new(false),
            teardown: CancellationToken::new(),
            is_alive: AtomicBool::new(true),
            connected_at: Instant::now(),
        };
        (Arc::new(conn), rx)
    }

    /// Unique id of this connection.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Authenticated identity.
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Room fixed at admission, if any.
    pub fn room(&self) -> Option<&ProjectId> {
        self.room.as_ref()
    }

    /// Whether this connection belongs to `room`.
    pub fn in_room(&self, room: &ProjectId) -> bool {
        self.room.as_ref() == Some(room)
    }

    /// Non-blocking attempt to queue a frame.
    pub fn enqueue(&self, frame: Frame) -> Result<(), EnqueueError> {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(EnqueueError::Closed);
        };
        tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Close the outbound queue and signal teardown.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        drop(self.tx.lock().take());
        self.teardown.cancel();
        true
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Token cancelled when the connection is closed by the hub.
    pub fn teardown(&self) -> CancellationToken {
        self.teardown.clone()
    }

    /// Mark the peer as alive (pong or any inbound frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the peer was seen since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user", &self.user)
            .field("room", &self.room)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn make_connection(capacity: usize) -> (Arc<Connection>, mpsc::Receiver<Frame>) {
        Connection::new(UserId::from("u1"), Some(ProjectId::from("p1")), capacity)
    }

    #[test]
    fn create_connection() {
        let (conn, _rx) = make_connection(4);
        assert_eq!(conn.user().as_str(), "u1");
        assert_eq!(conn.room().map(ProjectId::as_str), Some("p1"));
        assert!(conn.in_room(&ProjectId::from("p1")));
        assert!(!conn.in_room(&ProjectId::from("p2")));
        assert!(!conn.is_closed());
    }

    #[test]
    fn unscoped_connection_is_in_no_room() {
        let (conn, _rx) = Connection::new(UserId::from("u1"), None, 4);
        assert!(conn.room().is_none());
        assert!(!conn.in_room(&ProjectId::from("p1")));
    }

    #[tokio::test]
    async fn enqueue_delivers_frame() {
        let (conn, mut rx) = make_connection(4);
        conn.enqueue(Arc::from("hello")).unwrap();
        assert_eq!(&*rx.recv().await.unwrap(), "hello");
    }

    #[test]
    fn enqueue_reports_full() {
        let (conn, _rx) = make_connection(2);
        conn.enqueue(Arc::from("1")).unwrap();
        conn.enqueue(Arc::from("2")).unwrap();
        assert_matches!(conn.enqueue(Arc::from("3")), Err(EnqueueError::Full));
    }

    #[test]
    fn enqueue_after_close_reports_closed() {
        let (conn, _rx) = make_connection(2);
        assert!(conn.close());
        assert_matches!(conn.enqueue(Arc::from("x")), Err(EnqueueError::Closed));
    }

    #[test]
    fn enqueue_with_dropped_receiver_reports_closed() {
        let (conn, rx) = make_connection(2);
        drop(rx);
        assert_matches!(conn.enqueue(Arc::from("x")), Err(EnqueueError::Closed));
    }

    #[test]
    fn close_is_idempotent() {
        let (conn, _rx) = make_connection(2);
        assert!(conn.close());
        assert!(!conn.close());
        assert!(conn.is_closed());
        assert!(conn.teardown().is_cancelled());
    }

    #[tokio::test]
    async fn close_flushes_then_ends_receiver() {
        let (conn, mut rx) = make_connection(4);
        conn.enqueue(Arc::from("last")).unwrap();
        let _ = conn.close();
        assert_eq!(&*rx.recv().await.unwrap(), "last");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn check_alive_resets_flag() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[test]
    fn ids_differ_per_connection() {
        let (a, _ra) = make_connection(1);
        let (b, _rb) = make_connection(1);
        assert_ne!(a.id(), b.id());
    }
}
