//! The dispatcher run loop and the handle producers talk to it through.
//!
//! Every registry read and write happens inside [`Hub::run`]. Register,
//! unregister, publish and online-users intents share one bounded FIFO
//! channel, so they are handled one at a time in arrival order: a frame is
//! never enqueued to a connection after its removal was processed, and a
//! connection registered before a publish always sees it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use kanban_core::{
    ConnectionId, Destination, DomainEvent, Envelope, EnvelopeError, ProjectId, UserId,
};
use metrics::{counter, gauge};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::connection::{Connection, EnqueueError, Frame};
use crate::metrics::{
    HUB_DELIVERIES_TOTAL, HUB_EVICTIONS_TOTAL, HUB_PUBLISH_TOTAL, WS_CONNECTIONS_ACTIVE,
};
use crate::presence::{self, PresenceNotice};
use crate::registry::Registry;

/// Queue sizing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubConfig {
    /// Per-connection outbound queue capacity.
    pub outbound_queue: usize,
    /// Intent channel capacity; producers wait when it is full.
    pub intent_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_queue: 256,
            intent_queue: 1024,
        }
    }
}

/// Errors returned to producers.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The dispatcher has stopped.
    #[error("hub is shut down")]
    Closed,
    /// The event could not be serialized.
    #[error(transparent)]
    Encode(#[from] EnvelopeError),
}

enum Intent {
    Register(Arc<Connection>),
    Unregister {
        user: UserId,
        conn: Option<ConnectionId>,
    },
    Publish {
        destination: Destination,
        frame: Frame,
    },
    OnlineUsers {
        room: ProjectId,
        reply: oneshot::Sender<Vec<UserId>>,
    },
}

impl std::fmt::Debug for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register(c) => f.debug_tuple("Register").field(c.id()).finish(),
            Self::Unregister { user, .. } => f.debug_tuple("Unregister").field(user).finish(),
            Self::Publish { destination, .. } => {
                f.debug_tuple("Publish").field(destination).finish()
            }
            Self::OnlineUsers { room, .. } => f.debug_tuple("OnlineUsers").field(room).finish(),
        }
    }
}

/// One frame bound for a destination, optionally skipping one identity.
struct Delivery {
    destination: Destination,
    frame: Frame,
    exclude: Option<UserId>,
}

/// Owns the registry; runs as a single task.
pub struct Hub {
    registry: Registry,
    intents: mpsc::Receiver<Intent>,
    active: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl Hub {
    /// Build a hub and its handle without starting the loop.
    pub fn new(config: &HubConfig, cancel: CancellationToken) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(config.intent_queue.max(1));
        let active = Arc::new(AtomicUsize::new(0));
        let hub = Self {
            registry: Registry::new(),
            intents: rx,
            active: Arc::clone(&active),
            cancel,
        };
        let handle = HubHandle {
            intents: tx,
            active,
            outbound_queue: config.outbound_queue.max(1),
        };
        (hub, handle)
    }

    /// Build a hub and spawn its run loop.
    pub fn spawn(config: &HubConfig, cancel: CancellationToken) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(config, cancel);
        let task = tokio::spawn(hub.run());
        (handle, task)
    }

    /// Process intents until cancelled or every handle is dropped, then
    /// close all remaining connections.
    #[instrument(skip_all, name = "hub")]
    pub async fn run(mut self) {
        info!("dispatcher started");
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                intent = self.intents.recv() => match intent {
                    Some(intent) => self.handle(intent),
                    None => break,
                },
            }
        }
        self.shutdown();
    }

    fn handle(&mut self, intent: Intent) {
        match intent {
            Intent::Register(conn) => self.register(conn),
            Intent::Unregister { user, conn } => self.unregister(&user, conn.as_ref()),
            Intent::Publish { destination, frame } => {
                counter!(HUB_PUBLISH_TOTAL, "destination" => destination.label()).increment(1);
                self.fan_out(Delivery {
                    destination,
                    frame,
                    exclude: None,
                });
            }
            Intent::OnlineUsers { room, reply } => {
                let _ = reply.send(self.registry.online_in_room(&room));
            }
        }
    }

    fn register(&mut self, conn: Arc<Connection>) {
        let replaced = self.registry.insert(Arc::clone(&conn));
        if let Some(old) = &replaced {
            let _ = old.close();
            info!(
                user_id = %conn.user(),
                old_conn_id = %old.id(),
                conn_id = %conn.id(),
                "connection replaced"
            );
        } else {
            info!(
                user_id = %conn.user(),
                project_id = conn.room().map(ProjectId::as_str),
                conn_id = %conn.id(),
                "connection registered"
            );
        }
        self.sync_active();

        for notice in presence::on_register(&conn, replaced.as_deref()) {
            if let Some(delivery) = announce(&notice) {
                self.fan_out(delivery);
            }
        }
    }

    fn unregister(&mut self, user: &UserId, conn: Option<&ConnectionId>) {
        let Some(removed) = self.registry.remove(user, conn) else {
            debug!(user_id = %user, "unregister for absent connection ignored");
            return;
        };
        let _ = removed.close();
        info!(user_id = %user, conn_id = %removed.id(), "connection unregistered");
        self.sync_active();

        if let Some(delivery) = presence::on_unregister(&removed).and_then(|n| announce(&n)) {
            self.fan_out(delivery);
        }
    }

    /// Enqueue to every target. Evictions caused along the way queue their
    /// own offline notices, handled in the same pass.
    fn fan_out(&mut self, first: Delivery) {
        let mut pending = VecDeque::from([first]);
        while let Some(delivery) = pending.pop_front() {
            let mut delivered = 0u64;
            for conn in self.targets(&delivery) {
                match conn.enqueue(Arc::clone(&delivery.frame)) {
                    Ok(()) => delivered += 1,
                    Err(reason) => {
                        if let Some(next) = self.evict(&conn, reason) {
                            pending.push_back(next);
                        }
                    }
                }
            }
            counter!(HUB_DELIVERIES_TOTAL).increment(delivered);
            debug!(
                destination = delivery.destination.label(),
                recipients = delivered,
                "frame dispatched"
            );
        }
    }

    fn targets(&self, delivery: &Delivery) -> Vec<Arc<Connection>> {
        let keep = |c: &&Arc<Connection>| delivery.exclude.as_ref() != Some(c.user());
        match &delivery.destination {
            Destination::User(user) => self
                .registry
                .lookup_user(user)
                .filter(keep)
                .cloned()
                .into_iter()
                .collect(),
            Destination::Room(room) => self.registry.lookup_room(room).filter(keep).cloned().collect(),
            Destination::All => self.registry.iter().filter(keep).cloned().collect(),
        }
    }

    /// Remove a connection whose queue refused a frame.
    fn evict(&mut self, conn: &Arc<Connection>, reason: EnqueueError) -> Option<Delivery> {
        let removed = self.registry.remove(conn.user(), Some(conn.id()))?;
        let _ = removed.close();
        let label = match reason {
            EnqueueError::Full => "full",
            EnqueueError::Closed => "closed",
        };
        counter!(HUB_EVICTIONS_TOTAL, "reason" => label).increment(1);
        warn!(
            user_id = %removed.user(),
            conn_id = %removed.id(),
            reason = label,
            "connection evicted"
        );
        self.sync_active();
        presence::on_unregister(&removed).and_then(|n| announce(&n))
    }

    fn shutdown(&mut self) {
        self.intents.close();
        let remaining = self.registry.drain();
        for conn in &remaining {
            let _ = conn.close();
        }
        self.sync_active();
        info!(closed = remaining.len(), "dispatcher stopped");
    }

    #[allow(clippy::cast_precision_loss)]
    fn sync_active(&self) {
        let n = self.registry.len();
        self.active.store(n, Ordering::Relaxed);
        gauge!(WS_CONNECTIONS_ACTIVE).set(n as f64);
    }
}

fn announce(notice: &PresenceNotice) -> Option<Delivery> {
    match notice.frame() {
        Ok(frame) => Some(Delivery {
            destination: Destination::Room(notice.room.clone()),
            frame,
            exclude: Some(notice.subject.clone()),
        }),
        Err(e) => {
            warn!(error = %e, "failed to encode presence notice");
            None
        }
    }
}

/// Cloneable producer-side handle to a running [`Hub`].
#[derive(Clone, Debug)]
pub struct HubHandle {
    intents: mpsc::Sender<Intent>,
    active: Arc<AtomicUsize>,
    outbound_queue: usize,
}

impl HubHandle {
    /// New connection sized with the hub's outbound queue capacity.
    pub fn connection(
        &self,
        user: UserId,
        room: Option<ProjectId>,
    ) -> (Arc<Connection>, mpsc::Receiver<Frame>) {
        Connection::new(user, room, self.outbound_queue)
    }

    /// Add a connection, replacing and closing any previous one for the
    /// same identity.
    pub async fn register(&self, conn: Arc<Connection>) -> Result<(), HubError> {
        self.send(Intent::Register(conn)).await
    }

    /// Remove `conn` if it is still the registered connection for its user.
    pub async fn unregister(&self, conn: &Connection) -> Result<(), HubError> {
        self.send(Intent::Unregister {
            user: conn.user().clone(),
            conn: Some(conn.id().clone()),
        })
        .await
    }

    /// Remove whatever connection `user` has. No-op if none.
    pub async fn unregister_user(&self, user: UserId) -> Result<(), HubError> {
        self.send(Intent::Unregister { user, conn: None }).await
    }

    /// Deliver to every connection in `room`.
    pub async fn publish_to_room(&self, room: ProjectId, event: &DomainEvent) -> Result<(), HubError> {
        self.publish(Destination::Room(room), event).await
    }

    /// Deliver to `user`'s connection, if any.
    pub async fn publish_to_user(&self, user: UserId, event: &DomainEvent) -> Result<(), HubError> {
        self.publish(Destination::User(user), event).await
    }

    /// Deliver to every connection.
    pub async fn broadcast(&self, event: &DomainEvent) -> Result<(), HubError> {
        self.publish(Destination::All, event).await
    }

    /// Serialize a typed event and route it.
    pub async fn publish(&self, destination: Destination, event: &DomainEvent) -> Result<(), HubError> {
        let frame = Frame::from(event.to_frame()?);
        self.publish_frame(destination, frame).await
    }

    /// Route an already-built envelope.
    pub async fn publish_envelope(
        &self,
        destination: Destination,
        envelope: &Envelope,
    ) -> Result<(), HubError> {
        let frame = Frame::from(envelope.to_frame()?);
        self.publish_frame(destination, frame).await
    }

    /// Route a pre-serialized frame. The hub does not inspect it.
    pub async fn publish_frame(&self, destination: Destination, frame: Frame) -> Result<(), HubError> {
        self.send(Intent::Publish { destination, frame }).await
    }

    /// Identities currently connected to `room`, sorted.
    pub async fn online_users(&self, room: ProjectId) -> Result<Vec<UserId>, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(Intent::OnlineUsers { room, reply }).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Registered connections as of the last processed intent.
    pub fn connection_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Whether the dispatcher has stopped accepting intents.
    pub fn is_closed(&self) -> bool {
        self.intents.is_closed()
    }

    async fn send(&self, intent: Intent) -> Result<(), HubError> {
        self.intents.send(intent).await.map_err(|_| HubError::Closed)
    }
}
