//! WebSocket session lifecycle: one admitted client from upgrade through
//! disconnect.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use kanban_hub::metrics::{WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use kanban_hub::{Connection, EnqueueError, Frame, HubHandle};
use metrics::{counter, histogram};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::heartbeat::{HeartbeatResult, run_heartbeat};
use super::protocol;
use crate::metrics::WS_CONNECTION_DURATION_SECONDS;

/// How long the write pump may take to flush after the session ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-session timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Interval between server pings and liveness checks.
    pub heartbeat_interval: Duration,
    /// Silent intervals tolerated before the socket is dropped.
    pub heartbeat_max_missed: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_max_missed: 2,
        }
    }
}

/// Run a WebSocket session for an admitted connection.
///
/// 1. Registers the connection with the hub
/// 2. Forwards queued frames to the socket and sends periodic pings
/// 3. Answers inbound messages and tracks liveness
/// 4. Ends when the client leaves, stops responding, or the hub closes the
///    connection (eviction, replacement, shutdown)
/// 5. Unregisters and flushes what is left in the queue
#[instrument(skip_all, fields(conn_id = %conn.id(), user_id = %conn.user(), project_id = ?conn.room()))]
pub async fn run_ws_session(
    ws: WebSocket,
    conn: Arc<Connection>,
    outbound: mpsc::Receiver<Frame>,
    hub: HubHandle,
    config: SessionConfig,
) {
    let (ws_tx, mut ws_rx) = ws.split();

    if hub.register(conn.clone()).await.is_err() {
        warn!("hub is shut down, dropping connection");
        return;
    }
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);

    let writer = tokio::spawn(write_pump(ws_tx, outbound, config.heartbeat_interval));
    let writer_abort = writer.abort_handle();

    let heartbeat = run_heartbeat(
        conn.clone(),
        config.heartbeat_interval,
        config.heartbeat_max_missed,
        conn.teardown(),
    );
    tokio::pin!(heartbeat);

    loop {
        tokio::select! {
            result = &mut heartbeat => {
                match result {
                    HeartbeatResult::TimedOut => warn!("client stopped responding"),
                    HeartbeatResult::Cancelled => debug!("connection closed by hub"),
                }
                break;
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        if handle_message(&conn, msg).is_break() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "socket read failed");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Stale unregisters are no-ops in the hub. Close directly in case the
    // hub already stopped.
    let _ = hub.unregister(&conn).await;
    let _ = conn.close();

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        warn!("write pump did not finish, aborting");
        writer_abort.abort();
    }

    let duration = conn.age();
    info!(
        duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(duration.as_secs_f64());
}

/// Handle one inbound frame. `Break` ends the session.
fn handle_message(conn: &Connection, msg: Message) -> ControlFlow<()> {
    let reply = match msg {
        Message::Text(text) => {
            conn.mark_alive();
            protocol::handle_inbound(text.as_str())
        }
        Message::Binary(data) => {
            conn.mark_alive();
            match std::str::from_utf8(&data) {
                Ok(text) => protocol::handle_inbound(text),
                Err(_) => {
                    debug!(len = data.len(), "received non-UTF8 binary frame");
                    protocol::invalid_encoding()
                }
            }
        }
        Message::Ping(_) | Message::Pong(_) => {
            conn.mark_alive();
            return ControlFlow::Continue(());
        }
        Message::Close(_) => {
            debug!("client sent close frame");
            return ControlFlow::Break(());
        }
    };

    match reply {
        Ok(frame) => match conn.enqueue(Frame::from(frame)) {
            Ok(()) => {}
            Err(EnqueueError::Full) => {
                // Same rule as hub fan-out: a client that stopped reading is gone.
                warn!("outbound queue full on reply, closing connection");
                let _ = conn.close();
                return ControlFlow::Break(());
            }
            Err(EnqueueError::Closed) => debug!("reply dropped, connection closed"),
        },
        Err(e) => warn!(error = %e, "failed to encode reply"),
    }
    ControlFlow::Continue(())
}

/// Drain the outbound queue to the socket, pinging every `ping_every`.
///
/// Ends with a close frame once the queue is closed and empty.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Frame>,
    ping_every: Duration,
) {
    let mut ping = tokio::time::interval(ping_every);
    // Skip the immediate first tick
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                    return;
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    return;
                }
            }
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}
