//! Heartbeat liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use kanban_hub::Connection;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The peer stopped responding.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Watch a connection's alive flag.
///
/// At each `interval` tick the flag is checked and reset. Any inbound frame or
/// pong sets it again. After `max_missed` consecutive ticks without activity
/// the peer is considered dead.
pub async fn run_heartbeat(
    connection: Arc<Connection>,
    interval: Duration,
    max_missed: u32,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut check_interval = time::interval(interval);
    let max_missed = max_missed.max(1);
    let mut missed: u32 = 0;

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                if connection.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanban_core::UserId;

    fn make_connection() -> Arc<Connection> {
        Connection::new(UserId::from("hb_user"), None, 4).0
    }

    #[tokio::test]
    async fn heartbeat_cancelled() {
        let conn = make_connection();
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();

        let handle = tokio::spawn(async move {
            run_heartbeat(conn, Duration::from_secs(100), 3, cancel2).await
        });

        cancel.cancel();
        let result = handle.await.unwrap();
        assert_eq!(result, HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out_after_max_missed() {
        let conn = make_connection();
        let cancel = CancellationToken::new();

        let start = time::Instant::now();
        let result = run_heartbeat(conn, Duration::from_millis(100), 3, cancel).await;

        assert_eq!(result, HeartbeatResult::TimedOut);
        // First tick consumes the initial alive flag, then three misses.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300) && elapsed < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn active_peer_stays_alive() {
        let conn = make_connection();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_heartbeat(
            conn.clone(),
            Duration::from_millis(50),
            2,
            cancel.clone(),
        ));

        for _ in 0..10 {
            time::sleep(Duration::from_millis(20)).await;
            conn.mark_alive();
        }

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_max_missed_behaves_as_one() {
        let conn = make_connection();
        let _ = conn.check_alive();
        let result =
            run_heartbeat(conn, Duration::from_millis(10), 0, CancellationToken::new()).await;
        assert_eq!(result, HeartbeatResult::TimedOut);
    }
}
