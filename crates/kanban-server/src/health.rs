//! `/health` endpoint.

use std::time::Instant;

use kanban_hub::HubHandle;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while the dispatcher accepts intents, `"draining"` once it
    /// has stopped.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Connections currently registered with the hub.
    pub connections: usize,
}

/// Snapshot the hub for `/health`. Never waits on the dispatcher.
pub fn health_check(start_time: Instant, hub: &HubHandle) -> HealthResponse {
    HealthResponse {
        status: if hub.is_closed() { "draining" } else { "ok" },
        uptime_secs: start_time.elapsed().as_secs(),
        connections: hub.connection_count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use kanban_core::{ProjectId, UserId};
    use kanban_hub::{Connection, Hub, HubConfig};
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn idle_hub_is_ok() {
        let (hub, _task) = Hub::spawn(&HubConfig::default(), CancellationToken::new());
        let resp = health_check(Instant::now(), &hub);
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.connections, 0);
        assert!(resp.uptime_secs < 2);
    }

    #[tokio::test]
    async fn counts_registered_connections() {
        let (hub, _task) = Hub::spawn(&HubConfig::default(), CancellationToken::new());
        let (a, _ra) = Connection::new(UserId::from("a"), Some(ProjectId::from("p1")), 4);
        let (b, _rb) = Connection::new(UserId::from("b"), None, 4);
        hub.register(a).await.unwrap();
        hub.register(b).await.unwrap();
        // Round-trip through the loop so both registrations are applied.
        let _ = hub.online_users(ProjectId::from("p1")).await.unwrap();

        assert_eq!(health_check(Instant::now(), &hub).connections, 2);
    }

    #[tokio::test]
    async fn stopped_hub_reports_draining() {
        let cancel = CancellationToken::new();
        let (hub, task) = Hub::spawn(&HubConfig::default(), cancel.clone());
        cancel.cancel();
        task.await.unwrap();

        let resp = health_check(Instant::now(), &hub);
        assert_eq!(resp.status, "draining");
        assert_eq!(resp.connections, 0);
    }

    #[tokio::test]
    async fn serialization() {
        let (hub, _task) = Hub::spawn(&HubConfig::default(), CancellationToken::new());
        let start = Instant::now().checked_sub(Duration::from_secs(60)).unwrap();
        let parsed = serde_json::to_value(health_check(start, &hub)).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert!(parsed["uptime_secs"].as_u64().unwrap() >= 59);
    }
}
