//! Server configuration.

use std::time::Duration;

use kanban_hub::HubConfig;
use kanban_settings::KanbanSettings;

/// Runtime configuration for [`KanbanServer`](crate::server::KanbanServer).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Browser origin allowed by CORS; `"*"` allows any.
    pub client_url: String,
    /// Interval between server pings.
    pub heartbeat_interval: Duration,
    /// Unanswered heartbeat checks before a socket is dropped.
    pub heartbeat_max_missed: u32,
    /// Grace period for tasks on shutdown.
    pub shutdown_timeout: Duration,
    /// Dispatcher queue sizing.
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            client_url: "*".into(),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_max_missed: 2,
            shutdown_timeout: Duration::from_secs(5),
            hub: HubConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&KanbanSettings> for ServerConfig {
    fn from(settings: &KanbanSettings) -> Self {
        let server = &settings.server;
        Self {
            host: server.host.clone(),
            port: server.port,
            client_url: server.client_url.clone(),
            heartbeat_interval: server.heartbeat_interval(),
            heartbeat_max_missed: server.heartbeat_max_missed.max(1),
            shutdown_timeout: server.shutdown_timeout(),
            hub: HubConfig {
                outbound_queue: settings.hub.outbound_queue,
                intent_queue: settings.hub.intent_queue,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_on_any_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn default_heartbeat() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(cfg.heartbeat_max_missed, 2);
    }

    #[test]
    fn from_settings_copies_every_field() {
        let mut settings = KanbanSettings::default();
        settings.server.port = 9090;
        settings.server.host = "0.0.0.0".into();
        settings.server.client_url = "https://board.example.com".into();
        settings.server.heartbeat_interval_ms = 1_500;
        settings.hub.outbound_queue = 8;
        settings.hub.intent_queue = 16;

        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9090");
        assert_eq!(cfg.client_url, "https://board.example.com");
        assert_eq!(cfg.heartbeat_interval, Duration::from_millis(1_500));
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(
            cfg.hub,
            HubConfig {
                outbound_queue: 8,
                intent_queue: 16
            }
        );
    }

    #[test]
    fn zero_max_missed_is_clamped() {
        let mut settings = KanbanSettings::default();
        settings.server.heartbeat_max_missed = 0;
        assert_eq!(ServerConfig::from(&settings).heartbeat_max_missed, 1);
    }
}
