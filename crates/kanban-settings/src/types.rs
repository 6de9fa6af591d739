//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may contain any subset of fields and the rest keep their defaults.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the kanban hub server.
///
/// ```json
/// {
///   "server": { "port": 9090, "clientUrl": "https://board.example.com" },
///   "hub": { "outboundQueue": 64 },
///   "memberships": { "p1": ["u1", "u2"] }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KanbanSettings {
    /// Settings schema version.
    pub version: String,
    /// HTTP listener and socket liveness.
    pub server: ServerSettings,
    /// Dispatcher and connection queue sizing.
    pub hub: HubSettings,
    /// Token verification.
    pub auth: AuthSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Seed membership table: project id to member user ids.
    pub memberships: BTreeMap<String, Vec<String>>,
}

impl Default for KanbanSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            server: ServerSettings::default(),
            hub: HubSettings::default(),
            auth: AuthSettings::default(),
            logging: LoggingSettings::default(),
            memberships: BTreeMap::new(),
        }
    }
}

impl KanbanSettings {
    /// Reject values the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(SettingsError::InvalidValue("server.port must be > 0".into()));
        }
        if self.server.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalMs must be > 0".into(),
            ));
        }
        if self.hub.outbound_queue == 0 {
            return Err(SettingsError::InvalidValue(
                "hub.outboundQueue must be > 0".into(),
            ));
        }
        if self.hub.intent_queue == 0 {
            return Err(SettingsError::InvalidValue(
                "hub.intentQueue must be > 0".into(),
            ));
        }
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "auth.jwtSecret must be set (JWT_SECRET)".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Listen port.
    pub port: u16,
    /// Bind address.
    pub host: String,
    /// Browser origin allowed by CORS. `"*"` allows any origin.
    pub client_url: String,
    /// Interval between server pings on each socket.
    pub heartbeat_interval_ms: u64,
    /// Consecutive unanswered pings before a socket is dropped.
    pub heartbeat_max_missed: u32,
    /// Grace period for in-flight work on shutdown.
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            client_url: "http://localhost:3000".to_string(),
            heartbeat_interval_ms: 30_000,
            heartbeat_max_missed: 2,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl ServerSettings {
    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Queue sizing for the dispatcher and its connections.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Frames a connection may buffer before it is evicted.
    pub outbound_queue: usize,
    /// Pending register/unregister/publish/query intents before producers wait.
    pub intent_queue: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            outbound_queue: 256,
            intent_queue: 1024,
        }
    }
}

/// Token verification settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HS256 signing secret shared with the REST layer that issues tokens.
    pub jwt_secret: String,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

/// Log output settings. `RUST_LOG` takes precedence over `level`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive, e.g. `info` or `kanban_hub=debug`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
