//! Metric names recorded by the hub and the gateway.
//!
//! Recording goes through the `metrics` facade; whichever recorder the binary
//! installs decides where they end up.

/// WebSocket connections admitted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket sessions ended (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Connections currently in the registry (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Upgrade requests refused by the admission gate (counter, labels: reason).
pub const WS_ADMISSION_REJECTIONS_TOTAL: &str = "ws_admission_rejections_total";
/// Publish intents processed (counter, labels: destination).
pub const HUB_PUBLISH_TOTAL: &str = "hub_publish_total";
/// Frames placed on connection queues (counter).
pub const HUB_DELIVERIES_TOTAL: &str = "hub_deliveries_total";
/// Connections dropped for a full or closed queue (counter, labels: reason).
pub const HUB_EVICTIONS_TOTAL: &str = "hub_evictions_total";

/// Every name above, for exporters that want to pre-describe them.
pub const ALL: [&str; 7] = [
    WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
    WS_CONNECTIONS_ACTIVE,
    WS_ADMISSION_REJECTIONS_TOTAL,
    HUB_PUBLISH_TOTAL,
    HUB_DELIVERIES_TOTAL,
    HUB_EVICTIONS_TOTAL,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_snake_case() {
        for name in ALL {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "{name} is not snake_case"
            );
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names = ALL.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL.len());
    }
}
