//! Tracing subscriber setup.

use kanban_settings::LoggingSettings;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::ServerError;

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(settings: &LoggingSettings) -> &str {
    let level = settings.level.trim();
    if level.is_empty() { "info" } else { level }
}

/// Install the global subscriber. Call once at startup.
///
/// `RUST_LOG` overrides the configured level. Output goes to stderr, as JSON
/// lines when `settings.json` is set and compact text otherwise.
pub fn init_tracing(settings: &LoggingSettings) -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(settings)));

    let json_layer = settings.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!settings.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| ServerError::Telemetry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_used() {
        let settings = LoggingSettings {
            level: "kanban_hub=debug,info".into(),
            json: false,
        };
        assert_eq!(default_directive(&settings), "kanban_hub=debug,info");
    }

    #[test]
    fn blank_level_falls_back_to_info() {
        let settings = LoggingSettings {
            level: "  ".into(),
            json: true,
        };
        assert_eq!(default_directive(&settings), "info");
    }
}
