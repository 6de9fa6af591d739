//! # kanban
//!
//! Kanban realtime hub binary: loads settings, wires admission and the hub,
//! and serves HTTP/WebSocket until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kanban_hub::InMemoryMembership;
use kanban_server::{JwtAdmission, KanbanServer, ServerConfig};
use kanban_settings::KanbanSettings;

/// Kanban realtime hub server.
#[derive(Parser, Debug)]
#[command(name = "kanban", about = "Kanban realtime hub server")]
struct Cli {
    /// Settings file (defaults to `KANBAN_SETTINGS` or `~/.kanban/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Port to bind (overrides settings and `PORT`).
    #[arg(long)]
    port: Option<u16>,

    /// Host to bind (overrides settings and `KANBAN_HOST`).
    #[arg(long)]
    host: Option<String>,
}

/// Resolve settings: file layer, then environment (read through `env`),
/// then CLI flags.
fn resolve_settings<F>(cli: &Cli, env: F) -> Result<KanbanSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(kanban_settings::settings_path);
    let mut settings = kanban_settings::load_file_layer(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    kanban_settings::apply_overrides(&mut settings, env);
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(host) = &cli.host {
        settings.server.host.clone_from(host);
    }
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

/// Build the server from validated settings. Must run inside a Tokio runtime.
fn build_server(
    settings: &KanbanSettings,
    metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> KanbanServer {
    let directory = Arc::new(InMemoryMembership::from_table(&settings.memberships));
    let gate = Arc::new(JwtAdmission::new(&settings.auth.jwt_secret, directory.clone()));
    KanbanServer::new(ServerConfig::from(settings), gate, directory, metrics)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = resolve_settings(&cli, |key| std::env::var(key).ok())?;

    kanban_server::telemetry::init_tracing(&settings.logging)
        .context("Failed to initialize logging")?;
    let metrics = kanban_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let server = build_server(&settings, Some(metrics));
    let (addr, handle) = server.listen().await.context("Failed to start server")?;
    tracing::info!(
        %addr,
        rooms = settings.memberships.len(),
        "kanban hub ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let mut tasks = vec![handle];
    tasks.extend(server.take_hub_task());
    server
        .shutdown()
        .graceful_shutdown(tasks, Some(server.config().shutdown_timeout))
        .await;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn settings_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    fn cli_for(path: &std::path::Path) -> Cli {
        Cli {
            settings: Some(path.to_path_buf()),
            port: None,
            host: None,
        }
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from(["kanban", "--port", "9000", "--host", "127.0.0.1"]);
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.host.as_deref(), Some("127.0.0.1"));
        assert!(cli.settings.is_none());
    }

    #[test]
    fn flags_override_file() {
        let file = settings_file(r#"{"server": {"port": 7000}, "auth": {"jwtSecret": "s"}}"#);
        let mut cli = cli_for(file.path());
        cli.port = Some(7100);
        let settings = resolve_settings(&cli, |_| None).unwrap();
        assert_eq!(settings.server.port, 7100);
    }

    #[test]
    fn environment_overrides_file() {
        let file = settings_file(r#"{"auth": {"jwtSecret": "from-file"}}"#);
        let env = |key: &str| (key == "JWT_SECRET").then(|| "from-env".to_string());
        let settings = resolve_settings(&cli_for(file.path()), env).unwrap();
        assert_eq!(settings.auth.jwt_secret, "from-env");
    }

    #[test]
    fn missing_secret_is_rejected() {
        let file = settings_file(r#"{"server": {"port": 7000}}"#);
        let err = resolve_settings(&cli_for(file.path()), |_| None).unwrap_err();
        assert!(format!("{err:#}").contains("jwtSecret"), "{err:#}");
    }

    #[tokio::test]
    async fn server_boots_and_shuts_down() {
        let file = settings_file(
            r#"{"server": {"host": "127.0.0.1"}, "auth": {"jwtSecret": "s"}, "memberships": {"p1": ["u1"]}}"#,
        );
        let mut settings = resolve_settings(&cli_for(file.path()), |_| None).unwrap();
        settings.server.port = 0;
        let server = build_server(&settings, None);
        let (addr, handle) = server.listen().await.unwrap();

        let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
        assert!(resp.status().is_success());
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");

        server.shutdown().shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("shutdown timed out")
            .expect("join error");
        assert!(server.take_hub_task().is_some());
    }
}
