//! `KanbanServer`: Axum HTTP + WebSocket server in front of the hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use kanban_core::{ProjectId, UserStatusPayload};
use kanban_hub::{AdmissionGate, Hub, HubHandle, MembershipDirectory, member_statuses};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::extract_token;
use crate::config::ServerConfig;
use crate::error::{ApiError, ServerError};
use crate::health::{self, HealthResponse};
use crate::response::ApiResponse;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::SessionConfig;
use crate::websocket::upgrade::ws_handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Producer handle to the dispatcher.
    pub hub: HubHandle,
    /// Decides who may connect.
    pub gate: Arc<dyn AdmissionGate>,
    /// Project membership, for room listings.
    pub directory: Arc<dyn MembershipDirectory>,
    /// Heartbeat timing for new sessions.
    pub session: SessionConfig,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle; `/metrics` answers 404 without one.
    pub metrics: Option<PrometheusHandle>,
}

/// The kanban realtime server.
pub struct KanbanServer {
    config: ServerConfig,
    hub: HubHandle,
    hub_task: Mutex<Option<JoinHandle<()>>>,
    gate: Arc<dyn AdmissionGate>,
    directory: Arc<dyn MembershipDirectory>,
    metrics: Option<PrometheusHandle>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl KanbanServer {
    /// Create a server and start its dispatcher.
    ///
    /// The dispatcher stops when the shutdown coordinator fires. Must be
    /// called inside a Tokio runtime.
    pub fn new(
        config: ServerConfig,
        gate: Arc<dyn AdmissionGate>,
        directory: Arc<dyn MembershipDirectory>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (hub, hub_task) = Hub::spawn(&config.hub, shutdown.hub_token());
        Self {
            config,
            hub,
            hub_task: Mutex::new(Some(hub_task)),
            gate,
            directory,
            metrics,
            shutdown,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Result<Router, ServerError> {
        let state = AppState {
            hub: self.hub.clone(),
            gate: self.gate.clone(),
            directory: self.directory.clone(),
            session: SessionConfig {
                heartbeat_interval: self.config.heartbeat_interval,
                heartbeat_max_missed: self.config.heartbeat_max_missed,
            },
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Ok(Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/projects/{project_id}/online-users", get(online_users_handler))
            .with_state(state)
            .layer(cors_layer(&self.config.client_url)?)
            .layer(TraceLayer::new_for_http()))
    }

    /// Bind the listener and serve until shutdown.
    ///
    /// Returns the bound address and the serving task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let router = self.router()?;
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "kanban server listening");

        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server stopped with error");
            }
        });
        Ok((addr, handle))
    }

    /// Producer handle for publishing domain events.
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// The dispatcher task, for awaiting it on shutdown. Yields it once.
    pub fn take_hub_task(&self) -> Option<JoinHandle<()>> {
        self.hub_task.lock().take()
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

fn cors_layer(client_url: &str) -> Result<CorsLayer, ServerError> {
    if client_url.trim() == "*" {
        return Ok(CorsLayer::permissive());
    }
    let origin = HeaderValue::from_str(client_url.trim_end_matches('/'))
        .map_err(|e| ServerError::ClientUrl(format!("{client_url}: {e}")))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, &state.hub))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            crate::metrics::render(handle),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// GET /projects/{project_id}/online-users
///
/// Every project member with `online` or `offline`. The caller must be a
/// member of the project.
async fn online_users_handler(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<UserStatusPayload>>>, ApiError> {
    let room = ProjectId::from(project_id);
    let token = extract_token(query.token.as_deref(), &headers).unwrap_or_default();
    let _ = state.gate.admit(&token, Some(&room)).await?;

    let online = state.hub.online_users(room.clone()).await?;
    let members = state.directory.members(&room).await?;
    Ok(Json(ApiResponse::success(
        "Online users fetched successfully",
        member_statuses(&members, &online),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Claims, JwtAdmission, issue_token};
    use axum::body::Body;
    use axum::http::Request;
    use kanban_core::UserId;
    use kanban_hub::InMemoryMembership;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    const SECRET: &str = "server-test-secret";

    fn make_server_with(metrics: Option<PrometheusHandle>) -> KanbanServer {
        let dir = Arc::new(InMemoryMembership::new());
        dir.add(ProjectId::from("p1"), UserId::from("alice"));
        dir.add(ProjectId::from("p1"), UserId::from("bob"));
        let gate = Arc::new(JwtAdmission::new(SECRET, dir.clone()));
        KanbanServer::new(ServerConfig::default(), gate, dir, metrics)
    }

    fn make_server() -> KanbanServer {
        make_server_with(None)
    }

    fn token(user: &str) -> String {
        issue_token(SECRET, &Claims::new(user, user, format!("{user}@example.com"), false))
            .unwrap()
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    #[tokio::test]
    async fn server_with_default_config() {
        let server = make_server();
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
        assert_eq!(server.hub().connection_count(), 0);
        assert!(!server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = make_server().router().unwrap();
        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert!(body["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn ws_without_token_is_unauthorized() {
        let app = make_server().router().unwrap();
        let (status, body) = get_json(app, "/ws?project_id=p1").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn ws_with_bad_token_is_unauthorized() {
        let app = make_server().router().unwrap();
        let (status, _) = get_json(app, "/ws?token=garbage&project_id=p1").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ws_for_non_member_is_forbidden() {
        let app = make_server().router().unwrap();
        let uri = format!("/ws?token={}&project_id=p1", token("mallory"));
        let (status, body) = get_json(app, &uri).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "You are not a member of this project");
    }

    #[tokio::test]
    async fn admitted_request_without_upgrade_headers_is_rejected_by_axum() {
        let server = make_server();
        let app = server.router().unwrap();
        let uri = format!("/ws?token={}&project_id=p1", token("alice"));
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
        assert_ne!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(server.hub().connection_count(), 0);
    }

    #[tokio::test]
    async fn online_users_lists_members_offline_when_nobody_connected() {
        let app = make_server().router().unwrap();
        let uri = format!("/projects/p1/online-users?token={}", token("alice"));
        let (status, body) = get_json(app, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(
            body["data"],
            serde_json::json!([
                {"id": "alice", "status": "offline"},
                {"id": "bob", "status": "offline"}
            ])
        );
    }

    #[tokio::test]
    async fn online_users_accepts_bearer_header() {
        let app = make_server().router().unwrap();
        let req = Request::builder()
            .uri("/projects/p1/online-users")
            .header(AUTHORIZATION, format!("Bearer {}", token("bob")))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn online_users_requires_membership() {
        let app = make_server().router().unwrap();
        let uri = format!("/projects/p1/online-users?token={}", token("mallory"));
        let (status, _) = get_json(app, &uri).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn online_users_after_shutdown_is_unavailable() {
        let server = make_server();
        let app = server.router().unwrap();
        server.shutdown().shutdown();
        if let Some(task) = server.take_hub_task() {
            task.await.unwrap();
        }
        let uri = format!("/projects/p1/online-users?token={}", token("alice"));
        let (status, body) = get_json(app, &uri).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn health_reports_draining_after_shutdown() {
        let server = make_server();
        let app = server.router().unwrap();
        server.shutdown().shutdown();
        if let Some(task) = server.take_hub_task() {
            task.await.unwrap();
        }
        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "draining");
    }

    #[tokio::test]
    async fn metrics_without_handle_is_not_found() {
        let app = make_server().router().unwrap();
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_with_handle_renders_text() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let app = make_server_with(Some(handle)).router().unwrap();
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = make_server().router().unwrap();
        let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn cors_accepts_wildcard_and_origin() {
        assert!(cors_layer("*").is_ok());
        assert!(cors_layer("http://localhost:3000/").is_ok());
    }

    #[test]
    fn cors_rejects_unrepresentable_origin() {
        assert!(cors_layer("http://bad\norigin").is_err());
    }

    #[tokio::test]
    async fn take_hub_task_yields_once() {
        let server = make_server();
        assert!(server.take_hub_task().is_some());
        assert!(server.take_hub_task().is_none());
    }
}
