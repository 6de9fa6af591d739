//! `GET /ws` upgrade handler.
//!
//! Admission runs before the upgrade: a refused request gets a plain HTTP
//! error and never produces a connection or touches the hub.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use kanban_core::ProjectId;
use kanban_hub::metrics::WS_ADMISSION_REJECTIONS_TOTAL;
use metrics::counter;
use serde::Deserialize;
use tracing::{info, warn};

use super::session::run_ws_session;
use crate::auth::extract_token;
use crate::error::ApiError;
use crate::server::AppState;

/// Query parameters of the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    /// Session token; may instead come as a bearer header.
    pub token: Option<String>,
    /// Room to join. Absent means an unscoped connection.
    pub project_id: Option<String>,
}

/// Admit, then upgrade and hand the socket to a session.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let token = extract_token(query.token.as_deref(), &headers).unwrap_or_default();
    let room = query
        .project_id
        .filter(|p| !p.is_empty())
        .map(ProjectId::from);

    let user = match state.gate.admit(&token, room.as_ref()).await {
        Ok(user) => user,
        Err(e) => {
            warn!(reason = e.reason(), project_id = ?room, error = %e, "upgrade refused");
            counter!(WS_ADMISSION_REJECTIONS_TOTAL, "reason" => e.reason()).increment(1);
            return ApiError::from(e).into_response();
        }
    };

    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    info!(user_id = %user, project_id = ?room, "upgrade admitted");
    let (conn, outbound) = state.hub.connection(user, room);
    let hub = state.hub.clone();
    let session = state.session;
    ws.on_upgrade(move |socket| run_ws_session(socket, conn, outbound, hub, session))
}
