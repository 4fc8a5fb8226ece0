//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::SessionStats;
use crate::netcode::Tick;
use crate::util::time::uptime_secs;
use crate::vehicle::{VehicleArchetype, VehicleConfig};
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let cors = match &state.config.client_origin {
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE])
                .allow_credentials(true)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]),
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/archetypes", get(archetypes_handler))
        .route("/archetypes/:name", get(archetype_handler))
        .route("/sessions/:id", get(session_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    tick_rate: u32,
    active_sessions: usize,
    total_ticks: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        tick_rate: state.config.tick_rate,
        active_sessions: state.sessions.active_sessions(),
        total_ticks: state.sessions.total_ticks(),
    })
}

// ============================================================================
// Vehicle presets
// ============================================================================

#[derive(Serialize)]
struct ArchetypeResponse {
    archetype: VehicleArchetype,
    config: VehicleConfig,
}

impl ArchetypeResponse {
    fn new(archetype: VehicleArchetype) -> Self {
        Self {
            archetype,
            config: VehicleConfig::for_archetype(archetype),
        }
    }
}

async fn archetypes_handler() -> Json<Vec<ArchetypeResponse>> {
    Json(VehicleArchetype::ALL.into_iter().map(ArchetypeResponse::new).collect())
}

async fn archetype_handler(Path(name): Path<String>) -> Result<Json<ArchetypeResponse>, AppError> {
    let archetype: VehicleArchetype = name
        .parse()
        .map_err(|_| AppError::NotFound(format!("Unknown archetype {name}")))?;
    Ok(Json(ArchetypeResponse::new(archetype)))
}

// ============================================================================
// Session inspection
// ============================================================================

#[derive(Serialize)]
struct SessionResponse {
    session_id: Uuid,
    archetype: VehicleArchetype,
    tick: Tick,
    stats: SessionStats,
}

async fn session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = state
        .sessions
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("No session {id}")))?;
    let stats = handle.stats();

    Ok(Json(SessionResponse {
        session_id: handle.id,
        archetype: handle.archetype,
        tick: stats.tick,
        stats,
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let router = build_router(AppState::new(Config::default()));
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_no_sessions() {
        let (status, body) = get_json("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_sessions"], 0);
        assert_eq!(body["tick_rate"], 60);
    }

    #[tokio::test]
    async fn test_archetype_lookup() {
        let (status, body) = get_json("/archetypes").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(2));

        let (status, body) = get_json("/archetypes/bus").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["archetype"], "bus");

        let (status, body) = get_json("/archetypes/tank").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("tank"));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (status, _) = get_json(&format!("/sessions/{}", Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
