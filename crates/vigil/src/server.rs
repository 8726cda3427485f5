//! Peer-facing HTTP endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use vigil_core::error::VigilError;
use vigil_core::fleet::DbConnInfo;
use vigil_core::instance::{AppInstance, InstanceId, InstanceStore};
use vigil_core::probe::{window_start, Clock};
use vigil_runtime::heartbeat::LocalInstance;
use vigil_runtime::wake::CoveragePlanner;

pub const INSTANCES_PATH: &str = "/storefront/api/app-instances";
pub const ACTIVITY_PATH: &str = "/storefront/api/app-instances/activity";

/// Shared state of the peer endpoints.
#[derive(Clone)]
pub struct ServerState {
    pub local: LocalInstance,
    pub store: Arc<dyn InstanceStore>,
    pub planner: Arc<CoveragePlanner>,
    pub clock: Arc<dyn Clock>,
    pub active_window: chrono::Duration,
}

/// Local instance as reported to a waking peer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSummary {
    pub uuid: InstanceId,
    pub region: String,
    pub node_id: i64,
    pub first_heartbeat: Option<DateTime<Utc>>,
    pub last_heartbeat: DateTime<Utc>,
    pub last_api_activity: DateTime<Utc>,
}

impl From<AppInstance> for InstanceSummary {
    fn from(instance: AppInstance) -> Self {
        Self {
            uuid: instance.uuid,
            region: instance.region,
            node_id: instance.node_id,
            first_heartbeat: instance.first_heartbeat,
            last_heartbeat: instance.last_heartbeat,
            last_api_activity: instance.last_api_activity,
        }
    }
}

/// Error body returned by the endpoints.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

struct ApiError(VigilError);

impl From<VigilError> for ApiError {
    fn from(e: VigilError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Build the router for the given sync path.
pub fn router(state: ServerState, sync_path: &str) -> Router {
    Router::new()
        .route(sync_path, put(sync_handler))
        .route(INSTANCES_PATH, get(list_handler))
        .route(ACTIVITY_PATH, post(activity_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// A peer woke this process.
async fn sync_handler(
    State(state): State<ServerState>,
    Json(info): Json<DbConnInfo>,
) -> Json<InstanceSummary> {
    tracing::info!(db_host = %info.host, db_name = %info.db_name, "Woken by peer instance");
    state.local.record_api_activity(state.clock.now()).await;
    state.planner.spawn_plan_wakeups();
    Json(state.local.snapshot().await.into())
}

async fn list_handler(
    State(state): State<ServerState>,
) -> Result<Json<Vec<AppInstance>>, ApiError> {
    let since = window_start(state.clock.now(), state.active_window)?;
    let instances = state.store.list_active(since).await?;
    Ok(Json(instances))
}

async fn activity_handler(State(state): State<ServerState>) -> StatusCode {
    state.local.record_api_activity(state.clock.now()).await;
    state.planner.spawn_plan_wakeups();
    StatusCode::NO_CONTENT
}
