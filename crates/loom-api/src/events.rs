//! The migrator callback route: `POST /event/{instanceId}`.
//!
//! `instanceId` is the workflow id a migrator was handed at dispatch
//! time (`callbackId` in the `DispatchStepRequest`); it is parsed back
//! into `(migration_id, candidate_id)` with [`loom_core::parse_workflow_id`]
//! rather than trusting a caller-supplied pair, since the workflow id is
//! the only thing migrators are given.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use loom_core::StepStatusEvent;
use loom_service::Service;

use crate::error::{malformed_body, service_error_response};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
}

pub fn routes(state: AppState) -> Router {
    Router::new().route("/event/:instance_id", post(handle_event)).with_state(state)
}

/// `POST /event/{instanceId}` — a migrator reporting a step outcome
/// into the workflow identified by `instanceId`.
#[utoipa::path(
    post,
    path = "/event/{instanceId}",
    params(("instanceId" = String, Path, description = "Workflow instance id, i.e. the callbackId handed to the migrator at dispatch")),
    request_body = StepStatusEvent,
    responses(
        (status = 202, description = "Event delivered"),
        (status = 400, description = "Instance id is not a valid workflow id"),
        (status = 404, description = "Migration or candidate not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "events"
)]
pub async fn handle_event(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    Json(event): Json<StepStatusEvent>,
) -> Response {
    let (migration_id, candidate_id) = match loom_core::parse_workflow_id(&instance_id) {
        Ok(pair) => pair,
        Err(err) => return malformed_body(err.to_string()),
    };

    match state.service.handle_event(&migration_id, &candidate_id, event).await {
        Ok(()) => axum::http::StatusCode::ACCEPTED.into_response(),
        Err(err) => service_error_response(err),
    }
}
