//! Per-candidate routes: submit, enriched list, dry-run,
//! start, cancel, retry-step, inputs, steps.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use loom_core::Candidate;
use loom_notifier::DryRunResult;
use loom_service::{CandidateRunStatus, Service};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::service_error_response;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/migrations/:id/candidates", post(submit_candidates).get(get_candidates))
        .route("/migrations/:id/dry-run", post(dry_run))
        .route("/migrations/:id/candidates/:cand/start", post(start))
        .route("/migrations/:id/candidates/:cand/cancel", post(cancel))
        .route("/migrations/:id/candidates/:cand/retry-step", post(retry_step))
        .route("/migrations/:id/candidates/:cand/inputs", post(update_inputs))
        .route("/migrations/:id/candidates/:cand/steps", get(get_steps))
        .with_state(state)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DryRunBody {
    pub candidate: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StartBody {
    #[serde(default)]
    pub inputs: HashMap<String, String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RetryStepBody {
    pub step_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CandidateStepsResponse {
    pub status: &'static str,
    pub steps: Vec<loom_core::StepState>,
}

/// `POST /migrations/{id}/candidates` — replace the candidate set.
#[utoipa::path(
    post,
    path = "/migrations/{id}/candidates",
    params(("id" = String, Path, description = "Migration id")),
    request_body = Vec<Candidate>,
    responses(
        (status = 204, description = "Candidates replaced"),
        (status = 404, description = "Migration not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "candidates"
)]
pub async fn submit_candidates(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(candidates): Json<Vec<Candidate>>,
) -> Response {
    match state.service.submit_candidates(&id, candidates).await {
        Ok(()) => axum::http::StatusCode::NO_CONTENT.into_response(),
        Err(err) => service_error_response(err),
    }
}

/// `GET /migrations/{id}/candidates` — enriched candidates, triggering
/// heal-through-read reconciliation.
#[utoipa::path(
    get,
    path = "/migrations/{id}/candidates",
    params(("id" = String, Path, description = "Migration id")),
    responses(
        (status = 200, description = "Candidates with reconciled status", body = Vec<Candidate>),
        (status = 404, description = "Migration not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "candidates"
)]
pub async fn get_candidates(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.service.get_candidates(&id).await {
        Ok(candidates) => Json(candidates).into_response(),
        Err(err) => service_error_response(err),
    }
}

/// `POST /migrations/{id}/dry-run` — simulate a candidate's step sequence
/// without touching any run state.
#[utoipa::path(
    post,
    path = "/migrations/{id}/dry-run",
    params(("id" = String, Path, description = "Migration id")),
    request_body = DryRunBody,
    responses(
        (status = 200, description = "Per-step dry-run result", body = DryRunResult),
        (status = 404, description = "Migration or candidate not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "candidates"
)]
pub async fn dry_run(State(state): State<AppState>, Path(id): Path<String>, Json(body): Json<DryRunBody>) -> Response {
    match state.service.dry_run(&id, &body.candidate).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => service_error_response(err),
    }
}

/// `POST /migrations/{id}/candidates/{cand}/start` — start a candidate's
/// run.
#[utoipa::path(
    post,
    path = "/migrations/{id}/candidates/{cand}/start",
    params(
        ("id" = String, Path, description = "Migration id"),
        ("cand" = String, Path, description = "Candidate id")
    ),
    request_body = StartBody,
    responses(
        (status = 202, description = "Run started"),
        (status = 404, description = "Migration or candidate not found"),
        (status = 409, description = "Candidate already running or completed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "candidates"
)]
pub async fn start(
    State(state): State<AppState>,
    Path((id, cand)): Path<(String, String)>,
    body: axum::body::Bytes,
) -> Response {
    let start_body = if body.is_empty() {
        StartBody::default()
    } else {
        match serde_json::from_slice::<StartBody>(&body) {
            Ok(b) => b,
            Err(err) => return crate::error::malformed_body(err.to_string()),
        }
    };

    match state.service.start(&id, &cand, start_body.inputs).await {
        Ok(_status) => axum::http::StatusCode::ACCEPTED.into_response(),
        Err(err) => service_error_response(err),
    }
}

/// `POST /migrations/{id}/candidates/{cand}/cancel` — cancel a running
/// candidate.
#[utoipa::path(
    post,
    path = "/migrations/{id}/candidates/{cand}/cancel",
    params(
        ("id" = String, Path, description = "Migration id"),
        ("cand" = String, Path, description = "Candidate id")
    ),
    responses(
        (status = 204, description = "Cancellation requested"),
        (status = 404, description = "Migration or candidate not found"),
        (status = 409, description = "Candidate is not running"),
        (status = 500, description = "Internal server error")
    ),
    tag = "candidates"
)]
pub async fn cancel(State(state): State<AppState>, Path((id, cand)): Path<(String, String)>) -> Response {
    match state.service.cancel(&id, &cand, "operator".to_string()).await {
        Ok(()) => axum::http::StatusCode::NO_CONTENT.into_response(),
        Err(err) => service_error_response(err),
    }
}

/// `POST /migrations/{id}/candidates/{cand}/retry-step` — re-dispatch a
/// failed step.
#[utoipa::path(
    post,
    path = "/migrations/{id}/candidates/{cand}/retry-step",
    params(
        ("id" = String, Path, description = "Migration id"),
        ("cand" = String, Path, description = "Candidate id")
    ),
    request_body = RetryStepBody,
    responses(
        (status = 202, description = "Retry signalled"),
        (status = 404, description = "Migration or candidate not found"),
        (status = 409, description = "Candidate is not running"),
        (status = 500, description = "Internal server error")
    ),
    tag = "candidates"
)]
pub async fn retry_step(
    State(state): State<AppState>,
    Path((id, cand)): Path<(String, String)>,
    Json(body): Json<RetryStepBody>,
) -> Response {
    match state.service.retry_step(&id, &cand, &body.step_name).await {
        Ok(()) => axum::http::StatusCode::ACCEPTED.into_response(),
        Err(err) => service_error_response(err),
    }
}

/// `POST /migrations/{id}/candidates/{cand}/inputs` — edit a running
/// candidate's metadata.
#[utoipa::path(
    post,
    path = "/migrations/{id}/candidates/{cand}/inputs",
    params(
        ("id" = String, Path, description = "Migration id"),
        ("cand" = String, Path, description = "Candidate id")
    ),
    request_body = HashMap<String, String>,
    responses(
        (status = 202, description = "Inputs queued for the next dispatch boundary"),
        (status = 404, description = "Migration or candidate not found"),
        (status = 409, description = "Candidate is not running"),
        (status = 500, description = "Internal server error")
    ),
    tag = "candidates"
)]
pub async fn update_inputs(
    State(state): State<AppState>,
    Path((id, cand)): Path<(String, String)>,
    Json(inputs): Json<HashMap<String, String>>,
) -> Response {
    match state.service.update_inputs(&id, &cand, inputs).await {
        Ok(()) => axum::http::StatusCode::ACCEPTED.into_response(),
        Err(err) => service_error_response(err),
    }
}

/// `GET /migrations/{id}/candidates/{cand}/steps` — live per-step state
/// for a candidate's run.
#[utoipa::path(
    get,
    path = "/migrations/{id}/candidates/{cand}/steps",
    params(
        ("id" = String, Path, description = "Migration id"),
        ("cand" = String, Path, description = "Candidate id")
    ),
    responses(
        (status = 200, description = "Candidate's live step state", body = CandidateStepsResponse),
        (status = 404, description = "Migration or candidate not found"),
        (status = 409, description = "Candidate is not running"),
        (status = 500, description = "Internal server error")
    ),
    tag = "candidates"
)]
pub async fn get_steps(State(state): State<AppState>, Path((id, cand)): Path<(String, String)>) -> Response {
    match state.service.get_candidate_steps(&id, &cand).await {
        Ok(Some(view)) => {
            let status = match view.status {
                CandidateRunStatus::Running => "running",
                CandidateRunStatus::Completed => "completed",
            };
            Json(CandidateStepsResponse {
                status,
                steps: view.steps,
            })
            .into_response()
        }
        // §4.5: a `RunNotFound` from the engine means there is nothing
        // to report for this candidate.
        Ok(None) => service_error_response(loom_core::ServiceError::run_not_found(format!("{id}::{cand}"))),
        Err(err) => service_error_response(err),
    }
}
