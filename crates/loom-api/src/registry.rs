//! Migration registry routes: `POST /registry/announce`,
//! `GET /migrations`, `GET /migrations/{id}`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use loom_core::Migration;
use loom_service::Service;

use crate::error::service_error_response;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/registry/announce", post(announce))
        .route("/migrations", get(list_migrations))
        .route("/migrations/:id", get(get_migration))
        .with_state(state)
}

/// `POST /registry/announce` — upsert a migration definition. Returns
/// the merged migration.
#[utoipa::path(
    post,
    path = "/registry/announce",
    request_body = Migration,
    responses(
        (status = 200, description = "Migration announced", body = Migration),
        (status = 400, description = "Malformed body"),
        (status = 500, description = "Internal server error")
    ),
    tag = "registry"
)]
pub async fn announce(State(state): State<AppState>, Json(migration): Json<Migration>) -> Response {
    match state.service.announce(migration).await {
        Ok(merged) => Json(merged).into_response(),
        Err(err) => service_error_response(err),
    }
}

/// `GET /migrations` — list every announced migration.
#[utoipa::path(
    get,
    path = "/migrations",
    responses(
        (status = 200, description = "All announced migrations", body = Vec<Migration>),
        (status = 500, description = "Internal server error")
    ),
    tag = "registry"
)]
pub async fn list_migrations(State(state): State<AppState>) -> Response {
    match state.service.list_migrations().await {
        Ok(migrations) => Json(migrations).into_response(),
        Err(err) => service_error_response(err),
    }
}

/// `GET /migrations/{id}` — fetch a single migration by id.
#[utoipa::path(
    get,
    path = "/migrations/{id}",
    params(("id" = String, Path, description = "Migration id")),
    responses(
        (status = 200, description = "Migration found", body = Migration),
        (status = 404, description = "Migration not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "registry"
)]
pub async fn get_migration(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.service.get_migration(&id).await {
        Ok(migration) => Json(migration).into_response(),
        Err(err) => service_error_response(err),
    }
}
