//! Loom's HTTP surface: a thin axum adapter wiring the
//! Store, Execution Engine, and Migrator Notifier ports into a `Service`,
//! then exposing it over HTTP.

mod candidates;
mod config;
mod error;
mod events;
mod registry;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use loom_core::{Candidate, InputSpec, Migration, StepDefinition, StepState, StepStatus, StepStatusEvent};
use loom_durable::InMemoryWorkflowEventStore;
use loom_engine::{ExecutionEngine, LoomExecutionEngine, TracingLifecycleSink};
use loom_notifier::{DryRunPort, DryRunResult, DryRunStepResult, FileDiff, HttpDryRunClient, HttpMigratorNotifier, MigratorNotifier, PubSubMigratorNotifier};
use loom_service::{Service, StoreCandidateStatusWriter};
use loom_store::{InMemoryStore, Store};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Config, EngineKind, NotifierKind};

#[derive(OpenApi)]
#[openapi(
    paths(
        registry::announce,
        registry::list_migrations,
        registry::get_migration,
        candidates::submit_candidates,
        candidates::get_candidates,
        candidates::dry_run,
        candidates::start,
        candidates::cancel,
        candidates::retry_step,
        candidates::update_inputs,
        candidates::get_steps,
        events::handle_event,
    ),
    components(
        schemas(
            Migration, InputSpec, StepDefinition, Candidate, StepState, StepStatus, StepStatusEvent,
            DryRunResult, DryRunStepResult, FileDiff,
            candidates::DryRunBody, candidates::StartBody, candidates::RetryStepBody,
            candidates::CandidateStepsResponse,
        )
    ),
    tags(
        (name = "registry", description = "Migration announcement and lookup"),
        (name = "candidates", description = "Per-candidate run lifecycle"),
        (name = "events", description = "Migrator callbacks")
    ),
    info(
        title = "Loom API",
        version = "0.1.0",
        description = "Migration orchestration kernel: sequencing, reconciliation, and live progress for code-migration campaigns",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

fn build_notifier(kind: NotifierKind) -> Arc<dyn MigratorNotifier> {
    match kind {
        NotifierKind::Http => Arc::new(HttpMigratorNotifier::new()),
        NotifierKind::PubSub => Arc::new(PubSubMigratorNotifier::new()),
    }
}

/// Only one kernel exists today; the match stays exhaustive so adding a
/// second `EngineKind` variant fails to compile here until it's wired up.
fn build_event_store(kind: EngineKind) -> InMemoryWorkflowEventStore {
    match kind {
        EngineKind::InMemory => InMemoryWorkflowEventStore::new(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loom_api=debug,loom_engine=debug,loom_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("loom-api starting...");

    let config = Config::from_env();
    tracing::info!(engine = ?config.engine, notifier = ?config.notifier, addr = %config.http_addr, "configuration loaded");

    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let notifier = build_notifier(config.notifier);
    let status_writer = Arc::new(StoreCandidateStatusWriter::new(store.clone()));
    let lifecycle_sink = Arc::new(TracingLifecycleSink);

    let engine: Arc<dyn ExecutionEngine> = Arc::new(LoomExecutionEngine::new(
        build_event_store(config.engine),
        notifier,
        status_writer,
        lifecycle_sink,
    ));

    let dry_run: Arc<dyn DryRunPort> = Arc::new(HttpDryRunClient::new(config.reserved_migrators.clone()));

    let service = Arc::new(Service::new(store, engine, dry_run, config.reserved_migrators));

    let registry_state = registry::AppState { service: service.clone() };
    let candidates_state = candidates::AppState { service: service.clone() };
    let events_state = events::AppState { service: service.clone() };

    let app = Router::new()
        .merge(registry::routes(registry_state))
        .merge(candidates::routes(candidates_state))
        .merge(events::routes(events_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.http_addr))?;
    tracing::info!(addr = %config.http_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to install ctrl-c handler");
        return;
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}
