//! HTTP API gateway for ContextMesh.
//!
//! Exposes REST endpoints for codebase analysis, pull-request webhooks,
//! the recent-event feed, and health checks.
//!
//! Built on Axum for high performance async HTTP.

pub mod events;
pub mod webhook;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use contextmesh_analysis::{CacheCoordinator, Persona};
use contextmesh_config::AppConfig;
use contextmesh_ingest::ContextBuilder;

use crate::events::{Event, EventLog, RECENT_LIMIT};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub coordinator: CacheCoordinator,
    pub events: EventLog,
}

impl GatewayState {
    pub fn new(config: AppConfig) -> Self {
        let coordinator = CacheCoordinator::from_config(&config);
        Self {
            config,
            coordinator,
            events: EventLog::default(),
        }
    }
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS limited to `gateway.allowed_origins`
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.allowed_origins);

    Router::new()
        .route("/health", get(health_handler))
        .route("/analyze", post(analyze_handler))
        .route("/webhook", post(webhook_handler))
        .route("/events", get(events_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = Arc::new(GatewayState::new(config));
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(default = "default_repo_path")]
    repo_path: String,
    prompt: String,
    #[serde(default = "default_agent_type")]
    agent_type: String,
}

fn default_repo_path() -> String {
    ".".into()
}

fn default_agent_type() -> String {
    Persona::Architect.name().into()
}

#[derive(Serialize)]
struct AnalyzeResponse {
    agent: String,
    analysis: String,
}

async fn analyze_handler(
    State(state): State<SharedState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    info!(repo_path = %request.repo_path, agent = %request.agent_type, "Ingesting repository");

    let root = PathBuf::from(&request.repo_path);
    let extra = state.config.ingest.extra_patterns.clone();
    let built = tokio::task::spawn_blocking(move || {
        ContextBuilder::new().with_extra_patterns(extra).build(&root)
    })
    .await;

    let document = match built {
        Ok(Ok(document)) => document,
        Ok(Err(e)) => return Err(ingestion_failed(e)),
        Err(e) => return Err(ingestion_failed(e)),
    };

    let context = document.render();
    let persona = Persona::from_name(&request.agent_type);
    info!(chars = context.len(), files = document.len(), persona = %persona, "Submitting analysis");

    let analysis = state
        .coordinator
        .analyze(&context, &request.prompt, persona.instruction())
        .await;

    Ok(Json(AnalyzeResponse {
        agent: request.agent_type,
        analysis,
    }))
}

fn ingestion_failed(e: impl Display) -> ApiError {
    error!(error = %e, "Ingestion failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            detail: format!("Ingestion failed: {e}"),
        }),
    )
}

#[derive(Serialize)]
struct WebhookResponse {
    status: &'static str,
    event_id: u64,
}

async fn webhook_handler(
    State(state): State<SharedState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<WebhookResponse>, ApiError> {
    if !payload.is_object() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                detail: "Webhook payload must be a JSON object".into(),
            }),
        ));
    }

    let event = webhook::process(&payload, &state.coordinator, &state.events).await;

    Ok(Json(WebhookResponse {
        status: "processed",
        event_id: event.id,
    }))
}

async fn events_handler(State(state): State<SharedState>) -> Json<Vec<Event>> {
    Json(state.events.recent(RECENT_LIMIT).await)
}
