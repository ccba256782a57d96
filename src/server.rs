use crate::config::Config;
use crate::constants;
use crate::error::{IngestError, Result};
use crate::observability::metrics;
use crate::pipeline::{IngestSummary, Ingester};
use crate::storage::Storage;
use crate::ticketmaster::{EventSource, TicketmasterClient};
use axum::{
    extract::Query,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Everything the handlers need, shared behind one cheap clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<dyn Storage>,
    pub ingester: Arc<Ingester>,
}

impl AppState {
    /// Wires the live Discovery client into a ready-to-serve state.
    pub fn new(config: Config, storage: Arc<dyn Storage>) -> Self {
        let source: Arc<dyn EventSource> = Arc::new(TicketmasterClient::new(
            config.ticketmaster_api_key.clone(),
            config.ticketmaster.clone(),
        ));
        Self::with_source(config, storage, source)
    }

    /// Same wiring with a caller-supplied source.
    pub fn with_source(
        config: Config,
        storage: Arc<dyn Storage>,
        source: Arc<dyn EventSource>,
    ) -> Self {
        let ingester = Arc::new(Ingester::new(source, storage.clone()));
        Self {
            config: Arc::new(config),
            storage,
            ingester,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IngestQuery {
    // Kept as a raw string so garbage falls back to the default instead of
    // rejecting the request
    #[serde(rename = "maxPages")]
    max_pages: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CronQuery {
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    category: Option<String>,
}

fn error_response(err: IngestError) -> Response {
    let status = match err {
        IngestError::Unauthorized => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "ok": false, "error": err.to_string() }))).into_response()
}

/// The admin credential is the whole Authorization header value.
fn check_bearer(config: &Config, headers: &HeaderMap) -> Result<()> {
    let secret = config
        .ingest_secret
        .as_deref()
        .ok_or_else(|| IngestError::Config("missing INGEST_SECRET".to_string()))?;

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if provided != format!("Bearer {secret}") {
        return Err(IngestError::Unauthorized);
    }
    Ok(())
}

fn check_cron_key(config: &Config, provided: Option<&str>) -> Result<()> {
    let secret = config
        .cron_secret
        .as_deref()
        .ok_or_else(|| IngestError::Config("missing CRON_SECRET".to_string()))?;

    if provided != Some(secret) {
        return Err(IngestError::Unauthorized);
    }
    Ok(())
}

fn parse_max_pages(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|value| value.parse::<u32>().ok())
        .filter(|&pages| pages > 0)
        .unwrap_or(default)
}

fn summary_response(summary: IngestSummary) -> Response {
    Json(json!({
        "ok": true,
        "ingested": summary.ingested,
        "venuesUpserted": summary.venues_created,
        "pagesProcessed": summary.pages_processed,
        "totalPagesReportedByUpstream": summary.total_pages_reported,
        "maxPagesUsed": summary.max_pages_used,
    }))
    .into_response()
}

async fn run_ingest(state: &AppState, max_pages: u32) -> Response {
    match state.ingester.run(max_pages).await {
        Ok(summary) => {
            metrics::ingest::run_success();
            info!(
                "Ingestion run finished: {} events, {} new venues, {} pages",
                summary.ingested, summary.venues_created, summary.pages_processed
            );
            summary_response(summary)
        }
        Err(err) => {
            metrics::ingest::run_error();
            error!("Ingestion run failed: {}", err);
            error_response(err)
        }
    }
}

/// Manual trigger, bearer-protected
async fn admin_ingest(
    Extension(state): Extension<AppState>,
    Query(params): Query<IngestQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(err) = check_bearer(&state.config, &headers) {
        return error_response(err);
    }

    let max_pages = parse_max_pages(
        params.max_pages.as_deref(),
        constants::ADMIN_DEFAULT_MAX_PAGES,
    );
    run_ingest(&state, max_pages).await
}

/// Scheduler trigger, key-protected, fixed page cap
async fn cron_ingest(
    Extension(state): Extension<AppState>,
    Query(params): Query<CronQuery>,
) -> Response {
    if let Err(err) = check_cron_key(&state.config, params.key.as_deref()) {
        return error_response(err);
    }
    run_ingest(&state, constants::CRON_MAX_PAGES).await
}

/// Upcoming events for the target city, soonest first
async fn list_events(
    Extension(state): Extension<AppState>,
    Query(params): Query<EventsQuery>,
) -> Response {
    let result = state
        .storage
        .upcoming_events(
            constants::CITY_NORMALIZED,
            params.category.as_deref(),
            constants::UPCOMING_EVENTS_LIMIT,
        )
        .await;

    match result {
        Ok(events) => Json(json!({ "ok": true, "events": events })).into_response(),
        Err(err) => error_response(err),
    }
}

/// Health check endpoint backed by a cheap storage read
async fn health(Extension(state): Extension<AppState>) -> Response {
    match state.storage.health_check().await {
        Ok(events) => Json(json!({
            "ok": true,
            "service": "mtl-events",
            "version": env!("CARGO_PKG_VERSION"),
            "events": events,
        }))
        .into_response(),
        Err(err) => error_response(err),
    }
}

/// Prometheus exposition of everything the recorder has seen
async fn metrics_endpoint() -> impl IntoResponse {
    metrics::render().unwrap_or_default()
}

/// Create the HTTP server with all routes
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/events", get(list_events))
        .route("/admin/ingest-ticketmaster", post(admin_ingest))
        .route("/cron/ingest-ticketmaster", get(cron_ingest))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(
    state: AppState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let app = create_server(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");
    println!("🎟️  Ingest:       POST http://localhost:{port}/admin/ingest-ticketmaster");
    println!("🎶 Events:       http://localhost:{port}/events");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
