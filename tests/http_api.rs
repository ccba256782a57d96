use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use mtl_events::classify::Category;
use mtl_events::config::{Config, TicketmasterConfig};
use mtl_events::domain::{Event, EventStatus};
use mtl_events::server::{create_server, AppState};
use mtl_events::storage::{SqliteStorage, Storage};
use mtl_events::ticketmaster::{DiscoveryPage, EventSource, TmEvent};
use serde_json::{json, Value};
use tower::ServiceExt;

struct ScriptedSource {
    pages: Vec<DiscoveryPage>,
}

#[async_trait]
impl EventSource for ScriptedSource {
    fn source_name(&self) -> &'static str {
        "ticketmaster"
    }

    async fn fetch_page(&self, page: u32) -> mtl_events::error::Result<DiscoveryPage> {
        Ok(self.pages.get(page as usize).cloned().unwrap_or_default())
    }
}

fn tm_event(id: &str) -> TmEvent {
    serde_json::from_value(json!({
        "id": id,
        "name": format!("Show {id}"),
        "dates": { "start": { "dateTime": "2030-06-21T01:00:00Z" } },
        "_embedded": { "venues": [ { "name": "Club Soda" } ] }
    }))
    .unwrap()
}

fn scripted_page(ids: &[&str], total_pages: u32) -> DiscoveryPage {
    DiscoveryPage {
        events: ids.iter().map(|id| tm_event(id)).collect(),
        total_pages,
    }
}

fn test_config() -> Config {
    Config {
        ticketmaster_api_key: Some("tm-key".to_string()),
        ingest_secret: Some("test-ingest".to_string()),
        cron_secret: Some("test-cron".to_string()),
        database_path: "unused".to_string(),
        port: 0,
        ticketmaster: TicketmasterConfig::default(),
    }
}

fn test_app_with_config(config: Config, pages: Vec<DiscoveryPage>) -> (axum::Router, Arc<SqliteStorage>) {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let state = AppState::with_source(
        config,
        storage.clone() as Arc<dyn Storage>,
        Arc::new(ScriptedSource { pages }),
    );
    (create_server(state), storage)
}

fn test_app(pages: Vec<DiscoveryPage>) -> (axum::Router, Arc<SqliteStorage>) {
    test_app_with_config(test_config(), pages)
}

fn admin_request(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(value) = auth {
        builder = builder.header("authorization", value);
    }
    builder.body(Body::empty()).unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn seed_event(source_event_id: &str, title: &str, category: Category, days_ahead: i64) -> Event {
    Event {
        id: None,
        title: title.to_string(),
        title_normalized: title.to_lowercase(),
        description: None,
        start_at: Utc::now() + Duration::days(days_ahead),
        end_at: None,
        timezone: "America/Toronto".to_string(),
        status: EventStatus::Scheduled,
        category_primary: category,
        tags: Vec::new(),
        min_price: None,
        max_price: None,
        currency: "CAD".to_string(),
        age_restriction: None,
        image_url: None,
        source: "ticketmaster".to_string(),
        source_event_id: source_event_id.to_string(),
        source_url: None,
        venue_id: None,
        city_normalized: "montreal".to_string(),
    }
}

#[tokio::test]
async fn test_admin_ingest_rejects_missing_and_bad_credentials() -> Result<()> {
    let (app, _storage) = test_app(vec![]);

    let response = app
        .clone()
        .oneshot(admin_request("/admin/ingest-ticketmaster", None))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["ok"], false);

    let response = app
        .oneshot(admin_request(
            "/admin/ingest-ticketmaster",
            Some("Bearer wrong"),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_admin_ingest_requires_a_configured_secret() -> Result<()> {
    let mut config = test_config();
    config.ingest_secret = None;
    let (app, _storage) = test_app_with_config(config, vec![]);

    let response = app
        .oneshot(admin_request(
            "/admin/ingest-ticketmaster",
            Some("Bearer anything"),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["ok"], false);
    Ok(())
}

#[tokio::test]
async fn test_admin_ingest_reports_run_counters() -> Result<()> {
    let (app, storage) = test_app(vec![
        scripted_page(&["a-1", "a-2"], 2),
        scripted_page(&["b-1"], 2),
    ]);

    let response = app
        .oneshot(admin_request(
            "/admin/ingest-ticketmaster?maxPages=5",
            Some("Bearer test-ingest"),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["ingested"], 3);
    assert_eq!(body["venuesUpserted"], 1);
    assert_eq!(body["pagesProcessed"], 2);
    assert_eq!(body["totalPagesReportedByUpstream"], 2);
    assert_eq!(body["maxPagesUsed"], 5);

    assert_eq!(storage.health_check().await?, 3);
    Ok(())
}

#[tokio::test]
async fn test_admin_ingest_defaults_max_pages_on_garbage() -> Result<()> {
    let (app, _storage) = test_app(vec![
        scripted_page(&["a-1"], 3),
        scripted_page(&["b-1"], 3),
        scripted_page(&["c-1"], 3),
    ]);

    let response = app
        .oneshot(admin_request(
            "/admin/ingest-ticketmaster?maxPages=definitely-not-a-number",
            Some("Bearer test-ingest"),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["pagesProcessed"], 1);
    assert_eq!(body["maxPagesUsed"], 1);
    Ok(())
}

#[tokio::test]
async fn test_cron_ingest_checks_its_key_and_caps_pages() -> Result<()> {
    let (app, _storage) = test_app(vec![
        scripted_page(&["a-1"], 5),
        scripted_page(&["b-1"], 5),
        scripted_page(&["c-1"], 5),
        scripted_page(&["d-1"], 5),
    ]);

    let response = app
        .clone()
        .oneshot(get_request("/cron/ingest-ticketmaster?key=nope"))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(get_request("/cron/ingest-ticketmaster"))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(get_request("/cron/ingest-ticketmaster?key=test-cron"))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["pagesProcessed"], 3);
    assert_eq!(body["maxPagesUsed"], 3);
    assert_eq!(body["totalPagesReportedByUpstream"], 5);
    Ok(())
}

#[tokio::test]
async fn test_cron_ingest_requires_a_configured_secret() -> Result<()> {
    let mut config = test_config();
    config.cron_secret = None;
    let (app, _storage) = test_app_with_config(config, vec![]);

    let response = app
        .oneshot(get_request("/cron/ingest-ticketmaster?key=test-cron"))
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn test_events_endpoint_lists_upcoming_soonest_first() -> Result<()> {
    let (app, storage) = test_app(vec![]);
    storage
        .upsert_event(&seed_event("later", "Later Show", Category::Music, 5))
        .await?;
    storage
        .upsert_event(&seed_event("sooner", "Sooner Show", Category::Music, 2))
        .await?;

    let response = app.oneshot(get_request("/events")).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["title"], "Sooner Show");
    assert_eq!(events[1]["title"], "Later Show");
    Ok(())
}

#[tokio::test]
async fn test_events_endpoint_applies_the_category_filter() -> Result<()> {
    let (app, storage) = test_app(vec![]);
    storage
        .upsert_event(&seed_event("concert", "Concert", Category::Music, 2))
        .await?;
    storage
        .upsert_event(&seed_event("vernissage", "Vernissage", Category::Art, 3))
        .await?;

    let response = app.oneshot(get_request("/events?category=art")).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["title"], "Vernissage");
    assert_eq!(events[0]["category_primary"], "art");
    Ok(())
}

#[tokio::test]
async fn test_health_endpoint_reports_storage_state() -> Result<()> {
    let (app, storage) = test_app(vec![]);
    storage
        .upsert_event(&seed_event("one", "One Show", Category::Music, 2))
        .await?;

    let response = app.oneshot(get_request("/health")).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["events"], 1);
    assert!(body["version"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_responds() -> Result<()> {
    let (app, _storage) = test_app(vec![]);
    let response = app.oneshot(get_request("/metrics")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}
