use tracing::debug;
use uuid::Uuid;

use crate::classify::classify;
use crate::constants;
use crate::domain::{Event, EventStatus};
use crate::error::Result;
use crate::normalize::normalize_text;
use crate::observability::metrics;
use crate::storage::Storage;
use crate::ticketmaster::TmEvent;

/// What happened to a single upstream item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Persisted,
    Skipped,
}

/// Maps one upstream item into a persistable event. Items without a stable id
/// or a concrete start time cannot be keyed and map to `None`.
pub fn map_event(source: &str, item: &TmEvent, venue_id: Option<Uuid>) -> Option<Event> {
    let source_event_id = item.id.clone().filter(|id| !id.is_empty())?;
    let start_at = item.start_at()?;

    let title = item.title().to_string();
    let title_normalized = normalize_text(&title);
    let venue_name = item.venue().and_then(|v| v.name.as_deref()).unwrap_or("");
    let category = classify(
        &title,
        venue_name,
        item.segment_name(),
        &item.genre_text(),
        Some(start_at),
    );
    let (min_price, max_price, currency) = item.price_info();

    Some(Event {
        id: None,
        title,
        title_normalized,
        description: item.description().map(str::to_string),
        start_at,
        end_at: item.end_at(),
        timezone: constants::LOCAL_TIMEZONE.to_string(),
        status: EventStatus::from_code(item.status_code()),
        category_primary: category,
        tags: Vec::new(),
        min_price,
        max_price,
        currency,
        age_restriction: None,
        image_url: item.best_image_url().map(str::to_string),
        source: source.to_string(),
        source_event_id,
        source_url: item.url.clone(),
        venue_id,
        city_normalized: constants::CITY_NORMALIZED.to_string(),
    })
}

/// Persists one upstream item, replacing any earlier row with the same
/// `(source, source_event_id)`. Unkeyable items are skipped, not errors.
pub async fn upsert_event(
    storage: &dyn Storage,
    source: &str,
    item: &TmEvent,
    venue_id: Option<Uuid>,
) -> Result<UpsertOutcome> {
    let Some(event) = map_event(source, item, venue_id) else {
        debug!("Skipping item without a stable id or start time");
        metrics::ingest::event_skipped();
        return Ok(UpsertOutcome::Skipped);
    };

    storage.upsert_event(&event).await?;
    metrics::ingest::event_upserted();
    Ok(UpsertOutcome::Persisted)
}
