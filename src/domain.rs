use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::Category;

/// A place events happen at, deduplicated on (name, address_line1,
/// city_normalized). Created on first sighting and never updated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: Option<Uuid>,
    pub name: String,
    pub address_line1: Option<String>,
    pub city: String,
    pub city_normalized: String,
    pub region: String,
    pub postal_code: Option<String>,
    pub country: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub timezone: String,
}

/// Lifecycle state reported by the upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Scheduled,
    Cancelled,
    Postponed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Postponed => "postponed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(EventStatus::Scheduled),
            "cancelled" => Some(EventStatus::Cancelled),
            "postponed" => Some(EventStatus::Postponed),
            _ => None,
        }
    }

    /// Maps an upstream status code. Anything unrecognized counts as scheduled.
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::to_lowercase).as_deref() {
            Some("cancelled") => EventStatus::Cancelled,
            Some("postponed") => EventStatus::Postponed,
            _ => EventStatus::Scheduled,
        }
    }
}

/// A single listing keyed by (source, source_event_id). Re-ingesting replaces
/// every mutable field, so the row always mirrors the latest upstream state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<Uuid>,
    pub title: String,
    pub title_normalized: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub timezone: String,
    pub status: EventStatus,
    pub category_primary: Category,
    pub tags: Vec<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub currency: String,
    pub age_restriction: Option<String>,
    pub image_url: Option<String>,
    pub source: String,
    pub source_event_id: String,
    pub source_url: Option<String>,
    pub venue_id: Option<Uuid>,
    pub city_normalized: String,
}

/// Row shape served by the upcoming-events endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub id: Uuid,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub category_primary: Category,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
}
