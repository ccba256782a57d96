pub mod sqlite;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Event, EventSummary, Venue};
use crate::error::Result;

pub use sqlite::SqliteStorage;

/// Venue find-or-create outcome: the resolved id plus whether this call
/// inserted the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VenueResolution {
    pub id: Uuid,
    pub created: bool,
}

/// Persistence seam for the ingestion pipeline and the read API.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the venue id for the identity key (name, address_line1,
    /// city_normalized), inserting the venue first when no row exists.
    /// Atomic with respect to concurrent callers.
    async fn find_or_create_venue(&self, venue: &Venue) -> Result<VenueResolution>;

    /// Inserts the event, or fully replaces the mutable fields of the row
    /// sharing its (source, source_event_id) key.
    async fn upsert_event(&self, event: &Event) -> Result<()>;

    /// Full row for one source identity key, when present.
    async fn event_by_source_id(
        &self,
        source: &str,
        source_event_id: &str,
    ) -> Result<Option<Event>>;

    /// Upcoming events for the read endpoint, soonest first.
    async fn upcoming_events(
        &self,
        city_normalized: &str,
        category: Option<&str>,
        limit: u32,
    ) -> Result<Vec<EventSummary>>;

    /// Cheap probe for the health endpoint. Returns the stored event count.
    async fn health_check(&self) -> Result<u64>;
}
