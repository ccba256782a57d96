pub mod events;
pub mod venues;

use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::Result;
use crate::observability::metrics;
use crate::storage::Storage;
use crate::ticketmaster::EventSource;

use events::UpsertOutcome;

/// Counters accumulated over one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub ingested: u64,
    pub venues_created: u64,
    pub pages_processed: u32,
    pub total_pages_reported: u32,
    pub max_pages_used: u32,
}

/// Drives paging, venue resolution, and event upserts for one source.
pub struct Ingester {
    source: Arc<dyn EventSource>,
    storage: Arc<dyn Storage>,
}

impl Ingester {
    pub fn new(source: Arc<dyn EventSource>, storage: Arc<dyn Storage>) -> Self {
        Self { source, storage }
    }

    /// Processes up to `max_pages` pages, stopping earlier when the upstream
    /// reports fewer. Items are handled sequentially; the first error aborts
    /// the run and already-persisted rows stay put.
    #[instrument(skip(self))]
    pub async fn run(&self, max_pages: u32) -> Result<IngestSummary> {
        let mut summary = IngestSummary {
            max_pages_used: max_pages,
            ..Default::default()
        };

        let mut page = 0u32;
        let mut total_pages = 1u32;

        while page < total_pages && page < max_pages {
            let fetched = self.source.fetch_page(page).await?;
            total_pages = fetched.total_pages;

            for item in &fetched.events {
                let resolved = venues::resolve_venue(self.storage.as_ref(), item.venue()).await?;
                if resolved.created {
                    summary.venues_created += 1;
                }

                let outcome = events::upsert_event(
                    self.storage.as_ref(),
                    self.source.source_name(),
                    item,
                    resolved.id,
                )
                .await?;
                if outcome == UpsertOutcome::Persisted {
                    summary.ingested += 1;
                }
            }

            page += 1;
            metrics::ingest::page_processed();
            info!(
                "Processed page {} ({} events ingested so far, {} pages reported)",
                page, summary.ingested, total_pages
            );
        }

        summary.pages_processed = page;
        summary.total_pages_reported = total_pages;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use crate::ticketmaster::{DiscoveryPage, TmEvent};
    use async_trait::async_trait;
    use serde_json::json;

    struct ScriptedSource {
        pages: Vec<DiscoveryPage>,
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        fn source_name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch_page(&self, page: u32) -> Result<DiscoveryPage> {
            Ok(self.pages.get(page as usize).cloned().unwrap_or_default())
        }
    }

    fn scripted_event(id: &str, venue: &str) -> TmEvent {
        serde_json::from_value(json!({
            "id": id,
            "name": format!("Show {id}"),
            "dates": { "start": { "dateTime": "2030-06-21T01:00:00Z" } },
            "_embedded": { "venues": [ { "name": venue } ] }
        }))
        .unwrap()
    }

    fn ingester(pages: Vec<DiscoveryPage>) -> (Ingester, Arc<SqliteStorage>) {
        let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
        let ingester = Ingester::new(
            Arc::new(ScriptedSource { pages }),
            storage.clone() as Arc<dyn Storage>,
        );
        (ingester, storage)
    }

    #[tokio::test]
    async fn test_page_cap_stops_the_loop_early() {
        let page = |ids: &[&str]| DiscoveryPage {
            events: ids.iter().map(|id| scripted_event(id, "Club Soda")).collect(),
            total_pages: 5,
        };
        let (ingester, _storage) = ingester(vec![
            page(&["a-1", "a-2"]),
            page(&["b-1"]),
            page(&["c-1"]),
        ]);

        let summary = ingester.run(2).await.unwrap();
        assert_eq!(summary.pages_processed, 2);
        assert_eq!(summary.total_pages_reported, 5);
        assert_eq!(summary.max_pages_used, 2);
        assert_eq!(summary.ingested, 3);
    }

    #[tokio::test]
    async fn test_loop_stops_when_upstream_runs_out_of_pages() {
        let (ingester, _storage) = ingester(vec![DiscoveryPage {
            events: vec![scripted_event("only", "Club Soda")],
            total_pages: 1,
        }]);

        let summary = ingester.run(10).await.unwrap();
        assert_eq!(summary.pages_processed, 1);
        assert_eq!(summary.ingested, 1);
    }

    #[tokio::test]
    async fn test_skipped_items_are_not_counted_as_ingested() {
        let keyless: TmEvent = serde_json::from_value(json!({
            "name": "Date TBA",
            "_embedded": { "venues": [ { "name": "Club Soda" } ] }
        }))
        .unwrap();
        let (ingester, storage) = ingester(vec![DiscoveryPage {
            events: vec![scripted_event("kept", "Club Soda"), keyless],
            total_pages: 1,
        }]);

        let summary = ingester.run(1).await.unwrap();
        assert_eq!(summary.ingested, 1);
        assert_eq!(storage.health_check().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_venues_created_counts_rows_not_sightings() {
        let (ingester, _storage) = ingester(vec![DiscoveryPage {
            events: vec![
                scripted_event("e-1", "Club Soda"),
                scripted_event("e-2", "Club Soda"),
                scripted_event("e-3", "MTelus"),
            ],
            total_pages: 1,
        }]);

        let summary = ingester.run(1).await.unwrap();
        assert_eq!(summary.venues_created, 2);
        assert_eq!(summary.ingested, 3);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let pages = vec![DiscoveryPage {
            events: vec![scripted_event("stable", "Club Soda")],
            total_pages: 1,
        }];
        let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
        let ingester = Ingester::new(
            Arc::new(ScriptedSource { pages }),
            storage.clone() as Arc<dyn Storage>,
        );

        let first = ingester.run(1).await.unwrap();
        let second = ingester.run(1).await.unwrap();

        assert_eq!(first.venues_created, 1);
        assert_eq!(second.venues_created, 0);
        assert_eq!(second.ingested, 1);
        assert_eq!(storage.health_check().await.unwrap(), 1);
    }
}
