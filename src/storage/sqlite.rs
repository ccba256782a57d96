use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use crate::classify::Category;
use crate::domain::{Event, EventStatus, EventSummary, Venue};
use crate::error::Result;
use crate::storage::{Storage, VenueResolution};

/// SQLite-backed storage. The connection sits behind a mutex; every call is a
/// short, lock-scoped statement with no await while held.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        // The venue identity index folds NULL addresses to '' because SQLite
        // treats NULLs as distinct inside UNIQUE indexes.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS venues (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                address_line1   TEXT,
                city            TEXT NOT NULL,
                city_normalized TEXT NOT NULL,
                region          TEXT NOT NULL,
                postal_code     TEXT,
                country         TEXT NOT NULL,
                lat             REAL,
                lng             REAL,
                timezone        TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_venues_identity
                ON venues (name, IFNULL(address_line1, ''), city_normalized);
            CREATE TABLE IF NOT EXISTS events (
                id               TEXT PRIMARY KEY,
                title            TEXT NOT NULL,
                title_normalized TEXT NOT NULL,
                description      TEXT,
                start_at         TEXT NOT NULL,
                end_at           TEXT,
                timezone         TEXT NOT NULL,
                status           TEXT NOT NULL,
                category_primary TEXT NOT NULL,
                tags             TEXT NOT NULL,
                min_price        REAL,
                max_price        REAL,
                currency         TEXT NOT NULL,
                age_restriction  TEXT,
                image_url        TEXT,
                source           TEXT NOT NULL,
                source_event_id  TEXT NOT NULL,
                source_url       TEXT,
                venue_id         TEXT,
                city_normalized  TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_events_source_identity
                ON events (source, source_event_id);
            CREATE INDEX IF NOT EXISTS idx_events_upcoming
                ON events (city_normalized, start_at);
            "#,
        )?;
        Ok(())
    }
}

// Timestamps are stored as RFC 3339 text in a single fixed offset, so string
// comparison orders them chronologically.
fn to_stored(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

fn parse_uuid(idx: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_datetime(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_tags(idx: usize, value: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let id: String = row.get(0)?;
    let start_at: String = row.get(4)?;
    let end_at: Option<String> = row.get(5)?;
    let status: String = row.get(7)?;
    let category: String = row.get(8)?;
    let tags: String = row.get(9)?;
    let venue_id: Option<String> = row.get(18)?;

    Ok(Event {
        id: Some(parse_uuid(0, &id)?),
        title: row.get(1)?,
        title_normalized: row.get(2)?,
        description: row.get(3)?,
        start_at: parse_datetime(4, &start_at)?,
        end_at: match end_at {
            Some(s) => Some(parse_datetime(5, &s)?),
            None => None,
        },
        timezone: row.get(6)?,
        status: EventStatus::parse(&status).unwrap_or(EventStatus::Scheduled),
        category_primary: Category::parse(&category).unwrap_or(Category::Music),
        tags: parse_tags(9, &tags)?,
        min_price: row.get(10)?,
        max_price: row.get(11)?,
        currency: row.get(12)?,
        age_restriction: row.get(13)?,
        image_url: row.get(14)?,
        source: row.get(15)?,
        source_event_id: row.get(16)?,
        source_url: row.get(17)?,
        venue_id: match venue_id {
            Some(s) => Some(parse_uuid(18, &s)?),
            None => None,
        },
        city_normalized: row.get(19)?,
    })
}

const EVENT_COLUMNS: &str = "id, title, title_normalized, description, start_at, end_at, timezone, \
     status, category_primary, tags, min_price, max_price, currency, age_restriction, \
     image_url, source, source_event_id, source_url, venue_id, city_normalized";

#[async_trait]
impl Storage for SqliteStorage {
    async fn find_or_create_venue(&self, venue: &Venue) -> Result<VenueResolution> {
        let conn = self.conn.lock().unwrap();

        let id = venue.id.unwrap_or_else(Uuid::new_v4);
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO venues \
                 (id, name, address_line1, city, city_normalized, region, postal_code, \
                  country, lat, lng, timezone) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id.to_string(),
                venue.name,
                venue.address_line1,
                venue.city,
                venue.city_normalized,
                venue.region,
                venue.postal_code,
                venue.country,
                venue.lat,
                venue.lng,
                venue.timezone,
            ],
        )?;

        // Re-select instead of trusting our candidate id: a concurrent caller
        // may have won the insert.
        let resolved = conn.query_row(
            "SELECT id FROM venues \
             WHERE name = ?1 AND IFNULL(address_line1, '') = IFNULL(?2, '') \
               AND city_normalized = ?3",
            params![venue.name, venue.address_line1, venue.city_normalized],
            |row| {
                let id: String = row.get(0)?;
                parse_uuid(0, &id)
            },
        )?;

        debug!(
            "Resolved venue {} to {} (created: {})",
            venue.name,
            resolved,
            inserted == 1
        );
        Ok(VenueResolution {
            id: resolved,
            created: inserted == 1,
        })
    }

    async fn upsert_event(&self, event: &Event) -> Result<()> {
        let tags = serde_json::to_string(&event.tags)?;
        let conn = self.conn.lock().unwrap();

        let id = event.id.unwrap_or_else(Uuid::new_v4);
        conn.execute(
            "INSERT INTO events \
                 (id, title, title_normalized, description, start_at, end_at, timezone, \
                  status, category_primary, tags, min_price, max_price, currency, \
                  age_restriction, image_url, source, source_event_id, source_url, \
                  venue_id, city_normalized) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                     ?16, ?17, ?18, ?19, ?20) \
             ON CONFLICT(source, source_event_id) DO UPDATE SET \
                 title=excluded.title, \
                 title_normalized=excluded.title_normalized, \
                 description=excluded.description, \
                 start_at=excluded.start_at, \
                 end_at=excluded.end_at, \
                 timezone=excluded.timezone, \
                 status=excluded.status, \
                 category_primary=excluded.category_primary, \
                 tags=excluded.tags, \
                 min_price=excluded.min_price, \
                 max_price=excluded.max_price, \
                 currency=excluded.currency, \
                 age_restriction=excluded.age_restriction, \
                 image_url=excluded.image_url, \
                 source_url=excluded.source_url, \
                 venue_id=excluded.venue_id, \
                 city_normalized=excluded.city_normalized",
            params![
                id.to_string(),
                event.title,
                event.title_normalized,
                event.description,
                to_stored(event.start_at),
                event.end_at.map(to_stored),
                event.timezone,
                event.status.as_str(),
                event.category_primary.as_str(),
                tags,
                event.min_price,
                event.max_price,
                event.currency,
                event.age_restriction,
                event.image_url,
                event.source,
                event.source_event_id,
                event.source_url,
                event.venue_id.map(|id| id.to_string()),
                event.city_normalized,
            ],
        )?;
        Ok(())
    }

    async fn event_by_source_id(
        &self,
        source: &str,
        source_event_id: &str,
    ) -> Result<Option<Event>> {
        let conn = self.conn.lock().unwrap();
        let event = conn
            .query_row(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events \
                     WHERE source = ?1 AND source_event_id = ?2"
                ),
                params![source, source_event_id],
                event_from_row,
            )
            .optional()?;
        Ok(event)
    }

    async fn upcoming_events(
        &self,
        city_normalized: &str,
        category: Option<&str>,
        limit: u32,
    ) -> Result<Vec<EventSummary>> {
        let conn = self.conn.lock().unwrap();
        let now = to_stored(Utc::now());

        let mut stmt = conn.prepare(
            "SELECT id, title, start_at, category_primary, image_url, source_url \
             FROM events \
             WHERE city_normalized = ?1 AND start_at >= ?2 \
               AND (?3 IS NULL OR category_primary = ?3) \
             ORDER BY start_at ASC \
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(params![city_normalized, now, category, limit], |row| {
            let id: String = row.get(0)?;
            let start_at: String = row.get(2)?;
            let category: String = row.get(3)?;
            Ok(EventSummary {
                id: parse_uuid(0, &id)?,
                title: row.get(1)?,
                start_at: parse_datetime(2, &start_at)?,
                category_primary: Category::parse(&category).unwrap_or(Category::Music),
                image_url: row.get(4)?,
                source_url: row.get(5)?,
            })
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    async fn health_check(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
