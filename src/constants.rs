//! Shared constants for the Ticketmaster ingestion pipeline and read API.

// Source identity stored alongside every ingested event
pub const TICKETMASTER_SOURCE: &str = "ticketmaster";

// Discovery API query defaults
pub const DISCOVERY_API_URL: &str = "https://app.ticketmaster.com/discovery/v2/events.json";
pub const MONTREAL_LATLONG: &str = "45.5019,-73.5674";
pub const SEARCH_RADIUS_KM: u32 = 35;
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;
pub const CLASSIFICATION_FILTER: &str = "music,arts";

// Fallbacks applied when the upstream payload omits a field
pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_CITY: &str = "Montréal";
pub const DEFAULT_REGION: &str = "QC";
pub const DEFAULT_COUNTRY: &str = "CA";
pub const DEFAULT_CURRENCY: &str = "CAD";

// Every ingested event is a Montreal event; times resolve against this zone
pub const LOCAL_TIMEZONE: &str = "America/Toronto";
pub const CITY_NORMALIZED: &str = "montreal";

// Read endpoint row cap
pub const UPCOMING_EVENTS_LIMIT: u32 = 200;

// Page caps for the trigger endpoints
pub const ADMIN_DEFAULT_MAX_PAGES: u32 = 1;
pub const CRON_MAX_PAGES: u32 = 3;
