use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::TicketmasterConfig;
use crate::constants;
use crate::error::{IngestError, Result};
use crate::observability::metrics;

/// Seam between the pipeline driver and the upstream listings API.
#[async_trait]
pub trait EventSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Fetches one page of listings. Page numbering starts at 0.
    async fn fetch_page(&self, page: u32) -> Result<DiscoveryPage>;
}

/// One page of Discovery API results, flattened out of the `_embedded`
/// wrapper.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryPage {
    pub events: Vec<TmEvent>,
    pub total_pages: u32,
}

// The upstream payload is treated as untrusted: every field is optional and
// readers go through accessors that apply the documented fallbacks.

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmEvent {
    pub id: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub info: Option<String>,
    pub please_note: Option<String>,
    pub dates: Option<TmDates>,
    pub images: Option<Vec<TmImage>>,
    pub price_ranges: Option<Vec<TmPriceRange>>,
    pub classifications: Option<Vec<TmClassification>>,
    #[serde(rename = "_embedded")]
    pub embedded: Option<TmEventEmbedded>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmEventEmbedded {
    pub venues: Option<Vec<TmVenue>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmDates {
    pub start: Option<TmDateTime>,
    pub end: Option<TmDateTime>,
    pub status: Option<TmStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmDateTime {
    pub date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmStatus {
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmImage {
    pub url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmPriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmClassification {
    pub segment: Option<TmNamed>,
    pub genre: Option<TmNamed>,
    pub sub_genre: Option<TmNamed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmNamed {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmVenue {
    pub name: Option<String>,
    pub city: Option<TmNamed>,
    pub state: Option<TmState>,
    pub country: Option<TmCountry>,
    pub address: Option<TmAddress>,
    pub postal_code: Option<String>,
    pub location: Option<TmLocation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmState {
    pub state_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmCountry {
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmAddress {
    pub line1: Option<String>,
}

// Coordinates arrive as strings in the Discovery payload
#[derive(Debug, Clone, Deserialize)]
pub struct TmLocation {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl TmEvent {
    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or(constants::DEFAULT_TITLE)
    }

    /// `info` with `pleaseNote` as the fallback blurb.
    pub fn description(&self) -> Option<&str> {
        self.info.as_deref().or(self.please_note.as_deref())
    }

    pub fn start_at(&self) -> Option<DateTime<Utc>> {
        self.dates.as_ref()?.start.as_ref()?.date_time
    }

    pub fn end_at(&self) -> Option<DateTime<Utc>> {
        self.dates.as_ref()?.end.as_ref()?.date_time
    }

    pub fn status_code(&self) -> Option<&str> {
        self.dates.as_ref()?.status.as_ref()?.code.as_deref()
    }

    pub fn venue(&self) -> Option<&TmVenue> {
        self.embedded.as_ref()?.venues.as_ref()?.first()
    }

    pub fn segment_name(&self) -> &str {
        self.classifications
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.segment.as_ref())
            .and_then(|s| s.name.as_deref())
            .unwrap_or("")
    }

    /// Genre and subgenre names joined into one searchable string.
    pub fn genre_text(&self) -> String {
        let Some(classification) = self.classifications.as_ref().and_then(|c| c.first()) else {
            return String::new();
        };
        let mut parts = Vec::new();
        if let Some(name) = classification.genre.as_ref().and_then(|g| g.name.as_deref()) {
            parts.push(name);
        }
        if let Some(name) = classification.sub_genre.as_ref().and_then(|g| g.name.as_deref()) {
            parts.push(name);
        }
        parts.join(" ")
    }

    /// Widest image wins; the first listed wins among equal widths.
    pub fn best_image_url(&self) -> Option<&str> {
        let images = self.images.as_deref()?;
        let mut best: Option<&TmImage> = None;
        for image in images {
            let width = image.width.unwrap_or(0);
            if best.map_or(true, |b| width > b.width.unwrap_or(0)) {
                best = Some(image);
            }
        }
        best.and_then(|image| image.url.as_deref())
    }

    pub fn price_info(&self) -> (Option<f64>, Option<f64>, String) {
        let range = self.price_ranges.as_ref().and_then(|r| r.first());
        let currency = range
            .and_then(|r| r.currency.clone())
            .unwrap_or_else(|| constants::DEFAULT_CURRENCY.to_string());
        (range.and_then(|r| r.min), range.and_then(|r| r.max), currency)
    }
}

impl TmVenue {
    pub fn city_name(&self) -> &str {
        self.city
            .as_ref()
            .and_then(|c| c.name.as_deref())
            .unwrap_or(constants::DEFAULT_CITY)
    }

    pub fn region_code(&self) -> &str {
        self.state
            .as_ref()
            .and_then(|s| s.state_code.as_deref())
            .unwrap_or(constants::DEFAULT_REGION)
    }

    pub fn country_code(&self) -> &str {
        self.country
            .as_ref()
            .and_then(|c| c.country_code.as_deref())
            .unwrap_or(constants::DEFAULT_COUNTRY)
    }

    pub fn address_line1(&self) -> Option<&str> {
        self.address.as_ref()?.line1.as_deref()
    }

    pub fn latitude(&self) -> Option<f64> {
        self.location.as_ref()?.latitude.as_deref()?.parse().ok()
    }

    pub fn longitude(&self) -> Option<f64> {
        self.location.as_ref()?.longitude.as_deref()?.parse().ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryResponse {
    #[serde(rename = "_embedded")]
    pub embedded: Option<DiscoveryEmbedded>,
    pub page: Option<PageInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryEmbedded {
    pub events: Option<Vec<TmEvent>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub size: Option<u32>,
    pub total_elements: Option<u64>,
    pub total_pages: Option<u32>,
    pub number: Option<u32>,
}

impl DiscoveryResponse {
    pub fn into_page(self) -> DiscoveryPage {
        DiscoveryPage {
            events: self.embedded.and_then(|e| e.events).unwrap_or_default(),
            total_pages: self.page.and_then(|p| p.total_pages).unwrap_or(0),
        }
    }
}

/// Discovery API client scoped to the fixed Montreal query.
pub struct TicketmasterClient {
    client: reqwest::Client,
    api_key: Option<String>,
    settings: TicketmasterConfig,
}

impl TicketmasterClient {
    /// The key stays optional here so the server can boot without one; runs
    /// fail with a configuration error when it is actually needed.
    pub fn new(api_key: Option<String>, settings: TicketmasterConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key,
            settings,
        }
    }
}

#[async_trait]
impl EventSource for TicketmasterClient {
    fn source_name(&self) -> &'static str {
        constants::TICKETMASTER_SOURCE
    }

    #[instrument(skip(self))]
    async fn fetch_page(&self, page: u32) -> Result<DiscoveryPage> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| IngestError::Config("TICKETMASTER_API_KEY is not set".to_string()))?;

        let size = self.settings.page_size.clamp(1, constants::MAX_PAGE_SIZE);
        let radius = self.settings.radius_km.to_string();
        let size_param = size.to_string();
        let page_param = page.to_string();
        let query = [
            ("apikey", api_key),
            ("locale", "*"),
            ("radius", radius.as_str()),
            ("unit", "km"),
            ("latlong", self.settings.latlong.as_str()),
            ("size", size_param.as_str()),
            ("page", page_param.as_str()),
            ("sort", "date,asc"),
            ("classificationName", constants::CLASSIFICATION_FILTER),
        ];

        let response = self
            .client
            .get(constants::DISCOVERY_API_URL)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            metrics::upstream::request_error();
            return Err(IngestError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        metrics::upstream::request_success();
        let payload: DiscoveryResponse = response.json().await?;
        let fetched = payload.into_page();
        debug!(
            "Fetched page {} with {} events ({} pages reported)",
            page,
            fetched.events.len(),
            fetched.total_pages
        );
        Ok(fetched)
    }
}
