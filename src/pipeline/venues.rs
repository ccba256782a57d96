use tracing::{debug, info};
use uuid::Uuid;

use crate::constants;
use crate::domain::Venue;
use crate::error::Result;
use crate::normalize::normalize_text;
use crate::observability::metrics;
use crate::storage::Storage;
use crate::ticketmaster::TmVenue;

/// Outcome of resolving the venue block attached to an upstream item.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvedVenue {
    pub id: Option<Uuid>,
    pub created: bool,
}

/// Finds or creates the venue row for an upstream listing. Items without a
/// named venue resolve to no venue at all; the event still goes through with
/// `venue_id` unset.
pub async fn resolve_venue(storage: &dyn Storage, raw: Option<&TmVenue>) -> Result<ResolvedVenue> {
    let Some(raw) = raw else {
        return Ok(ResolvedVenue::default());
    };
    let Some(name) = raw.name.as_deref() else {
        return Ok(ResolvedVenue::default());
    };

    let city = raw.city_name();
    let venue = Venue {
        id: None,
        name: name.to_string(),
        address_line1: raw.address_line1().map(str::to_string),
        city: city.to_string(),
        city_normalized: normalize_text(city),
        region: raw.region_code().to_string(),
        postal_code: raw.postal_code.clone(),
        country: raw.country_code().to_string(),
        lat: raw.latitude(),
        lng: raw.longitude(),
        timezone: constants::LOCAL_TIMEZONE.to_string(),
    };

    let resolution = storage.find_or_create_venue(&venue).await?;
    if resolution.created {
        info!("Created venue: {}", name);
        metrics::ingest::venue_created();
    } else {
        debug!("Venue already known: {}", name);
    }

    Ok(ResolvedVenue {
        id: Some(resolution.id),
        created: resolution.created,
    })
}
