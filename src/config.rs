use serde::Deserialize;
use std::fs;

use crate::constants;
use crate::error::Result;

const CONFIG_FILE: &str = "config.toml";

/// Runtime configuration, built once at startup and passed explicitly.
///
/// Secrets only ever come from the environment. The optional config.toml
/// carries query tuning and is safe to commit.
#[derive(Debug, Clone)]
pub struct Config {
    pub ticketmaster_api_key: Option<String>,
    pub ingest_secret: Option<String>,
    pub cron_secret: Option<String>,
    pub database_path: String,
    pub port: u16,
    pub ticketmaster: TicketmasterConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TicketmasterConfig {
    pub latlong: String,
    pub radius_km: u32,
    pub page_size: u32,
    pub timeout_seconds: u64,
}

impl Default for TicketmasterConfig {
    fn default() -> Self {
        Self {
            latlong: constants::MONTREAL_LATLONG.to_string(),
            radius_km: constants::SEARCH_RADIUS_KM,
            page_size: constants::DEFAULT_PAGE_SIZE,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    ticketmaster: Option<TicketmasterConfig>,
}

impl Config {
    /// Reads secrets and paths from the environment, plus query tuning from
    /// config.toml when one exists next to the binary.
    pub fn from_env() -> Result<Self> {
        let ticketmaster = match fs::read_to_string(CONFIG_FILE) {
            Ok(raw) => toml::from_str::<FileConfig>(&raw)?
                .ticketmaster
                .unwrap_or_default(),
            Err(_) => TicketmasterConfig::default(),
        };

        Ok(Self {
            ticketmaster_api_key: env_opt("TICKETMASTER_API_KEY"),
            ingest_secret: env_opt("INGEST_SECRET"),
            cron_secret: env_opt("CRON_SECRET"),
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/mtl_events.db".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            ticketmaster,
        })
    }
}

/// Unset and empty both count as missing so blank .env lines stay harmless.
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuning_defaults_match_discovery_query() {
        let tuning = TicketmasterConfig::default();
        assert_eq!(tuning.latlong, constants::MONTREAL_LATLONG);
        assert_eq!(tuning.radius_km, constants::SEARCH_RADIUS_KM);
        assert_eq!(tuning.page_size, constants::DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_partial_toml_block_keeps_defaults_for_missing_keys() {
        let parsed: FileConfig = toml::from_str("[ticketmaster]\npage_size = 100\n").unwrap();
        let tuning = parsed.ticketmaster.unwrap();
        assert_eq!(tuning.page_size, 100);
        assert_eq!(tuning.latlong, constants::MONTREAL_LATLONG);
    }

    #[test]
    fn test_empty_file_falls_back_entirely() {
        let parsed: FileConfig = toml::from_str("").unwrap();
        assert!(parsed.ticketmaster.is_none());
    }
}
