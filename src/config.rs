// ⚙️ Configuration - Environment variables with logged defaults

use crate::overpass::{BoundingBox, OverpassClient, VenueSource, DEFAULT_OVERPASS_URL};
use crate::session::{MapSession, SessionOptions};
use crate::store::{RestStore, SqliteStore, VoteStore};
use anyhow::{anyhow, Context, Result};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Where votes live.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    /// Hosted table API
    Rest { url: String, api_key: String },

    /// Local SQLite file
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub overpass_url: String,
    pub bbox: BoundingBox,
    pub store: StoreBackend,
    pub flags_path: PathBuf,
    pub port: u16,
    pub http_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map instead of the environment).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = match lookup("CARD_MAP_STORE_URL").filter(|s| !s.trim().is_empty()) {
            Some(url) => {
                let api_key = lookup("CARD_MAP_STORE_KEY")
                    .ok_or_else(|| anyhow!("CARD_MAP_STORE_KEY is required with CARD_MAP_STORE_URL"))?;
                info!(url = %url, "using hosted vote store");
                StoreBackend::Rest { url, api_key }
            }
            None => {
                let path: String = try_load(&lookup, "CARD_MAP_DB_PATH", "card-map.db")?;
                StoreBackend::Sqlite {
                    path: PathBuf::from(path),
                }
            }
        };

        let flags_path: String = try_load(&lookup, "CARD_MAP_FLAGS_PATH", "card-map-flags.json")?;
        let timeout_secs: u64 = try_load(&lookup, "CARD_MAP_HTTP_TIMEOUT_SECS", "25")?;

        Ok(Config {
            overpass_url: try_load(&lookup, "CARD_MAP_OVERPASS_URL", DEFAULT_OVERPASS_URL)?,
            bbox: try_load(&lookup, "CARD_MAP_BBOX", "48.061,11.360,48.248,11.723")?,
            store,
            flags_path: PathBuf::from(flags_path),
            port: try_load(&lookup, "CARD_MAP_PORT", "3000")?,
            http_timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }

    pub fn open_store(&self) -> Result<Arc<dyn VoteStore>> {
        let store: Arc<dyn VoteStore> = match &self.store {
            StoreBackend::Rest { url, api_key } => Arc::new(
                RestStore::new(url.as_str(), api_key.as_str(), self.http_timeout)
                    .context("Failed to build vote store client")?,
            ),
            StoreBackend::Sqlite { path } => Arc::new(
                SqliteStore::open(path)
                    .with_context(|| format!("Failed to open vote database {:?}", path))?,
            ),
        };
        Ok(store)
    }

    pub fn venue_source(&self) -> Result<Arc<dyn VenueSource>> {
        let client = OverpassClient::new(self.overpass_url.as_str(), self.http_timeout)
            .context("Failed to build venue source client")?;
        Ok(Arc::new(client))
    }

    /// Session wired to the configured venue source and vote store.
    pub fn session(&self) -> Result<MapSession> {
        let options = SessionOptions {
            bbox: self.bbox,
            ..SessionOptions::default()
        };
        Ok(MapSession::new(self.venue_source()?, self.open_store()?, options))
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse::<T>()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow!("{}", e)
        })
        .with_context(|| format!("Environment misconfigured: {key}={raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.overpass_url, DEFAULT_OVERPASS_URL);
        assert_eq!(config.bbox, BoundingBox::MUNICH);
        assert_eq!(config.port, 3000);
        assert_eq!(config.http_timeout, Duration::from_secs(25));
        assert_eq!(
            config.store,
            StoreBackend::Sqlite {
                path: PathBuf::from("card-map.db")
            }
        );
    }

    #[test]
    fn test_hosted_store() {
        let config = config(&[
            ("CARD_MAP_STORE_URL", "https://votes.example.org"),
            ("CARD_MAP_STORE_KEY", "anon-key"),
            ("CARD_MAP_PORT", "8080"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.store,
            StoreBackend::Rest {
                url: "https://votes.example.org".to_string(),
                api_key: "anon-key".to_string()
            }
        );
    }

    #[test]
    fn test_misconfiguration_is_an_error() {
        assert!(config(&[("CARD_MAP_PORT", "eighty")]).is_err());
        assert!(config(&[("CARD_MAP_BBOX", "1,2,3")]).is_err());
        assert!(config(&[("CARD_MAP_STORE_URL", "https://votes.example.org")]).is_err());
    }
}
