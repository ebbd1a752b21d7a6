use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    pub resolution: ResolutionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub url: String,
    /// Cached quotes are keyed by (product, zone, segment, quantity) with
    /// no time component, so a quote cached just before a modifier's
    /// validity edge can be served for up to this long after the edge.
    /// Keep it short, or drop the cache where that staleness is unacceptable.
    #[serde(default = "default_quote_ttl")]
    pub quote_ttl_seconds: u64,
    #[serde(default = "default_zone_ttl")]
    pub zone_ttl_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolutionConfig {
    #[serde(default = "default_currency")]
    pub default_currency: String,
    #[serde(default = "default_batch_size")]
    pub max_batch_size: usize,
}

fn default_quote_ttl() -> u64 {
    300
}
fn default_zone_ttl() -> u64 {
    3600
}
fn default_currency() -> String {
    "USD".to_string()
}
fn default_batch_size() -> usize {
    100
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Layer the per-environment file on top; it is optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Environment variables win: `TARIF_CACHE__URL=...`
            .add_source(config::Environment::with_prefix("TARIF").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
