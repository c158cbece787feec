use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::analyzers::DEFAULT_MODEL;
use crate::catalog::DEFAULT_BASE_URL;
use crate::types::config::HarvestConfig;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub harvest: HarvestConfig,
    pub catalog_url: String,
    pub requests_per_second: u32,
    pub ollama_base_url: String,
    pub model: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = HarvestConfig::default();

        let mut harvest = match lookup("HARVEST_OUTPUT_DIR") {
            Some(dir) => HarvestConfig::default().with_output_dir(dir),
            None => defaults.clone(),
        };

        harvest.start_page = parse_or(&lookup, "HARVEST_START_PAGE", defaults.start_page)?;
        harvest.batch_size = parse_or(&lookup, "HARVEST_BATCH_SIZE", defaults.batch_size)?;
        harvest.max_page = match lookup("HARVEST_MAX_PAGE") {
            Some(raw) => Some(
                raw.trim()
                    .parse()
                    .context("HARVEST_MAX_PAGE must be a valid page number")?,
            ),
            None => None,
        };
        harvest.page_retries = parse_or(&lookup, "HARVEST_PAGE_RETRIES", defaults.page_retries)?;
        harvest.retry_backoff = Duration::from_secs(parse_or(
            &lookup,
            "HARVEST_RETRY_BACKOFF_SECS",
            defaults.retry_backoff.as_secs(),
        )?);
        harvest.analyzer_timeout = Duration::from_secs(parse_or(
            &lookup,
            "HARVEST_ANALYZER_TIMEOUT_SECS",
            defaults.analyzer_timeout.as_secs(),
        )?);
        if let Some(prefix) = lookup("HARVEST_BATCH_PREFIX") {
            harvest.batch_prefix = prefix;
        }

        Ok(Self {
            harvest,
            catalog_url: lookup("HARVEST_CATALOG_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            requests_per_second: parse_or(&lookup, "HARVEST_REQUESTS_PER_SECOND", 1)?,
            ollama_base_url: lookup("OLLAMA_BASE_URL")
                .unwrap_or_else(|| ollama_client::DEFAULT_BASE_URL.to_string()),
            model: lookup("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}
