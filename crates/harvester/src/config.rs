//! Pipeline configuration

use std::path::PathBuf;

use harvester_common::{HarvestError, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default base URL of the profile API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.app.getprog.ai";

/// Default URL of the auxiliary token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://mohalocal.loca.lt/token";

/// Default seniority filter sent with every search request.
pub const DEFAULT_SENIORITY: &str = "Senior";

/// Default number of results requested per search page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default page to start from when no checkpoint exists.
pub const DEFAULT_START_PAGE: u64 = 0;

/// Default page ceiling; the pipeline terminates when the cursor reaches it.
pub const DEFAULT_MAX_PAGE: u64 = 50_000;

/// Default number of concurrent fetch workers per page.
pub const DEFAULT_WORKERS: usize = 40;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 100;

/// Default retry ceiling for the token endpoint.
pub const DEFAULT_TOKEN_MAX_RETRIES: u32 = 100;

/// Default exponential backoff factor for the token endpoint
/// (sleep = factor^attempt seconds).
pub const DEFAULT_TOKEN_BACKOFF_FACTOR: u64 = 2;

/// Default fixed delay between transient-failure retries, in seconds.
pub const DEFAULT_TRANSIENT_RETRY_DELAY_SECS: u64 = 3;

/// Default retry budget for calls whose failures are assumed transient.
/// Large on purpose: availability is assumed eventually restored, but the
/// budget keeps a persistent outage from looping forever.
pub const DEFAULT_TRANSIENT_MAX_ATTEMPTS: u32 = 1000;

/// Default number of consecutive empty pages treated as source exhaustion.
pub const DEFAULT_MAX_CONSECUTIVE_EMPTY_PAGES: u32 = 3;

/// Default number of refetch attempts for a malformed detail payload before
/// the record is reported and skipped.
pub const DEFAULT_MAX_MALFORMED_RETRIES: u32 = 3;

/// Default directory for checkpoint files.
pub const DEFAULT_CHECKPOINT_DIR: &str = "./checkpoints";

/// Harvest pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Run identifier; keys the checkpoint file so independent runs do not
    /// clobber each other's progress.
    pub run_id: String,

    /// Base URL of the profile API (search + detail endpoints).
    pub api_base_url: String,

    /// URL of the auxiliary token endpoint.
    pub token_url: String,

    /// Seniority filter values sent with every search request.
    pub seniority: Vec<String>,

    /// Results requested per search page.
    pub page_size: u32,

    /// Page to start from when no checkpoint exists.
    pub start_page: u64,

    /// Page ceiling (exclusive).
    pub max_page: u64,

    /// Concurrent fetch workers per page.
    pub workers: usize,

    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Retry ceiling for token acquisition.
    pub token_max_retries: u32,

    /// Exponential backoff factor for token acquisition.
    pub token_backoff_factor: u64,

    /// Fixed delay between transient retries, in seconds.
    pub transient_retry_delay_secs: u64,

    /// Retry budget for transient failures.
    pub transient_max_attempts: u32,

    /// Consecutive empty pages treated as source exhaustion.
    pub max_consecutive_empty_pages: u32,

    /// Refetch attempts for a malformed detail payload before skipping.
    pub max_malformed_retries: u32,

    /// Directory holding checkpoint files.
    pub checkpoint_dir: PathBuf,
}

impl HarvestConfig {
    /// Create a configuration with defaults for the given run identifier.
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            seniority: vec![DEFAULT_SENIORITY.to_string()],
            page_size: DEFAULT_PAGE_SIZE,
            start_page: DEFAULT_START_PAGE,
            max_page: DEFAULT_MAX_PAGE,
            workers: DEFAULT_WORKERS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_max_retries: DEFAULT_TOKEN_MAX_RETRIES,
            token_backoff_factor: DEFAULT_TOKEN_BACKOFF_FACTOR,
            transient_retry_delay_secs: DEFAULT_TRANSIENT_RETRY_DELAY_SECS,
            transient_max_attempts: DEFAULT_TRANSIENT_MAX_ATTEMPTS,
            max_consecutive_empty_pages: DEFAULT_MAX_CONSECUTIVE_EMPTY_PAGES,
            max_malformed_retries: DEFAULT_MAX_MALFORMED_RETRIES,
            checkpoint_dir: PathBuf::from(DEFAULT_CHECKPOINT_DIR),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// - `HARVEST_API_BASE_URL`, `HARVEST_TOKEN_URL`
    /// - `HARVEST_SENIORITY` (comma-separated), `HARVEST_PAGE_SIZE`
    /// - `HARVEST_START_PAGE`, `HARVEST_MAX_PAGE`, `HARVEST_WORKERS`
    /// - `HARVEST_CHECKPOINT_DIR`
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var("HARVEST_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Ok(url) = std::env::var("HARVEST_TOKEN_URL") {
            self.token_url = url;
        }
        if let Ok(val) = std::env::var("HARVEST_SENIORITY") {
            self.seniority = val.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(val) = std::env::var("HARVEST_PAGE_SIZE") {
            if let Ok(size) = val.parse() {
                self.page_size = size;
            }
        }
        if let Ok(val) = std::env::var("HARVEST_START_PAGE") {
            if let Ok(page) = val.parse() {
                self.start_page = page;
            }
        }
        if let Ok(val) = std::env::var("HARVEST_MAX_PAGE") {
            if let Ok(page) = val.parse() {
                self.max_page = page;
            }
        }
        if let Ok(val) = std::env::var("HARVEST_WORKERS") {
            if let Ok(workers) = val.parse() {
                self.workers = workers;
            }
        }
        if let Ok(dir) = std::env::var("HARVEST_CHECKPOINT_DIR") {
            self.checkpoint_dir = PathBuf::from(dir);
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.run_id.is_empty() {
            return Err(HarvestError::Config("run_id cannot be empty".to_string()));
        }
        if self.api_base_url.is_empty() {
            return Err(HarvestError::Config(
                "api_base_url cannot be empty".to_string(),
            ));
        }
        if self.token_url.is_empty() {
            return Err(HarvestError::Config("token_url cannot be empty".to_string()));
        }
        if self.workers == 0 {
            return Err(HarvestError::Config(
                "workers must be greater than 0".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(HarvestError::Config(
                "page_size must be greater than 0".to_string(),
            ));
        }
        if self.start_page >= self.max_page {
            return Err(HarvestError::Config(format!(
                "start_page {} must be below max_page {}",
                self.start_page, self.max_page
            )));
        }
        if self.max_consecutive_empty_pages == 0 {
            return Err(HarvestError::Config(
                "max_consecutive_empty_pages must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarvestConfig::new("test-run");
        assert!(config.validate().is_ok());
        assert_eq!(config.page_size, 100);
        assert_eq!(config.workers, 40);
        assert_eq!(config.seniority, vec!["Senior".to_string()]);
    }

    #[test]
    fn test_empty_run_id_rejected() {
        let config = HarvestConfig::new("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = HarvestConfig::new("test-run");
        config.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_start_page_beyond_ceiling_rejected() {
        let mut config = HarvestConfig::new("test-run");
        config.start_page = 100;
        config.max_page = 100;
        assert!(config.validate().is_err());
    }
}
