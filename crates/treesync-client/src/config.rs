//! Client settings.

use std::time::Duration;

use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://thingsboard.heatmanager.de";

/// Settings of a [`ThingsboardClient`](crate::ThingsboardClient).
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Backend root; API paths are appended to it.
    pub base_url: Url,

    /// Deadline for each asset listing page (default: 15 seconds).
    pub asset_list_timeout: Duration,

    /// Deadline for a device detail lookup (default: 10 seconds).
    pub device_timeout: Duration,

    /// Deadline for an attribute lookup (default: 5 seconds).
    pub attributes_timeout: Duration,

    /// Retry schedule for the three relation queries.
    pub relation_retry: RetryPolicy,

    /// Assets requested per listing page (default: 10000).
    pub page_size: u32,

    /// Upper bound on listing pages followed (default: 100).
    pub max_pages: u32,
}

impl ClientSettings {
    /// Settings with defaults for everything but the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if `base_url` does not parse or is
    /// not an `http`/`https` URL.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let parsed = Url::parse(base_url.trim())
            .map_err(|e| ClientError::invalid_url(base_url, e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
            return Err(ClientError::invalid_url(base_url, "expected an http(s) URL"));
        }

        Ok(Self {
            base_url: parsed,
            asset_list_timeout: Duration::from_secs(15),
            device_timeout: Duration::from_secs(10),
            attributes_timeout: Duration::from_secs(5),
            relation_retry: RetryPolicy::default(),
            page_size: 10_000,
            max_pages: 100,
        })
    }

    #[must_use]
    pub fn with_asset_list_timeout(mut self, timeout: Duration) -> Self {
        self.asset_list_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_device_timeout(mut self, timeout: Duration) -> Self {
        self.device_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_attributes_timeout(mut self, timeout: Duration) -> Self {
        self.attributes_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_relation_retry(mut self, policy: RetryPolicy) -> Self {
        self.relation_retry = policy;
        self
    }

    /// Zero is raised to 1.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Zero is raised to 1.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }
}
