//! Configuration types for the backend client and the OpenSearch transport.

use std::time::Duration;

/// Configuration for the search backend.
///
/// This struct controls where the backend lives and how long calls may take.
/// A missing `url` means the backend is not configured: the client then treats
/// it as permanently unavailable and every operation becomes a logged no-op.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend URL (e.g. "http://localhost:9200"). `None` disables the backend.
    pub url: Option<String>,

    /// Upper bound for every single backend request.
    ///
    /// Defaults to 30 seconds.
    pub request_timeout: Duration,

    /// Number of documents fetched per page when scrolling an index.
    ///
    /// Defaults to 500.
    pub scroll_page_size: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            request_timeout: Duration::from_secs(30),
            scroll_page_size: 500,
        }
    }
}

impl BackendConfig {
    /// Create a config pointing at `url` with default limits.
    ///
    /// # Arguments
    ///
    /// * `url` - The backend URL
    ///
    /// # Returns
    ///
    /// A `BackendConfig` with the url set and default timeout and page size.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Whether a backend host is configured. Blank urls count as missing.
    pub fn is_configured(&self) -> bool {
        self.url
            .as_deref()
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unconfigured() {
        let config = BackendConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.scroll_page_size, 500);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_blank_url_is_unconfigured() {
        assert!(!BackendConfig::with_url("  ").is_configured());
        assert!(BackendConfig::with_url("http://localhost:9200").is_configured());
    }
}
