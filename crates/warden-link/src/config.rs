//! Link configuration.
//!
//! [`LinkConfig`] collects the tunable behavior of one link endpoint.
//! Presets cover the common cases; individual fields can be adjusted
//! with the `with_*` builders.
//!
//! # Example
//!
//! ```
//! use warden_link::LinkConfig;
//! use std::time::Duration;
//!
//! let config = LinkConfig::default();
//! assert_eq!(config.request_timeout(), Duration::from_secs(30));
//!
//! let patient = LinkConfig::default().with_request_timeout_ms(120_000);
//! assert_eq!(patient.request_timeout(), Duration::from_secs(120));
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time a request awaiter waits for its response.
///
/// 30 seconds covers slow multi-hop forwards (control → controller →
/// host → instance) with a loaded game server at the end, while still
/// bounding how long a dead peer can hold a caller.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Behavior knobs for one link endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Milliseconds a pending request waits before failing with a
    /// timeout. Individual sends may override this.
    pub request_timeout_ms: u64,
}

impl LinkConfig {
    /// Returns the request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Overrides the default request timeout.
    #[must_use]
    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout() {
        assert_eq!(
            LinkConfig::default().request_timeout_ms,
            DEFAULT_REQUEST_TIMEOUT_MS
        );
    }

    #[test]
    fn serde_round_trip() {
        let config = LinkConfig::default().with_request_timeout_ms(500);
        let json = serde_json::to_string(&config).expect("serialize");
        let back: LinkConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }
}
