//! Engine configuration from environment variables.

use std::time::Duration;

/// Tunables for the scanning and dispatch loop.
///
/// Batch sizes, pause lengths and retry budgets of the planning and
/// enrichment pipelines are fixed in their modules; only the knobs an
/// operator actually turns live here.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often the scanner looks for due posts
    pub scan_interval: Duration,

    /// How far ahead of the slot time a post becomes due (minutes)
    pub due_lead_minutes: i64,

    /// Maximum posts processed concurrently
    pub max_concurrent_posts: usize,

    /// Whether the periodic scanner runs at all
    pub scanner_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(300),
            due_lead_minutes: 30,
            max_concurrent_posts: 4,
            scanner_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            scan_interval: std::env::var("SCAN_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.scan_interval),
            due_lead_minutes: std::env::var("DUE_LEAD_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.due_lead_minutes),
            max_concurrent_posts: std::env::var("MAX_CONCURRENT_POSTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_concurrent_posts),
            scanner_enabled: std::env::var("SCANNER_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.scanner_enabled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.scan_interval, Duration::from_secs(300));
        assert_eq!(config.due_lead_minutes, 30);
        assert_eq!(config.max_concurrent_posts, 4);
        assert!(config.scanner_enabled);
    }
}
