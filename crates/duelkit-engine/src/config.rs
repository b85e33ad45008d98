//! Engine configuration.

use std::time::Duration;

/// Configuration for the duel engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum time between two `join_queue` frames.
    pub join_debounce: Duration,

    /// Round timer used when a question does not carry its own
    /// `time_limit`. Zero disables the fallback timer.
    pub default_round_time_limit: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            join_debounce: Duration::from_secs(3),
            default_round_time_limit: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_join_debounce(mut self, window: Duration) -> Self {
        self.join_debounce = window;
        self
    }

    #[must_use]
    pub fn with_default_round_time_limit(mut self, limit: Duration) -> Self {
        self.default_round_time_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.join_debounce, Duration::from_secs(3));
        assert_eq!(config.default_round_time_limit, Duration::from_secs(30));
    }
}
