//! Relay configuration

use std::time::Duration;

use crate::error::{Error, Result};
use crate::source::PacingConfig;

/// Default maximum source size (500 MiB)
pub const DEFAULT_MAX_SOURCE_SIZE: u64 = 500 << 20;

/// Default time a retiring source gets to stop before it is aborted
pub const DEFAULT_RETIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// Relay configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Cadence of every source generation
    pub pacing: PacingConfig,

    /// Sources larger than this are rejected
    pub max_source_size: u64,

    /// How long a replaced source may take to stop
    pub retire_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            pacing: PacingConfig::default(),
            max_source_size: DEFAULT_MAX_SOURCE_SIZE,
            retire_timeout: DEFAULT_RETIRE_TIMEOUT,
        }
    }
}

impl RelayConfig {
    /// Set the pacing
    pub fn pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    /// Set chunk size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.pacing = self.pacing.chunk_size(size);
        self
    }

    /// Set tick period
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.pacing = self.pacing.tick_period(period);
        self
    }

    /// Set maximum source size in bytes
    pub fn max_source_size(mut self, size: u64) -> Self {
        self.max_source_size = size;
        self
    }

    /// Set retire timeout
    pub fn retire_timeout(mut self, timeout: Duration) -> Self {
        self.retire_timeout = timeout;
        self
    }

    /// Reject values the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        self.pacing.validate()?;
        if self.max_source_size == 0 {
            return Err(Error::invalid_config(
                "maximum source size must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();

        assert_eq!(config.max_source_size, 500 * 1024 * 1024);
        assert_eq!(config.retire_timeout, Duration::from_secs(2));
        assert_eq!(config.pacing, PacingConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chaining() {
        let config = RelayConfig::default()
            .chunk_size(1024)
            .tick_period(Duration::from_millis(50))
            .max_source_size(10)
            .retire_timeout(Duration::from_millis(500));

        assert_eq!(config.pacing.chunk_size, 1024);
        assert_eq!(config.pacing.tick_period, Duration::from_millis(50));
        assert_eq!(config.max_source_size, 10);
        assert_eq!(config.retire_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_validate() {
        assert!(RelayConfig::default().max_source_size(0).validate().is_err());
        assert!(RelayConfig::default().chunk_size(0).validate().is_err());
    }
}
