//! Pacing configuration

use std::time::Duration;

use crate::error::{Error, Result};
use crate::registry::DEFAULT_CHUNK_SIZE;

/// Default interval between two reads
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(150);

/// Upper bound on the chunk size
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Cadence of a paced source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingConfig {
    /// Maximum bytes read and broadcast per tick
    pub chunk_size: usize,

    /// Interval between two ticks
    pub tick_period: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            tick_period: DEFAULT_TICK_PERIOD,
        }
    }
}

impl PacingConfig {
    /// Set chunk size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set tick period
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Reject values the pacing loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::invalid_config("chunk size must be greater than zero"));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::invalid_config(format!(
                "chunk size {} exceeds maximum of {MAX_CHUNK_SIZE} bytes",
                self.chunk_size
            )));
        }
        if self.tick_period.is_zero() {
            return Err(Error::invalid_config("tick period must be greater than zero"));
        }
        Ok(())
    }
}
