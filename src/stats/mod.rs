//! Relay statistics

pub mod metrics;

pub use metrics::{
    BroadcastCounters, CounterSnapshot, RegistryStats, RelayStats, SourceReport, SourceStats,
};
