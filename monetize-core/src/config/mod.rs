//! Runtime configuration for the scheduler and the stream simulator.
//!
//! Both structs deserialize with defaults so that a configuration file only
//! needs to mention the values it changes.

use crate::events::POINTER_CHANGED;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of a [`DestinationScheduler`](crate::scheduler::DestinationScheduler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Cycle interval used when the caller does not pick one.
    pub default_interval_ms: u64,
    /// Shorter cycle intervals are raised to this value.
    pub min_interval_ms: u64,
    /// Application-defined channel names accepted by the router.
    pub custom_channels: Vec<String>,
    /// Seed for destination selection. Random when absent.
    pub rng_seed: Option<u64>,
}

impl SchedulerConfig {
    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms.max(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: 3000,
            min_interval_ms: 1,
            custom_channels: vec![POINTER_CHANGED.to_string()],
            rng_seed: None,
        }
    }
}

/// Shape of the stream produced by a [`StreamSimulator`](crate::host::StreamSimulator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// The start event follows the pending event after a random delay in this range.
    pub start_delay_min_ms: u64,
    pub start_delay_max_ms: u64,
    pub progress_interval_ms: u64,
    /// Amount carried by each progress event, in minor units.
    pub amount_per_progress: u64,
    pub currency_code: String,
    pub currency_scale: u32,
}

impl StreamConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            start_delay_min_ms: 300,
            start_delay_max_ms: 700,
            progress_interval_ms: 1000,
            amount_per_progress: 5421,
            currency_code: "USD".to_string(),
            currency_scale: 6,
        }
    }
}
