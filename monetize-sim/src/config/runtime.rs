//! Runtime configuration built from the validated file.

use monetize_core::config::{SchedulerConfig, StreamConfig};
use monetize_core::scheduler::{Candidates, WeightMap};
use monetize_sdk::objects::Destination;
use std::time::Duration;

/// How the simulator chooses what to publish.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Static(Destination),
    Sequential {
        destinations: Vec<Destination>,
        interval: Duration,
    },
    Weighted {
        weights: WeightMap,
        interval: Duration,
    },
    Pluck(Candidates),
}

impl Selection {
    pub fn mode_name(&self) -> &'static str {
        match self {
            Selection::Static(_) => "static",
            Selection::Sequential { .. } => "sequential",
            Selection::Weighted { .. } => "weighted",
            Selection::Pluck(_) => "pluck",
        }
    }
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub scheduler: SchedulerConfig,
    pub stream: StreamConfig,
    pub selection: Selection,
    pub duration: Duration,
}
