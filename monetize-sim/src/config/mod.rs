//! Configuration module for monetize-sim.
//!
//! Handles loading configuration from TOML files and CLI arguments.

pub mod file;
pub mod runtime;

pub use runtime::{LoadedConfig, Selection};

use crate::config::file::{FileConfig, SelectionMode, SelectionSection};
use monetize_core::config::SchedulerConfig;
use monetize_core::scheduler::{Candidates, WeightMap};
use monetize_sdk::objects::Destination;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Values given on the command line, applied over the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub seed: Option<u64>,
    pub duration_secs: Option<u64>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    overrides: Overrides,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, overrides: Overrides) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            overrides,
        }
    }

    /// Read, override, validate and build the configuration.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content)
    }

    pub fn load_str(&self, config_content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(config_content)?;

        if let Some(seed) = self.overrides.seed {
            file_config.scheduler.rng_seed = Some(seed);
        }
        if let Some(duration_secs) = self.overrides.duration_secs {
            file_config.stream.duration_secs = duration_secs;
        }

        validate(&file_config)?;
        Ok(build_loaded_config(file_config))
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let selection = &config.selection;

    if let Some(blank) = selection.destinations.iter().find(|d| d.trim().is_empty()) {
        return Err(ConfigError::ValidationError(format!(
            "destination {blank:?} is blank"
        )));
    }
    for (destination, weight) in &selection.weights {
        if destination.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "weights contain a blank destination".to_string(),
            ));
        }
        if !weight.is_finite() || *weight < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "weight of {destination} must be a non-negative number"
            )));
        }
    }

    match selection.mode {
        SelectionMode::Static | SelectionMode::Sequential if selection.destinations.is_empty() => {
            Err(ConfigError::ValidationError(
                "selection needs at least one destination".to_string(),
            ))
        }
        SelectionMode::Weighted if selection.weights.is_empty() => Err(
            ConfigError::ValidationError("weighted selection needs weights".to_string()),
        ),
        SelectionMode::Pluck if selection.destinations.is_empty() && selection.weights.is_empty() => {
            Err(ConfigError::ValidationError(
                "pluck needs destinations or weights".to_string(),
            ))
        }
        _ => Ok(()),
    }
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    let FileConfig {
        scheduler,
        stream,
        selection,
    } = file_config;

    LoadedConfig {
        selection: convert_selection(selection, &scheduler),
        scheduler,
        stream: stream.stream,
        duration: Duration::from_secs(stream.duration_secs),
    }
}

fn convert_selection(section: SelectionSection, scheduler: &SchedulerConfig) -> Selection {
    let interval = section
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| scheduler.default_interval());
    let destinations: Vec<Destination> = section
        .destinations
        .into_iter()
        .map(Destination::from)
        .collect();
    let weights: WeightMap = section.weights.into_iter().collect();

    match section.mode {
        SelectionMode::Static => {
            Selection::Static(destinations.into_iter().next().unwrap_or_default())
        }
        SelectionMode::Sequential => Selection::Sequential {
            destinations,
            interval,
        },
        SelectionMode::Weighted => Selection::Weighted { weights, interval },
        SelectionMode::Pluck if weights.is_empty() => {
            Selection::Pluck(Candidates::Sequence(destinations))
        }
        SelectionMode::Pluck => Selection::Pluck(Candidates::Weighted(weights)),
    }
}
