//! TOML file configuration structures.
//!
//! These structs directly map to the `monetize-sim.toml` file format.

use indexmap::IndexMap;
use monetize_core::config::{SchedulerConfig, StreamConfig};
use serde::{Deserialize, Serialize};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub scheduler: SchedulerConfig,
    pub stream: StreamSection,
    pub selection: SelectionSection,
}

/// Stream section: the simulated stream plus how long to run it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSection {
    #[serde(flatten)]
    pub stream: StreamConfig,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            duration_secs: default_duration_secs(),
        }
    }
}

fn default_duration_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Publish the first destination and keep it.
    #[default]
    Static,
    Sequential,
    Weighted,
    /// One random pick, no cycling.
    Pluck,
}

/// Selection section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSection {
    pub mode: SelectionMode,
    pub destinations: Vec<String>,
    /// Destination to weight, in draw order.
    pub weights: IndexMap<String, f64>,
    /// Cycle interval. Falls back to `scheduler.default_interval_ms`.
    pub interval_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[scheduler]
min_interval_ms = 250
custom_channels = ["pointer_changed", "ad_hidden"]
rng_seed = 42

[stream]
progress_interval_ms = 500
amount_per_progress = 100
currency_code = "XRP"
currency_scale = 9
duration_secs = 30

[selection]
mode = "weighted"
interval_ms = 2000

[selection.weights]
"$wallet.example/alice" = 0.7
"$wallet.example/bob" = 0.05
"$wallet.example/connie" = 0.25
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scheduler.min_interval_ms, 250);
        assert_eq!(config.scheduler.rng_seed, Some(42));
        assert_eq!(config.scheduler.custom_channels.len(), 2);
        assert_eq!(config.stream.stream.currency_code, "XRP");
        assert_eq!(config.stream.stream.start_delay_min_ms, 300);
        assert_eq!(config.stream.duration_secs, 30);
        assert_eq!(config.selection.mode, SelectionMode::Weighted);
        assert_eq!(config.selection.interval_ms, Some(2000));

        let order: Vec<&str> = config.selection.weights.keys().map(String::as_str).collect();
        assert_eq!(
            order,
            vec![
                "$wallet.example/alice",
                "$wallet.example/bob",
                "$wallet.example/connie"
            ]
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.stream.stream, StreamConfig::default());
        assert_eq!(config.stream.duration_secs, 10);
        assert_eq!(config.selection.mode, SelectionMode::Static);
        assert!(config.selection.destinations.is_empty());
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let toml_str = r#"
[selection]
mode = "round-robin"
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
