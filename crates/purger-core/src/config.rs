//! EngineConfig - エンジンの調整値
//!
//! `Purger.toml`（任意）と `PURGER_*` 環境変数から読み込みます。
//! どちらにもない項目はデフォルト値になります。

use std::path::Path;

use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

use crate::domain::TargetSize;
use crate::engine::{DEFAULT_AD_THRESHOLD, DEFAULT_WINDOW_SPAN};

pub const DEFAULT_EVENT_CAPACITY: usize = 64;
pub const DEFAULT_COMMAND_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Indices kept warm around the cursor.
    pub window_span: usize,
    /// Counted reveals between two interstitials.
    pub ad_threshold: u32,
    /// Longest photo edge to decode; unset means full resolution.
    pub photo_max_dimension: Option<u32>,
    pub event_capacity: usize,
    pub command_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_span: DEFAULT_WINDOW_SPAN,
            ad_threshold: DEFAULT_AD_THRESHOLD,
            photo_max_dimension: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn photo_target(&self) -> TargetSize {
        match self.photo_max_dimension {
            Some(edge) => TargetSize::Fit {
                width: edge,
                height: edge,
            },
            None => TargetSize::Maximum,
        }
    }
}

/// Load `path` (default `Purger.toml`, optional) then `PURGER_*` overrides.
pub fn load_configuration(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let file = match path {
        Some(path) => ConfigFile::from(path).required(true),
        None => ConfigFile::with_name("Purger").required(false),
    };
    let builder = Config::builder()
        .add_source(file)
        .add_source(Environment::with_prefix("PURGER").try_parsing(true))
        .build()?;
    builder.try_deserialize::<EngineConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> EngineConfig {
        Config::builder()
            .add_source(ConfigFile::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn empty_source_gives_defaults() {
        let config = from_toml("");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.window_span, 10);
        assert_eq!(config.ad_threshold, 10);
        assert_eq!(config.photo_target(), TargetSize::Maximum);
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let config = from_toml("ad_threshold = 3\nphoto_max_dimension = 2048\n");
        assert_eq!(config.ad_threshold, 3);
        assert_eq!(config.window_span, DEFAULT_WINDOW_SPAN);
        assert_eq!(
            config.photo_target(),
            TargetSize::Fit {
                width: 2048,
                height: 2048
            }
        );
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = load_configuration(Some(Path::new("/nonexistent/purger.toml")));
        assert!(result.is_err());
    }
}
