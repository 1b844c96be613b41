//! # Node Configuration
//!
//! Defaults, then an optional JSON file named by `POW_CONFIG`, then
//! individual environment overrides.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `POW_CONFIG` | path to a JSON file with any subset of the fields |
//! | `POW_TARGET_BITS` | `pow.target_bits` |
//! | `POW_PACK_LIMIT` | `pow.pack_limit` |
//! | `POW_GRACE_MS` | `pow.grace_period_ms` |
//! | `POW_QUEUE_CAPACITY` | `pow.queue_capacity` |
//! | `POW_CHAIN_ID` | `pow.chain_id` |
//! | `POW_ROUND_INTERVAL_MS` | `round_interval_ms` |
//! | `POW_PEER_ID` | `peer_id` |

use pow_consensus::{PowConfig, PowError};
use serde::Deserialize;
use shared_types::PeerId;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Default time between round triggers (milliseconds).
pub const DEFAULT_ROUND_INTERVAL_MS: u64 = 2_000;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`NodeConfig`].
    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// An environment override could not be parsed.
    #[error("Invalid value {value:?} for {var}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Rejected value.
        value: String,
    },

    /// The merged configuration is unusable.
    #[error("Invalid consensus configuration: {0}")]
    Invalid(#[from] PowError),

    /// Rounds would fire continuously.
    #[error("round_interval_ms must be at least 1")]
    ZeroRoundInterval,
}

/// Complete node configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeConfig {
    /// Consensus configuration.
    pub pow: PowConfig,
    /// Time between round triggers (milliseconds).
    pub round_interval_ms: u64,
    /// Local peer id; a random one is generated when unset.
    pub peer_id: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            pow: PowConfig::default(),
            round_interval_ms: DEFAULT_ROUND_INTERVAL_MS,
            peer_id: None,
        }
    }
}

impl NodeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|var| std::env::var(var).ok())
    }

    /// Load using `lookup` to read variables.
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup("POW_CONFIG") {
            Some(path) => Self::from_file(PathBuf::from(path))?,
            None => Self::default(),
        };

        override_from(&lookup, "POW_TARGET_BITS", &mut config.pow.target_bits)?;
        override_from(&lookup, "POW_PACK_LIMIT", &mut config.pow.pack_limit)?;
        override_from(&lookup, "POW_GRACE_MS", &mut config.pow.grace_period_ms)?;
        override_from(&lookup, "POW_QUEUE_CAPACITY", &mut config.pow.queue_capacity)?;
        override_from(&lookup, "POW_CHAIN_ID", &mut config.pow.chain_id)?;
        override_from(&lookup, "POW_ROUND_INTERVAL_MS", &mut config.round_interval_ms)?;
        if let Some(peer) = lookup("POW_PEER_ID") {
            config.peer_id = Some(peer);
        }

        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Reject unusable values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pow.validate()?;
        if self.round_interval_ms == 0 {
            return Err(ConfigError::ZeroRoundInterval);
        }
        Ok(())
    }

    /// Round trigger period.
    pub fn round_interval(&self) -> Duration {
        Duration::from_millis(self.round_interval_ms)
    }

    /// Configured peer id, or a fresh random one.
    pub fn resolve_peer_id(&self) -> PeerId {
        match &self.peer_id {
            Some(id) if !id.is_empty() => PeerId::new(id.clone()),
            _ => PeerId::new(uuid::Uuid::new_v4().to_string()),
        }
    }
}

fn override_from<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    slot: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(var) {
        *slot = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { var, value })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = NodeConfig::load(env(&[])).unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.round_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_env_overrides() {
        let config = NodeConfig::load(env(&[
            ("POW_TARGET_BITS", "12"),
            ("POW_PACK_LIMIT", "5"),
            ("POW_GRACE_MS", " 250 "),
            ("POW_PEER_ID", "node-a"),
        ]))
        .unwrap();

        assert_eq!(config.pow.target_bits, 12);
        assert_eq!(config.pow.pack_limit, 5);
        assert_eq!(config.pow.grace_period_ms, 250);
        assert_eq!(config.resolve_peer_id(), PeerId::new("node-a"));
    }

    #[test]
    fn test_unparsable_env_rejected() {
        let err = NodeConfig::load(env(&[("POW_PACK_LIMIT", "lots")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "POW_PACK_LIMIT",
                ..
            }
        ));
    }

    #[test]
    fn test_out_of_range_bits_rejected() {
        let err = NodeConfig::load(env(&[("POW_TARGET_BITS", "300")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file_reported() {
        let err = NodeConfig::load(env(&[("POW_CONFIG", "/nonexistent/pow.json")])).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_file_then_env() {
        let path = std::env::temp_dir().join(format!("pow-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{"round_interval_ms": 500, "pow": {"target_bits": 10, "chain_id": 7}}"#,
        )
        .unwrap();

        let path_str = path.to_string_lossy().to_string();
        let config = NodeConfig::load(env(&[
            ("POW_CONFIG", path_str.as_str()),
            ("POW_TARGET_BITS", "11"),
        ]))
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.round_interval_ms, 500);
        assert_eq!(config.pow.chain_id, 7);
        assert_eq!(config.pow.target_bits, 11);
    }

    #[test]
    fn test_random_peer_id_when_unset() {
        let config = NodeConfig::default();
        assert_ne!(config.resolve_peer_id(), config.resolve_peer_id());
    }
}
