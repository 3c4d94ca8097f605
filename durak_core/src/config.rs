use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;

use crate::card::Rank;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("bad config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub lowest_rank: Rank,
    pub cards_per_player: usize,
    pub min_players: usize,
    pub optimistic_timeout_ms: u64,
    pub cheat_revert_window_ms: u64,
    /// Break out only once every other player sent `allowbreak`.
    pub require_allow_break: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            lowest_rank: Rank::Two,
            cards_per_player: 6,
            min_players: 2,
            optimistic_timeout_ms: 3000,
            cheat_revert_window_ms: 5000,
            require_allow_break: false,
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn optimistic_timeout(&self) -> Duration {
        Duration::from_millis(self.optimistic_timeout_ms)
    }

    pub fn cheat_revert_window(&self) -> Duration {
        Duration::from_millis(self.cheat_revert_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        card::Rank,
        config::{ConfigError, EngineConfig},
    };

    #[test]
    fn from_json_should_fill_in_defaults() {
        let config = EngineConfig::from_json(r#"{"lowest_rank": 6, "require_allow_break": true}"#).unwrap();
        assert_eq!(config.lowest_rank, Rank::Six);
        assert!(config.require_allow_break);
        assert_eq!(config.cards_per_player, 6);
        assert_eq!(config.cheat_revert_window().as_secs(), 5);
    }

    #[test]
    fn from_json_should_reject_unknown_rank() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"lowest_rank": 1}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn from_json_file_should_report_missing_file() {
        let result = EngineConfig::from_json_file("no/such/durak.json");
        assert!(matches!(result, Err(ConfigError::Read { path, .. }) if path == "no/such/durak.json"));
    }
}
