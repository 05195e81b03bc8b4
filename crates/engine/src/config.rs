//! Engine configuration.
//!
//! ```toml
//! creator = "analyst"
//! compress_replay = true
//!
//! [[compression]]
//! kind = "last_only"
//! function_id = "setParameter"
//! key = "/name"
//! ```

use std::path::Path;

use provenant_compress::{CompressionPipeline, CompressionRule};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {message}")]
    Read { path: String, message: String },

    #[error("could not parse engine config: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Creator written into descriptors of new graphs.
    pub creator: String,
    /// Compress the forward part of a jump before replaying it.
    pub compress_replay: bool,
    /// Ordered compression steps used for compacted persistence and, when
    /// enabled, for replay.
    pub compression: Vec<CompressionRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            creator: "anonymous".to_string(),
            compress_replay: false,
            compression: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn pipeline(&self) -> CompressionPipeline {
        CompressionPipeline::from_rules(&self.compression)
    }
}

/// Read and parse an engine config TOML file from `path`.
pub fn read_engine_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    EngineConfig::from_toml_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn parses_compression_rules() {
        let config = EngineConfig::from_toml_str(
            r#"
            creator = "analyst"
            compress_replay = true

            [[compression]]
            kind = "last_consecutive"
            function_id = "select"
            per_object = false

            [[compression]]
            kind = "create_remove"
            create = "addView"
            remove = "removeView"
            "#,
        )
        .unwrap();
        assert_eq!(config.creator, "analyst");
        assert!(config.compress_replay);
        assert_eq!(
            config.compression[0],
            CompressionRule::LastConsecutive {
                function_id: "select".into(),
                key: None,
                per_object: false,
            }
        );
        assert_eq!(config.pipeline().len(), 2);
    }

    #[test]
    fn rejects_unknown_rule_kind() {
        let err = EngineConfig::from_toml_str("[[compression]]\nkind = \"shuffle\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn read_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            read_engine_config(&path),
            Err(ConfigError::Read { .. })
        ));
        std::fs::write(&path, "creator = \"me\"\n").unwrap();
        assert_eq!(read_engine_config(&path).unwrap().creator, "me");
    }
}
