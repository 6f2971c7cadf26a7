use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::shard::ShardingConfig;

pub const CONFIG_FILE_NAME: &str = "s5.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FsConfig {
    /// Trie parameters for newly sharded directories
    #[serde(default)]
    pub sharding: ShardingConfig,
    #[serde(default)]
    pub listing: ListingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Page size used when a listing asks for none, 0 for unlimited
    #[serde(default)]
    pub default_limit: usize,
}

impl FsConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: FsConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config_toml = fs::read_to_string(path)?;
        Self::from_toml_str(&config_toml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sharding
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.sharding.max_inline_entries == 0 {
            return Err(ConfigError::Invalid(
                "max_inline_entries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
