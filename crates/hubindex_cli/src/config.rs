//! Configuration and element snapshot loading.

use hubindex_core::{
    Element, EndpointConfig, IndexerConfig, MemoryElementStore, RebuildStrategy,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading CLI input files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("could not read {}: {source}", .path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid JSON of the expected shape.
    #[error("invalid JSON in {}: {source}", .path.display())]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// No endpoint of that name is configured.
    #[error("endpoint '{0}' is not configured")]
    UnknownEndpoint(String),
}

/// Contents of the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// First segment of every index name.
    pub index_prefix: String,
    /// Rebuild batch size override.
    #[serde(default)]
    pub chunk_size: Option<u64>,
    /// Configured endpoints.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl CliConfig {
    /// Reads a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json(path)
    }

    /// Looks up an endpoint by name.
    pub fn endpoint(&self, name: &str) -> Result<&EndpointConfig, ConfigError> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.name == name)
            .ok_or_else(|| ConfigError::UnknownEndpoint(name.to_string()))
    }

    /// Builds the indexer configuration.
    pub fn indexer_config(&self, strategy: RebuildStrategy) -> IndexerConfig {
        let config = IndexerConfig::new(self.index_prefix.clone()).with_strategy(strategy);
        match self.chunk_size {
            Some(chunk_size) => config.with_chunk_size(chunk_size),
            None => config,
        }
    }
}

/// Reads an element snapshot (a JSON array of elements) into a store.
pub fn load_elements(path: &Path) -> Result<MemoryElementStore, ConfigError> {
    let elements: Vec<Element> = read_json(path)?;
    Ok(MemoryElementStore::from_elements(elements))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
