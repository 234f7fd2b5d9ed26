use crate::arena::DEFAULT_ARENA_CAPACITY;
use serde::Deserialize;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_INDEX_PATH: &str = "index.json";
pub const DEFAULT_ASSET_ROOT: &str = "./assets";
/// 30 seconds
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("http source needs a base_url")]
    MissingBaseUrl,
    #[error("invalid base_url {url}: {message}")]
    BaseUrl { url: String, message: String },
    #[error("building http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Bridge configuration, usually read from a toml file.
///
/// ```toml
/// index_path = "index.json"
///
/// [source]
/// kind = "http"
/// base_url = "https://example.com/assets"
/// timeout_ms = 10000
///
/// [arena]
/// capacity = 1048576
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// path of the asset index, resolved against the source like any other asset
    pub index_path: String,
    pub source: SourceConfig,
    pub arena: ArenaConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            index_path: DEFAULT_INDEX_PATH.to_string(),
            source: SourceConfig::default(),
            arena: ArenaConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Fs,
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// asset root for the fs source
    pub root: PathBuf,
    /// asset base url for the http source
    pub base_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            root: PathBuf::from(DEFAULT_ASSET_ROOT),
            base_url: None,
            timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArenaConfig {
    /// bytes of memory for an in-process arena
    pub capacity: u32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_ARENA_CAPACITY,
        }
    }
}
