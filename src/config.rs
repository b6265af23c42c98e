use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app::builder::{DEFAULT_BATCH_SIZE, DEFAULT_SMOKE_QUERY};
use crate::semantic::DEFAULT_MODEL;

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_COLLECTION: &str = "sri_lanka_locations";
const DEFAULT_CATALOG_PATH: &str = "sri_lanka_locations.json";
/// Upper bound on one embed + query round trip
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Embedding and indexing settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_model")]
    pub model: String,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Entries inserted per batch while building
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Query run after a build to check the collection answers
    #[serde(default = "default_smoke_query")]
    pub smoke_query: String,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            download_timeout_secs: default_download_timeout_secs(),
            batch_size: default_batch_size(),
            smoke_query: default_smoke_query(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_smoke_query() -> String {
    DEFAULT_SMOKE_QUERY.to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Catalog used by `build` when no path is given. Relative paths are
    /// resolved against the base directory.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// Name of the vector collection to build and serve
    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub semantic: SemanticConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            catalog_path: default_catalog_path(),
            collection: default_collection(),
            request_timeout_secs: default_request_timeout_secs(),
            semantic: SemanticConfig::default(),
            base_path: PathBuf::new(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from(DEFAULT_CATALOG_PATH)
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "listen_addr must be a socket address like 0.0.0.0:8080, got '{}'",
                self.listen_addr
            )));
        }

        let sem = &self.semantic;
        if sem.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "semantic.batch_size must be greater than 0".to_string(),
            ));
        }

        if sem.download_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "semantic.download_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if sem.smoke_query.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "semantic.smoke_query must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, writing defaults if it is missing.
    pub fn load_with(base_path: &Path) -> Result<Self, ConfigError> {
        let path = base_path.join(CONFIG_FILE);
        let io_err = |source| ConfigError::Io {
            path: path.clone(),
            source,
        };

        if !path.exists() {
            std::fs::create_dir_all(base_path).map_err(io_err)?;
            std::fs::write(&path, serde_yml::to_string(&Self::default())?).map_err(io_err)?;
            log::info!("wrote default config to {:?}", path);
        }

        let config_str = std::fs::read_to_string(&path).map_err(io_err)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;
        config.base_path = base_path.to_path_buf();
        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self.base_path.join(CONFIG_FILE);
        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(&path, config_str).map_err(|source| ConfigError::Io { path, source })
    }

    /// Catalog path with relative paths anchored at the base directory.
    pub fn resolved_catalog_path(&self) -> PathBuf {
        if self.catalog_path.is_absolute() {
            self.catalog_path.clone()
        } else {
            self.base_path.join(&self.catalog_path)
        }
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}
