use crate::{
    app::{builder::IndexBuilder, service::QueryService},
    config::Config,
    semantic::{CollectionStore, Embedder, EmbeddingModel},
};
use anyhow::{Context, Result};
use homedir::my_home;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Application factory for creating and configuring application components
pub struct AppFactory;

impl AppFactory {
    /// Get application paths, creating the base directory if needed
    pub fn get_paths() -> Result<AppPaths> {
        let base_path = Self::get_base_path()?;
        std::fs::create_dir_all(&base_path)
            .context("Failed to create application base directory")?;

        Ok(AppPaths::new(base_path))
    }

    /// Load configuration from the base directory
    pub fn create_config(paths: &AppPaths) -> Result<Config> {
        Config::load_with(&paths.base_path).context("Failed to load configuration")
    }

    /// Load the configured embedding model
    pub fn create_embedder(config: &Config, paths: &AppPaths) -> Result<Arc<dyn Embedder>> {
        let timeout = Duration::from_secs(config.semantic.download_timeout_secs);
        let model = EmbeddingModel::new(&config.semantic.model, paths.base_path.clone(), Some(timeout))
            .with_context(|| format!("Failed to load embedding model '{}'", config.semantic.model))?;

        Ok(Arc::new(model))
    }

    pub fn create_store(paths: &AppPaths) -> CollectionStore {
        CollectionStore::new(paths.collections_path.clone())
    }

    /// Create the query service.
    ///
    /// Never fails: if the model or the collection cannot be loaded the service
    /// starts in the unavailable state and reports why.
    pub fn create_query_service(config: &Config, paths: &AppPaths) -> QueryService {
        let embedder = match Self::create_embedder(config, paths) {
            Ok(embedder) => embedder,
            Err(err) => {
                log::error!("{err:#}");
                return QueryService::unavailable(format!("{err:#}"));
            }
        };

        Self::query_service_with(embedder, &Self::create_store(paths), &config.collection)
    }

    /// Open `collection` for the given embedder, or build an unavailable service.
    pub fn query_service_with(
        embedder: Arc<dyn Embedder>,
        store: &CollectionStore,
        collection: &str,
    ) -> QueryService {
        match store.open(collection, embedder.model_id_hash(), embedder.dimensions()) {
            Ok(opened) => {
                if opened.is_empty() {
                    log::warn!("collection '{}' has no locations", opened.name());
                }
                log::info!(
                    "collection '{}' loaded with {} locations",
                    opened.name(),
                    opened.len()
                );
                QueryService::new(embedder, opened)
            }
            Err(err) => {
                log::warn!(
                    "collection '{collection}' is not available in {:?}: {err}. Run `wayfarer build` first",
                    store.root()
                );
                QueryService::unavailable(err.to_string())
            }
        }
    }

    /// Create an index builder configured from `config`
    pub fn create_index_builder(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        paths: &AppPaths,
    ) -> IndexBuilder {
        IndexBuilder::new(embedder, Self::create_store(paths), &config.collection)
            .with_batch_size(config.semantic.batch_size)
            .with_smoke_query(&config.semantic.smoke_query)
    }

    /// Get the base path for the application
    fn get_base_path() -> Result<PathBuf> {
        if let Ok(base_path) = std::env::var("WAYFARER_BASE_PATH") {
            return Ok(PathBuf::from(base_path));
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;
        Ok(home.join(".local/share/wayfarer"))
    }
}

/// Application paths structure
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_path: PathBuf,
    pub collections_path: PathBuf,
}

impl AppPaths {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            collections_path: base_path.join("collections"),
            base_path,
        }
    }
}
