//! Named collections on disk.
//!
//! A `CollectionStore` is a directory holding one `<name>.bin` file per
//! collection. A `Collection` is the in-memory index plus the identity of the
//! model its vectors came from; it is only written to disk by `persist`, which
//! replaces the file atomically.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::semantic::index::{IndexError, VectorEntry, VectorIndex};
use crate::semantic::storage::{HeaderInfo, VectorStorage, VectorStorageError};

const COLLECTION_EXTENSION: &str = "bin";

static COLLECTION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{2,62}$").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid collection name {0:?}: use 3-63 letters, digits, '_' or '-'")]
    InvalidName(String),

    #[error("collection '{0}' does not exist")]
    NotFound(String),

    #[error("collection '{name}': {source}")]
    Storage {
        name: String,
        #[source]
        source: VectorStorageError,
    },

    #[error("collection '{name}': {source}")]
    Index {
        name: String,
        #[source]
        source: IndexError,
    },

    #[error("failed to prepare collection directory {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Directory of persisted collections.
#[derive(Debug, Clone)]
pub struct CollectionStore {
    root: PathBuf,
}

impl CollectionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.storage_for(name)?.exists())
    }

    /// Names of all collections in the store, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.root)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| {
                        path.is_file()
                            && path.extension().and_then(|ext| ext.to_str())
                                == Some(COLLECTION_EXTENSION)
                    })
                    .filter_map(|path| {
                        path.file_stem()
                            .and_then(|stem| stem.to_str())
                            .map(|s| s.to_string())
                    })
                    .filter(|name| COLLECTION_NAME.is_match(name))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Start a new, empty collection bound to a model. Nothing is written
    /// until [`Collection::persist`] is called.
    pub fn create(
        &self,
        name: &str,
        model_id: [u8; 32],
        dimensions: usize,
    ) -> Result<Collection, StoreError> {
        let storage = self.storage_for(name)?;
        Ok(Collection {
            name: name.to_string(),
            model_id,
            index: VectorIndex::new(dimensions),
            storage,
        })
    }

    /// Load an existing collection, checking it was built with the same model.
    pub fn open(
        &self,
        name: &str,
        model_id: [u8; 32],
        dimensions: usize,
    ) -> Result<Collection, StoreError> {
        let storage = self.storage_for(name)?;
        if !storage.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }

        let index = storage
            .load(&model_id, dimensions)
            .map_err(|source| StoreError::Storage {
                name: name.to_string(),
                source,
            })?;

        Ok(Collection {
            name: name.to_string(),
            model_id,
            index,
            storage,
        })
    }

    /// Header of a persisted collection, without loading its entries.
    pub fn describe(&self, name: &str) -> Result<HeaderInfo, StoreError> {
        let storage = self.storage_for(name)?;
        if !storage.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }

        storage.peek_header().map_err(|source| StoreError::Storage {
            name: name.to_string(),
            source,
        })
    }

    /// Remove a collection. Returns whether anything was deleted.
    pub fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let storage = self.storage_for(name)?;
        if !storage.exists() {
            return Ok(false);
        }

        storage.delete().map_err(|source| StoreError::Storage {
            name: name.to_string(),
            source,
        })?;
        Ok(true)
    }

    fn storage_for(&self, name: &str) -> Result<VectorStorage, StoreError> {
        if !COLLECTION_NAME.is_match(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }

        let path = self
            .root
            .join(format!("{name}.{COLLECTION_EXTENSION}"));
        Ok(VectorStorage::new(path))
    }
}

/// A named vector collection held in memory.
pub struct Collection {
    name: String,
    model_id: [u8; 32],
    index: VectorIndex,
    storage: VectorStorage,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Add a batch of entries; the batch is rejected as a whole on error.
    pub fn add(&mut self, batch: Vec<VectorEntry>) -> Result<usize, StoreError> {
        self.index
            .insert_batch(batch)
            .map_err(|source| StoreError::Index {
                name: self.name.clone(),
                source,
            })
    }

    /// Write the collection to disk, replacing any previous file atomically.
    pub fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.storage.path().parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        self.storage
            .save(&self.index, &self.model_id)
            .map_err(|source| StoreError::Storage {
                name: self.name.clone(),
                source,
            })
    }
}
