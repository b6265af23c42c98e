//! One-shot index build: catalog -> documents -> embeddings -> collection.
//!
//! The build never appends to an existing collection. It embeds everything
//! first, then deletes the old collection, fills a fresh one in fixed-size
//! batches and commits it with a single atomic write. A failure before the
//! delete leaves the previous collection untouched; a failure after it leaves
//! no collection at all, never a half-populated one.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

use crate::app::errors::BuildError;
use crate::app::types::IndexStats;
use crate::catalog::{self, LocationRecord};
use crate::semantic::preprocess::{enriched_document, flatten_metadata};
use crate::semantic::{CollectionStore, Embedder, VectorEntry};

/// Default number of entries inserted per batch
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default smoke query run after a build
pub const DEFAULT_SMOKE_QUERY: &str = "beach";

/// Number of neighbours requested by the smoke query
const SMOKE_QUERY_LIMIT: usize = 3;

pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    store: CollectionStore,
    collection: String,
    batch_size: usize,
    smoke_query: String,
    show_progress: bool,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, store: CollectionStore, collection: &str) -> Self {
        Self {
            embedder,
            store,
            collection: collection.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            smoke_query: DEFAULT_SMOKE_QUERY.to_string(),
            show_progress: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_smoke_query(mut self, query: &str) -> Self {
        self.smoke_query = query.to_string();
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Load the catalog at `catalog_path` and rebuild the collection from it.
    pub fn build(&self, catalog_path: &Path) -> Result<IndexStats, BuildError> {
        let records = catalog::load_catalog(catalog_path)?;
        self.build_from_records(&records)
    }

    /// Rebuild the collection from already validated records.
    pub fn build_from_records(&self, records: &[LocationRecord]) -> Result<IndexStats, BuildError> {
        let started = Instant::now();

        let documents: Vec<String> = records.iter().map(enriched_document).collect();

        log::info!(
            "embedding {} documents with '{}'",
            documents.len(),
            self.embedder.model_name()
        );
        let embeddings = self
            .embedder
            .embed_batch(&documents)
            .map_err(|source| BuildError::Embedding {
                stage: "catalog documents",
                source,
            })?;

        if embeddings.len() != documents.len() {
            return Err(BuildError::EmbeddingCount {
                expected: documents.len(),
                got: embeddings.len(),
            });
        }

        let entries: Vec<VectorEntry> = records
            .iter()
            .zip(documents)
            .zip(embeddings)
            .map(|((record, document), embedding)| VectorEntry {
                id: record.id.clone(),
                embedding,
                metadata: flatten_metadata(record),
                document,
            })
            .collect();

        if self.store.delete(&self.collection)? {
            log::info!("deleted existing collection '{}'", self.collection);
        }

        let mut collection = self.store.create(
            &self.collection,
            self.embedder.model_id_hash(),
            self.embedder.dimensions(),
        )?;

        let progress = self.progress_bar(entries.len() as u64);
        let mut batches = 0;
        let mut pending = entries.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<VectorEntry> = pending.by_ref().take(self.batch_size).collect();
            let inserted = collection.add(batch)?;
            batches += 1;
            progress.inc(inserted as u64);
            log::debug!("inserted batch {} ({} entries)", batches, inserted);
        }
        progress.finish_and_clear();

        collection.persist()?;
        log::info!(
            "collection '{}' committed with {} locations in {} batches",
            collection.name(),
            collection.len(),
            batches
        );

        let smoke_hits = self.smoke_test(&collection)?;

        Ok(IndexStats {
            collection: self.collection.clone(),
            records: collection.len(),
            batches,
            dimensions: self.embedder.dimensions(),
            model: self.embedder.model_name().to_string(),
            smoke_query: self.smoke_query.clone(),
            smoke_hits,
            built_at: chrono::Utc::now(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Run one query against the fresh collection. An empty result is only a warning.
    fn smoke_test(&self, collection: &crate::semantic::Collection) -> Result<usize, BuildError> {
        let vector = self
            .embedder
            .embed(&self.smoke_query)
            .map_err(|source| BuildError::Embedding {
                stage: "smoke query",
                source,
            })?;

        let hits = collection.index().query(&vector, SMOKE_QUERY_LIMIT)?;

        match hits.first() {
            Some(top) => log::info!(
                "smoke query '{}' returned {} results (top: {}, distance {:.3})",
                self.smoke_query,
                hits.len(),
                top.entry.id,
                top.distance
            ),
            None => log::warn!(
                "smoke query '{}' returned no results, collection '{}' may be empty",
                self.smoke_query,
                collection.name()
            ),
        }

        Ok(hits.len())
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message("indexing");
        bar
    }
}
