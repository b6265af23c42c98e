//! In-memory vector index with cosine distance search.
//!
//! Stores location embeddings together with their flattened metadata and the
//! document text that was embedded. Entries keep insertion order, which is
//! the "native" order used for fetch-all and for breaking distance ties.

use std::collections::{BTreeMap, HashMap};

/// Flattened, string-only metadata attached to an entry.
pub type Metadata = BTreeMap<String, String>;

/// An entry in the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
    /// The text that produced `embedding`
    pub document: String,
}

/// A nearest-neighbour hit borrowed from the index.
#[derive(Debug, Clone)]
pub struct Neighbor<'a> {
    pub entry: &'a VectorEntry,
    /// Cosine distance (`1 - cosine similarity`), in `[0.0, 2.0]`
    pub distance: f32,
}

/// In-memory vector index for semantic search.
pub struct VectorIndex {
    entries: Vec<VectorEntry>,
    /// Entry id -> position in `entries`
    positions: HashMap<String, usize>,
    dimensions: usize,
}

impl VectorIndex {
    /// Create a new empty vector index with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
            dimensions,
        }
    }

    /// Create an index with pre-allocated capacity.
    pub fn with_capacity(dimensions: usize, capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
            dimensions,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a new entry. Ids are unique; entries are never replaced in place.
    pub fn insert(&mut self, entry: VectorEntry) -> Result<(), IndexError> {
        self.check_entry(&entry)?;
        self.positions.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Insert a batch of entries. Either every entry is inserted or none is.
    pub fn insert_batch(&mut self, batch: Vec<VectorEntry>) -> Result<usize, IndexError> {
        let mut batch_ids = std::collections::HashSet::with_capacity(batch.len());
        for entry in &batch {
            self.check_entry(entry)?;
            if !batch_ids.insert(entry.id.as_str()) {
                return Err(IndexError::DuplicateId(entry.id.clone()));
            }
        }

        let count = batch.len();
        for entry in batch {
            self.positions.insert(entry.id.clone(), self.entries.len());
            self.entries.push(entry);
        }
        Ok(count)
    }

    /// Get an entry by id.
    pub fn get(&self, id: &str) -> Option<&VectorEntry> {
        self.positions.get(id).map(|&pos| &self.entries[pos])
    }

    /// Iterate over all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &VectorEntry> {
        self.entries.iter()
    }

    /// Find the `limit` nearest entries to `query`.
    ///
    /// Results are ordered by ascending cosine distance. Equal distances keep
    /// insertion order.
    pub fn query(&self, query: &[f32], limit: usize) -> Result<Vec<Neighbor<'_>>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let query_norm = l2_norm(query);
        if query_norm < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        let mut neighbors: Vec<Neighbor<'_>> = self
            .entries
            .iter()
            .map(|entry| Neighbor {
                entry,
                distance: 1.0 - cosine_similarity(query, &entry.embedding, query_norm),
            })
            .collect();

        // sort_by is stable, so ties stay in insertion order
        neighbors.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        neighbors.truncate(limit);

        Ok(neighbors)
    }

    fn check_entry(&self, entry: &VectorEntry) -> Result<(), IndexError> {
        if entry.embedding.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: entry.embedding.len(),
            });
        }

        if l2_norm(&entry.embedding) < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        if self.positions.contains_key(&entry.id) {
            return Err(IndexError::DuplicateId(entry.id.clone()));
        }

        Ok(())
    }
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity with a precomputed query norm.
fn cosine_similarity(query: &[f32], target: &[f32], query_norm: f32) -> f32 {
    let target_norm = l2_norm(target);
    if target_norm < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    (dot_product / (query_norm * target_norm)).clamp(-1.0, 1.0)
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,

    #[error("Entry with id '{0}' already exists")]
    DuplicateId(String),
}
