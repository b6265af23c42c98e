//! Response shapes returned by the query service and serialized by the web layer.

use serde::{Deserialize, Serialize};

/// One ranked location in a recommendation or tag search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedLocation {
    /// 1-based position after filtering
    pub rank: usize,
    /// `max(0, 1 - distance)`, rounded to 3 decimals
    pub similarity_score: f32,
    pub name: String,
    pub location: String,
    pub tags: Vec<String>,
    pub best_for: Vec<String>,
    pub popularity: String,
    pub description_snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub query: String,
    pub total_results: usize,
    pub results: Vec<RankedLocation>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagSearchResponse {
    pub tag: String,
    pub total_results: usize,
    pub results: Vec<RankedLocation>,
}

/// A catalog entry as read back from the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLocation {
    pub id: String,
    pub name: String,
    pub location: String,
    pub description: String,
    pub tags: Vec<String>,
    pub best_for: Vec<String>,
    pub popularity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationsResponse {
    pub total: usize,
    pub locations: Vec<StoredLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub collection_initialized: bool,
    pub collection: String,
    pub total_locations: usize,
    pub model: String,
}

/// Summary of a finished index build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub collection: String,
    pub records: usize,
    pub batches: usize,
    pub dimensions: usize,
    pub model: String,
    pub smoke_query: String,
    pub smoke_hits: usize,
    pub built_at: chrono::DateTime<chrono::Utc>,
    pub elapsed_ms: u64,
}

/// One persisted collection as reported by `wayfarer collections`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub name: String,
    pub locations: u64,
    pub dimensions: usize,
    /// Built with the model named in config.yaml
    pub model_matches: bool,
    /// The collection served by default
    pub configured: bool,
}
