//! Query service: recommend, tag search, list and health over one collection.
//!
//! The service is constructed once at startup. When the collection could not
//! be opened it is built in an unavailable state and every operation returns
//! `QueryError::ServiceUnavailable` with the recorded reason.

use std::sync::Arc;

use crate::app::errors::QueryError;
use crate::app::types::{
    HealthResponse, LocationsResponse, RankedLocation, RecommendResponse, StoredLocation,
    TagSearchResponse,
};
use crate::semantic::preprocess::{keys, snippet, split_list};
use crate::semantic::{Collection, Embedder, Metadata, Neighbor};

pub const MAX_RECOMMEND_RESULTS: u32 = 20;
pub const MAX_TAG_RESULTS: u32 = 50;

struct ServiceState {
    embedder: Arc<dyn Embedder>,
    collection: Collection,
}

pub struct QueryService {
    state: Result<ServiceState, String>,
}

impl QueryService {
    pub fn new(embedder: Arc<dyn Embedder>, collection: Collection) -> Self {
        Self {
            state: Ok(ServiceState {
                embedder,
                collection,
            }),
        }
    }

    /// A service with no usable collection.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: Err(reason.into()),
        }
    }

    pub fn ready(&self) -> bool {
        self.state.is_ok()
    }

    pub fn indexed_count(&self) -> usize {
        self.state
            .as_ref()
            .map(|state| state.collection.len())
            .unwrap_or(0)
    }

    fn state(&self) -> Result<&ServiceState, QueryError> {
        self.state
            .as_ref()
            .map_err(|reason| QueryError::ServiceUnavailable(reason.clone()))
    }

    /// Rank locations by similarity to a free-text query.
    pub fn recommend(
        &self,
        query: &str,
        n: u32,
        min_score: f32,
    ) -> Result<RecommendResponse, QueryError> {
        let text = query.trim();
        if text.is_empty() {
            return Err(QueryError::invalid("query must not be empty"));
        }
        check_limit("n", n, MAX_RECOMMEND_RESULTS)?;
        if !min_score.is_finite() || !(0.0..=1.0).contains(&min_score) {
            return Err(QueryError::invalid(format!(
                "min_score must be between 0.0 and 1.0, got {min_score}"
            )));
        }

        let state = self.state()?;
        let vector = state.embedder.embed(text)?;
        let neighbors = state.collection.index().query(&vector, n as usize)?;

        if neighbors.is_empty() {
            return Ok(RecommendResponse {
                query: query.to_string(),
                total_results: 0,
                results: vec![],
                message: "No locations are indexed yet, so nothing could be recommended."
                    .to_string(),
            });
        }

        let retrieved = neighbors.len();
        let results = rank(&neighbors, |score, _| score >= min_score);

        let message = if results.is_empty() {
            format!(
                "None of the {retrieved} closest locations reached a similarity of {min_score:.2}. Try a lower min_score or a broader query."
            )
        } else {
            format!("Found {} locations matching '{}'", results.len(), text)
        };

        log::debug!(
            "recommend '{}': {} retrieved, {} kept (min_score {})",
            text,
            retrieved,
            results.len(),
            min_score
        );

        Ok(RecommendResponse {
            query: query.to_string(),
            total_results: results.len(),
            results,
            message,
        })
    }

    /// Semantic retrieval for a tag, then an exact substring filter on the
    /// stored `tags` and `best_for` strings.
    pub fn search_by_tag(&self, tag: &str, n: u32) -> Result<TagSearchResponse, QueryError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(QueryError::invalid("tag must not be empty"));
        }
        check_limit("n", n, MAX_TAG_RESULTS)?;

        let state = self.state()?;
        let vector = state.embedder.embed(&tag_query(tag))?;
        let neighbors = state.collection.index().query(&vector, n as usize)?;

        let needle = tag.to_lowercase();
        let results = rank(&neighbors, |_, metadata| {
            [keys::TAGS, keys::BEST_FOR].iter().any(|key| {
                metadata
                    .get(*key)
                    .map(|value| value.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
        });

        log::debug!(
            "tag search '{}': {} retrieved, {} matched",
            tag,
            neighbors.len(),
            results.len()
        );

        Ok(TagSearchResponse {
            tag: tag.to_string(),
            total_results: results.len(),
            results,
        })
    }

    /// Every stored location in collection order.
    pub fn list_all(&self) -> Result<LocationsResponse, QueryError> {
        let state = self.state()?;

        let locations: Vec<StoredLocation> = state
            .collection
            .index()
            .iter()
            .map(|entry| StoredLocation {
                id: entry.id.clone(),
                name: field(&entry.metadata, keys::NAME),
                location: field(&entry.metadata, keys::LOCATION),
                description: field(&entry.metadata, keys::DESCRIPTION),
                tags: split_list(&field(&entry.metadata, keys::TAGS)),
                best_for: split_list(&field(&entry.metadata, keys::BEST_FOR)),
                popularity: field(&entry.metadata, keys::POPULARITY),
            })
            .collect();

        Ok(LocationsResponse {
            total: locations.len(),
            locations,
        })
    }

    pub fn health(&self) -> Result<HealthResponse, QueryError> {
        let state = self.state()?;

        Ok(HealthResponse {
            status: "healthy".to_string(),
            collection_initialized: true,
            collection: state.collection.name().to_string(),
            total_locations: state.collection.len(),
            model: state.embedder.model_name().to_string(),
        })
    }
}

/// Query text used to bridge a tag into embedding space.
pub fn tag_query(tag: &str) -> String {
    format!("places for {tag} activities {tag} locations")
}

/// `max(0, 1 - distance)` rounded to 3 decimals.
pub fn similarity_score(distance: f32) -> f32 {
    let similarity = (1.0 - distance).max(0.0);
    (similarity * 1000.0).round() / 1000.0
}

fn check_limit(name: &str, value: u32, max: u32) -> Result<(), QueryError> {
    if !(1..=max).contains(&value) {
        return Err(QueryError::invalid(format!(
            "{name} must be between 1 and {max}, got {value}"
        )));
    }
    Ok(())
}

/// Turn neighbours (already nearest-first) into ranked results, keeping the
/// ones `keep` accepts. Ranks are assigned after filtering.
fn rank<F>(neighbors: &[Neighbor<'_>], keep: F) -> Vec<RankedLocation>
where
    F: Fn(f32, &Metadata) -> bool,
{
    neighbors
        .iter()
        .map(|neighbor| (similarity_score(neighbor.distance), neighbor.entry))
        .filter(|(score, entry)| keep(*score, &entry.metadata))
        .enumerate()
        .map(|(position, (score, entry))| RankedLocation {
            rank: position + 1,
            similarity_score: score,
            name: field(&entry.metadata, keys::NAME),
            location: field(&entry.metadata, keys::LOCATION),
            tags: split_list(&field(&entry.metadata, keys::TAGS)),
            best_for: split_list(&field(&entry.metadata, keys::BEST_FOR)),
            popularity: field(&entry.metadata, keys::POPULARITY),
            description_snippet: snippet(&entry.document),
        })
        .collect()
}

fn field(metadata: &Metadata, key: &str) -> String {
    metadata.get(key).cloned().unwrap_or_default()
}
