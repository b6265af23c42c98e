//! Shared fixtures: a deterministic keyword embedder and a small catalog.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::app::builder::IndexBuilder;
use crate::app::service::QueryService;
use crate::app::AppFactory;
use crate::catalog::LocationRecord;
use crate::semantic::{CollectionStore, Embedder, EmbeddingError};

pub const COLLECTION: &str = "test_locations";
pub const DIMENSIONS: usize = 1024;

/// Bag-of-words embedder: every lowercase word bumps one hashed dimension.
/// Dimension 0 carries a constant so no vector is ever all zeros.
pub struct KeywordEmbedder {
    name: String,
    fail: AtomicBool,
    delay_ms: AtomicU64,
}

impl KeywordEmbedder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
        }
    }

    /// Make every following call fail.
    pub fn break_model(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Make every following call take at least `delay`.
    pub fn slow_down(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSIONS];
        vector[0] = 0.5;
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let slot = crc32fast::hash(word.to_lowercase().as_bytes()) as usize % (DIMENSIONS - 1);
            vector[slot + 1] += 1.0;
        }
        vector
    }

    fn check(&self) -> Result<(), EmbeddingError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::EmbeddingFailed("model unloaded".to_string()));
        }
        Ok(())
    }
}

impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.check()?;
        Ok(self.vector(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.check()?;
        Ok(texts.iter().map(|text| self.vector(text)).collect())
    }
}

fn record(
    id: &str,
    name: &str,
    location: &str,
    description: &str,
    tags: &[&str],
    best_for: &[&str],
    popularity: &str,
) -> LocationRecord {
    LocationRecord {
        id: id.to_string(),
        name: name.to_string(),
        location: location.to_string(),
        description: description.to_string(),
        tags: tags.iter().map(|s| s.to_string()).collect(),
        best_for: best_for.iter().map(|s| s.to_string()).collect(),
        popularity: popularity.to_string(),
    }
}

pub fn sample_catalog() -> Vec<LocationRecord> {
    vec![
        record(
            "loc_001",
            "Sigiriya Rock Fortress",
            "Matale District",
            "Ancient rock fortress with frescoes and water gardens, climbed by a steep staircase through the lion gate.",
            &["history", "hiking", "unesco"],
            &["culture lovers", "photographers"],
            "very high",
        ),
        record(
            "loc_002",
            "Unawatuna Beach",
            "Galle District",
            "Sheltered crescent beach with calm water for swimming and snorkeling near coral reefs. ".repeat(4).trim(),
            &["beach", "snorkeling", "swimming"],
            &["families", "beach lovers"],
            "high",
        ),
        record(
            "loc_003",
            "Ella",
            "Badulla District",
            "Hill country village surrounded by tea plantations, waterfalls and hiking trails such as Little Adam's Peak.",
            &["hiking", "tea", "mountains"],
            &["backpackers", "nature lovers"],
            "high",
        ),
        record(
            "loc_004",
            "Mirissa",
            "Matara District",
            "Surf beach town known for whale watching tours and relaxed nightlife by the sea.",
            &["Beach", "whale watching", "surfing"],
            &["couples", "surfers"],
            "high",
        ),
        record(
            "loc_005",
            "Yala National Park",
            "Hambantota District",
            "Dry zone national park with leopards, elephants and coastal lagoons visited on jeep safaris.",
            &["wildlife", "safari"],
            &["nature lovers", "photographers"],
            "very high",
        ),
        record(
            "loc_006",
            "Temple of the Tooth",
            "Kandy",
            "Buddhist temple in the royal palace complex that houses the relic of the tooth of the Buddha.",
            &["religion", "history"],
            &[],
            "very high",
        ),
    ]
}

pub fn store(base: &Path) -> CollectionStore {
    CollectionStore::new(base.join("collections"))
}

pub fn builder(embedder: Arc<dyn Embedder>, base: &Path) -> IndexBuilder {
    IndexBuilder::new(embedder, store(base), COLLECTION).with_batch_size(4)
}

pub fn service(embedder: Arc<dyn Embedder>, base: &Path) -> QueryService {
    AppFactory::query_service_with(embedder, &store(base), COLLECTION)
}

/// Build the sample catalog into a fresh temp dir and open a service on it.
pub fn indexed_service() -> (QueryService, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new("keyword-test"));

    builder(embedder.clone(), tmp.path())
        .build_from_records(&sample_catalog())
        .expect("build failed");

    (service(embedder, tmp.path()), tmp)
}
