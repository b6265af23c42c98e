//! Build-then-query tests over the sample catalog with the keyword embedder.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::app::errors::{BuildError, QueryError};
use crate::app::types::StoredLocation;
use crate::semantic::preprocess::SNIPPET_LENGTH;
use crate::semantic::Embedder;

use super::support::{self, KeywordEmbedder, COLLECTION, DIMENSIONS};

fn stored(records: &[crate::catalog::LocationRecord]) -> Vec<StoredLocation> {
    records
        .iter()
        .map(|record| StoredLocation {
            id: record.id.clone(),
            name: record.name.clone(),
            location: record.location.clone(),
            description: record.description.clone(),
            tags: record.tags.clone(),
            best_for: record.best_for.clone(),
            popularity: record.popularity.clone(),
        })
        .collect()
}

#[test]
fn test_build_reports_stats() {
    let tmp = tempfile::tempdir().unwrap();
    let embedder = Arc::new(KeywordEmbedder::new("keyword-test"));

    let stats = support::builder(embedder, tmp.path())
        .build_from_records(&support::sample_catalog())
        .unwrap();

    assert_eq!(stats.collection, COLLECTION);
    assert_eq!(stats.records, 6);
    assert_eq!(stats.batches, 2);
    assert_eq!(stats.dimensions, DIMENSIONS);
    assert_eq!(stats.model, "keyword-test");
    assert_eq!(stats.smoke_query, "beach");
    assert_eq!(stats.smoke_hits, 3);
}

#[test]
fn test_build_from_catalog_file() {
    let tmp = tempfile::tempdir().unwrap();
    let catalog_path = tmp.path().join("locations.json");
    std::fs::write(
        &catalog_path,
        serde_json::to_string_pretty(&support::sample_catalog()).unwrap(),
    )
    .unwrap();

    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new("keyword-test"));
    let stats = support::builder(embedder.clone(), tmp.path())
        .build(&catalog_path)
        .unwrap();
    assert_eq!(stats.records, 6);

    let service = support::service(embedder, tmp.path());
    assert!(service.ready());
    assert_eq!(service.indexed_count(), 6);
}

#[test]
fn test_invalid_catalog_aborts_build() {
    let tmp = tempfile::tempdir().unwrap();
    let catalog_path = tmp.path().join("locations.json");
    std::fs::write(&catalog_path, r#"[{"id": "loc_001", "name": "Ella"}]"#).unwrap();

    let embedder = Arc::new(KeywordEmbedder::new("keyword-test"));
    let result = support::builder(embedder, tmp.path()).build(&catalog_path);

    assert!(matches!(result, Err(BuildError::Catalog(_))));
    assert!(!support::store(tmp.path()).exists(COLLECTION).unwrap());
}

#[test]
fn test_list_all_returns_catalog_in_order() {
    let (service, _tmp) = support::indexed_service();

    let listed = service.list_all().unwrap();

    assert_eq!(listed.total, 6);
    assert_eq!(listed.locations, stored(&support::sample_catalog()));
}

#[test]
fn test_recommend_sorted_and_ranked() {
    let (service, _tmp) = support::indexed_service();

    let response = service.recommend("beach snorkeling swimming", 5, 0.0).unwrap();

    assert_eq!(response.query, "beach snorkeling swimming");
    assert_eq!(response.total_results, response.results.len());
    assert_eq!(response.results.len(), 5);
    assert_eq!(response.results[0].name, "Unawatuna Beach");

    for (position, result) in response.results.iter().enumerate() {
        assert_eq!(result.rank, position + 1);
        assert!((0.0..=1.0).contains(&result.similarity_score));
    }
    for pair in response.results.windows(2) {
        assert!(pair[0].similarity_score >= pair[1].similarity_score);
    }
    assert!(response.message.contains("Found 5 locations"));
}

#[test]
fn test_recommend_never_exceeds_n() {
    let (service, _tmp) = support::indexed_service();

    for n in [1, 3, 6, 20] {
        let response = service.recommend("hiking", n, 0.0).unwrap();
        assert!(response.results.len() <= n as usize);
        assert!(response.results.len() <= 6);
    }
}

#[test]
fn test_min_score_filters_and_reranks() {
    let (service, _tmp) = support::indexed_service();

    let unfiltered = service.recommend("beach", 6, 0.0).unwrap();
    let threshold = unfiltered.results[2].similarity_score;

    let filtered = service.recommend("beach", 6, threshold).unwrap();

    assert!(!filtered.results.is_empty());
    assert!(filtered.results.len() <= unfiltered.results.len());
    for (position, result) in filtered.results.iter().enumerate() {
        assert!(result.similarity_score >= threshold);
        assert_eq!(result.rank, position + 1);
    }
}

#[test]
fn test_min_score_can_filter_everything() {
    let (service, _tmp) = support::indexed_service();

    let response = service.recommend("volcano glacier", 5, 1.0).unwrap();

    assert_eq!(response.total_results, 0);
    assert!(response.results.is_empty());
    assert!(response.message.contains("None of the 5 closest locations"));
}

#[test]
fn test_snippets_are_bounded() {
    let (service, _tmp) = support::indexed_service();

    let response = service.recommend("beach", 20, 0.0).unwrap();

    for result in &response.results {
        assert!(result.description_snippet.chars().count() <= SNIPPET_LENGTH + 3);
    }
    let long = response
        .results
        .iter()
        .find(|result| result.name == "Unawatuna Beach")
        .unwrap();
    assert!(long.description_snippet.ends_with("..."));
    assert_eq!(long.description_snippet.chars().count(), SNIPPET_LENGTH + 3);
}

#[test]
fn test_tag_search_only_returns_tagged_locations() {
    let (service, _tmp) = support::indexed_service();

    let response = service.search_by_tag("beach", 50).unwrap();

    let found: BTreeSet<String> = response.results.iter().map(|r| r.name.clone()).collect();
    let expected: BTreeSet<String> = support::sample_catalog()
        .into_iter()
        .filter(|record| {
            record
                .tags
                .iter()
                .chain(record.best_for.iter())
                .any(|value| value.to_lowercase().contains("beach"))
        })
        .map(|record| record.name)
        .collect();

    assert_eq!(found, expected);
    assert!(found.contains("Mirissa"));
    assert_eq!(response.tag, "beach");
    assert_eq!(response.total_results, response.results.len());
    for (position, result) in response.results.iter().enumerate() {
        assert_eq!(result.rank, position + 1);
    }
}

#[test]
fn test_tag_search_matches_audience() {
    let (service, _tmp) = support::indexed_service();

    let response = service.search_by_tag("Photographers", 50).unwrap();

    let names: BTreeSet<&str> = response.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        BTreeSet::from(["Sigiriya Rock Fortress", "Yala National Park"])
    );
}

#[test]
fn test_tag_search_without_matches_is_empty() {
    let (service, _tmp) = support::indexed_service();

    let response = service.search_by_tag("skiing", 10).unwrap();

    assert_eq!(response.total_results, 0);
    assert!(response.results.is_empty());
}

#[test]
fn test_rebuild_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new("keyword-test"));
    let catalog = support::sample_catalog();

    support::builder(embedder.clone(), tmp.path())
        .build_from_records(&catalog)
        .unwrap();
    let first = support::service(embedder.clone(), tmp.path()).list_all().unwrap();

    support::builder(embedder.clone(), tmp.path())
        .build_from_records(&catalog)
        .unwrap();
    let second = support::service(embedder, tmp.path()).list_all().unwrap();

    assert_eq!(first.total, 6);
    assert_eq!(first.locations, second.locations);
}

#[test]
fn test_rebuild_replaces_previous_contents() {
    let tmp = tempfile::tempdir().unwrap();
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new("keyword-test"));
    let catalog = support::sample_catalog();

    support::builder(embedder.clone(), tmp.path())
        .build_from_records(&catalog)
        .unwrap();
    support::builder(embedder.clone(), tmp.path())
        .build_from_records(&catalog[..2])
        .unwrap();

    let listed = support::service(embedder, tmp.path()).list_all().unwrap();
    assert_eq!(listed.locations, stored(&catalog[..2]));
}

#[test]
fn test_embedding_failure_keeps_previous_collection() {
    let tmp = tempfile::tempdir().unwrap();
    let embedder = Arc::new(KeywordEmbedder::new("keyword-test"));
    let catalog = support::sample_catalog();

    support::builder(embedder.clone(), tmp.path())
        .build_from_records(&catalog)
        .unwrap();

    embedder.break_model();
    let result = support::builder(embedder, tmp.path()).build_from_records(&catalog[..1]);
    assert!(matches!(result, Err(BuildError::Embedding { .. })));

    let fresh: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new("keyword-test"));
    let service = support::service(fresh, tmp.path());
    assert_eq!(service.list_all().unwrap().total, 6);
}

#[test]
fn test_empty_catalog_builds_empty_collection() {
    let tmp = tempfile::tempdir().unwrap();
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new("keyword-test"));

    let stats = support::builder(embedder.clone(), tmp.path())
        .build_from_records(&[])
        .unwrap();
    assert_eq!(stats.records, 0);
    assert_eq!(stats.batches, 0);
    assert_eq!(stats.smoke_hits, 0);

    let service = support::service(embedder, tmp.path());
    let response = service.recommend("beach", 5, 0.0).unwrap();
    assert_eq!(response.total_results, 0);
    assert!(response.message.contains("No locations are indexed"));
}

#[test]
fn test_queries_fail_before_first_build() {
    let tmp = tempfile::tempdir().unwrap();
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new("keyword-test"));

    let service = support::service(embedder, tmp.path());

    assert!(!service.ready());
    assert!(matches!(
        service.recommend("beach", 5, 0.0),
        Err(QueryError::ServiceUnavailable(_))
    ));
    assert!(matches!(
        service.search_by_tag("beach", 10),
        Err(QueryError::ServiceUnavailable(_))
    ));
    assert!(matches!(
        service.list_all(),
        Err(QueryError::ServiceUnavailable(_))
    ));
}

#[test]
fn test_collection_from_other_model_is_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let builder_model: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new("keyword-a"));
    support::builder(builder_model, tmp.path())
        .build_from_records(&support::sample_catalog())
        .unwrap();

    let other: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new("keyword-b"));
    let service = support::service(other, tmp.path());

    assert!(!service.ready());
    assert!(matches!(
        service.health(),
        Err(QueryError::ServiceUnavailable(_))
    ));
}

#[test]
fn test_query_embedding_failure_is_upstream() {
    let tmp = tempfile::tempdir().unwrap();
    let embedder = Arc::new(KeywordEmbedder::new("keyword-test"));
    support::builder(embedder.clone(), tmp.path())
        .build_from_records(&support::sample_catalog())
        .unwrap();
    let service = support::service(embedder.clone(), tmp.path());

    embedder.break_model();
    let err = service.recommend("beach", 5, 0.0).unwrap_err();

    assert!(matches!(err, QueryError::Embedding(_)));
    assert!(err.is_upstream());
}

#[test]
fn test_health_reports_collection() {
    let (service, _tmp) = support::indexed_service();

    let health = service.health().unwrap();

    assert_eq!(health.status, "healthy");
    assert!(health.collection_initialized);
    assert_eq!(health.collection, COLLECTION);
    assert_eq!(health.total_locations, 6);
    assert_eq!(health.model, "keyword-test");
}
