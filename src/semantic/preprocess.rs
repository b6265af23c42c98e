//! Text preparation for embedding and metadata storage.
//!
//! - Enriched documents: everything searchable about a location in one text
//! - Metadata flattening: list fields joined into delimiter-separated strings
//! - Snippets: documents truncated for display

use crate::catalog::{LocationRecord, LIST_DELIMITER};
use crate::semantic::index::Metadata;

/// Maximum snippet length in characters, not bytes
pub const SNIPPET_LENGTH: usize = 200;

/// Ellipsis suffix when a snippet is truncated
const TRUNCATION_SUFFIX: &str = "...";

/// Metadata keys written for every location.
pub mod keys {
    pub const NAME: &str = "name";
    pub const LOCATION: &str = "location";
    pub const DESCRIPTION: &str = "description";
    pub const TAGS: &str = "tags";
    pub const BEST_FOR: &str = "best_for";
    pub const POPULARITY: &str = "popularity";
}

/// Build the text that gets embedded for a location.
///
/// Combines name, place, description, audiences, tags and popularity so the
/// vector carries more signal than the bare description.
pub fn enriched_document(record: &LocationRecord) -> String {
    let mut doc = format!("{} in {}. {}", record.name.trim(), record.location.trim(), record.description.trim());

    if !record.best_for.is_empty() {
        doc.push_str(&format!(" Best for: {}.", join_list(&record.best_for)));
    }
    if !record.tags.is_empty() {
        doc.push_str(&format!(" Tags: {}.", join_list(&record.tags)));
    }
    if !record.popularity.trim().is_empty() {
        doc.push_str(&format!(" Popularity: {}.", record.popularity.trim()));
    }

    doc
}

/// Flatten a record into string-only metadata.
pub fn flatten_metadata(record: &LocationRecord) -> Metadata {
    Metadata::from([
        (keys::NAME.to_string(), record.name.clone()),
        (keys::LOCATION.to_string(), record.location.clone()),
        (keys::DESCRIPTION.to_string(), record.description.clone()),
        (keys::TAGS.to_string(), join_list(&record.tags)),
        (keys::BEST_FOR.to_string(), join_list(&record.best_for)),
        (keys::POPULARITY.to_string(), record.popularity.clone()),
    ])
}

pub fn join_list(values: &[String]) -> String {
    values.join(LIST_DELIMITER)
}

/// Inverse of [`join_list`]; an empty string is an empty list.
pub fn split_list(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        return vec![];
    }
    joined.split(LIST_DELIMITER).map(|s| s.to_string()).collect()
}

/// Truncate a document to [`SNIPPET_LENGTH`] characters, adding an ellipsis
/// only when something was cut.
pub fn snippet(document: &str) -> String {
    match document.char_indices().nth(SNIPPET_LENGTH) {
        None => document.to_string(),
        Some((cut, _)) => format!("{}{}", &document[..cut], TRUNCATION_SUFFIX),
    }
}
