//! Location catalog loading and validation.
//!
//! The catalog is a JSON array of location objects:
//!
//! ```json
//! [{ "id": "loc_001", "name": "Sigiriya", "location": "Matale",
//!    "description": "...", "tags": ["history", "hiking"],
//!    "best_for": ["culture lovers"], "popularity": "high" }]
//! ```
//!
//! Records are checked field by field so that a bad catalog reports the
//! offending record index and field instead of a generic serde message.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Delimiter used when list fields are flattened into metadata strings.
pub const LIST_DELIMITER: &str = ", ";

/// A single catalog entry. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: String,
    pub name: String,
    pub location: String,
    pub description: String,
    pub tags: Vec<String>,
    pub best_for: Vec<String>,
    pub popularity: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("catalog must be a JSON array of location records")]
    NotAnArray,

    #[error("record #{index}: field '{field}' {reason}")]
    Validation {
        index: usize,
        field: &'static str,
        reason: String,
    },

    #[error("record #{index}: duplicate id '{id}'")]
    DuplicateId { index: usize, id: String },
}

impl CatalogError {
    fn invalid(index: usize, field: &'static str, reason: impl Into<String>) -> Self {
        CatalogError::Validation {
            index,
            field,
            reason: reason.into(),
        }
    }
}

/// Read and validate a catalog file.
pub fn load_catalog(path: &Path) -> Result<Vec<LocationRecord>, CatalogError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let records = parse_catalog(&raw)?;
    log::info!("loaded {} locations from {:?}", records.len(), path);
    Ok(records)
}

/// Parse and validate catalog JSON.
pub fn parse_catalog(raw: &str) -> Result<Vec<LocationRecord>, CatalogError> {
    let value: Value = serde_json::from_str(raw)?;
    let items = value.as_array().ok_or(CatalogError::NotAnArray)?;

    let mut seen = HashSet::with_capacity(items.len());
    let mut records = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let record = validate_record(index, item)?;
        if !seen.insert(record.id.clone()) {
            return Err(CatalogError::DuplicateId {
                index,
                id: record.id,
            });
        }
        records.push(record);
    }

    Ok(records)
}

fn validate_record(index: usize, item: &Value) -> Result<LocationRecord, CatalogError> {
    let object = item
        .as_object()
        .ok_or_else(|| CatalogError::invalid(index, "record", "must be a JSON object"))?;

    let text = |field: &'static str| -> Result<String, CatalogError> {
        match object.get(field) {
            None | Some(Value::Null) => Err(CatalogError::invalid(index, field, "is missing")),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(CatalogError::invalid(index, field, "must be a string")),
        }
    };

    let list = |field: &'static str| -> Result<Vec<String>, CatalogError> {
        let values = match object.get(field) {
            None | Some(Value::Null) => {
                return Err(CatalogError::invalid(index, field, "is missing"))
            }
            Some(Value::Array(values)) => values,
            Some(_) => return Err(CatalogError::invalid(index, field, "must be a list")),
        };

        values
            .iter()
            .map(|value| {
                let s = value
                    .as_str()
                    .ok_or_else(|| CatalogError::invalid(index, field, "must contain only strings"))?;
                // join-then-split must stay lossless
                if s.is_empty() {
                    return Err(CatalogError::invalid(index, field, "contains an empty value"));
                }
                if s.contains(LIST_DELIMITER) {
                    return Err(CatalogError::invalid(
                        index,
                        field,
                        format!("value {s:?} contains the reserved delimiter {LIST_DELIMITER:?}"),
                    ));
                }
                Ok(s.to_string())
            })
            .collect()
    };

    let id = text("id")?;
    if id.trim().is_empty() {
        return Err(CatalogError::invalid(index, "id", "must not be empty"));
    }

    Ok(LocationRecord {
        id,
        name: text("name")?,
        location: text("location")?,
        description: text("description")?,
        tags: list("tags")?,
        best_for: list("best_for")?,
        popularity: text("popularity")?,
    })
}
