//! Document store abstraction.
//!
//! The scoring core treats entities, observations, scores and model
//! artifacts as JSON documents in named collections. The backing store is
//! supplied by the caller; this module defines the operations the core
//! needs and an in-memory implementation used by the CLI and tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use esgmap::store::{DocumentStore, Filter, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.update_one("scores", &Filter::new().eq("entity_id", "c-1"), fields, true)?;
//! let latest = store.find_one("scores", &Filter::new().eq("entity_id", "c-1"))?;
//! ```

pub mod bounded;
pub mod memory;

pub use bounded::bounded_lookup;
pub use memory::MemoryStore;

use crate::errors::Result;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Equality filter over top-level document fields.
///
/// An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: BTreeMap<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Filter fields as a document, used as the base of an upsert
    pub fn to_document(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: usize,
    pub upserted: bool,
}

/// Operations the core requires from a document store.
///
/// Implementations must be thread-safe (`Send + Sync`) so independent
/// trees can be propagated in parallel against the same store.
pub trait DocumentStore: Send + Sync {
    /// First document in `collection` matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Store` if the backend cannot be read.
    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>>;

    /// All documents in `collection` matching `filter`, in insertion order.
    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Value>>;

    /// Apply `$set` semantics to the first matching document: each top-level
    /// field of `set` replaces the stored field. With `upsert`, a missing
    /// document is created from the filter fields plus `set`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `set` is not a JSON object.
    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        set: Value,
        upsert: bool,
    ) -> Result<UpdateResult>;

    /// Append a document to `collection`.
    fn insert_one(&self, collection: &str, document: Value) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::new().matches(&json!({"a": 1})));
    }

    #[test]
    fn test_filter_requires_all_fields() {
        let filter = Filter::new().eq("entity_id", "c-1").eq("kind", "company");
        assert!(filter.matches(&json!({"entity_id": "c-1", "kind": "company", "x": 2})));
        assert!(!filter.matches(&json!({"entity_id": "c-1", "kind": "fund"})));
        assert!(!filter.matches(&json!({"entity_id": "c-1"})));
    }
}
