use super::{DocumentStore, Filter, UpdateResult};
use crate::errors::{Error, Result, ResultExt};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Thread-safe in-memory document store.
///
/// Can be seeded from and persisted to a JSON snapshot of the form
/// `{"<collection>": [<document>, ...], ...}`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Value) -> Result<Self> {
        let Value::Object(object) = snapshot else {
            return Err(Error::InvalidInput(
                "snapshot must be an object of collections".to_string(),
            ));
        };

        let mut collections = BTreeMap::new();
        for (name, documents) in object {
            let Value::Array(documents) = documents else {
                return Err(Error::InvalidInput(format!(
                    "collection '{}' must be an array",
                    name
                )));
            };
            collections.insert(name, documents);
        }
        Ok(Self {
            collections: RwLock::new(collections),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(Error::from)
            .context(format!("reading snapshot {}", path.display()))?;
        let snapshot: Value = serde_json::from_str(&content)?;
        Self::from_snapshot(snapshot)
    }

    pub fn snapshot(&self) -> Value {
        let collections = self.collections.read();
        Value::Object(
            collections
                .iter()
                .map(|(name, docs)| (name.clone(), Value::Array(docs.clone())))
                .collect(),
        )
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(path, json)
            .map_err(Error::from)
            .context(format!("writing snapshot {}", path.display()))
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

impl DocumentStore for MemoryStore {
    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)).cloned()))
    }

    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Value>> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        set: Value,
        upsert: bool,
    ) -> Result<UpdateResult> {
        let Value::Object(fields) = set else {
            return Err(Error::InvalidInput(
                "$set payload must be a JSON object".to_string(),
            ));
        };

        let mut collections = self.collections.write();
        let documents = collections.entry(collection.to_string()).or_default();

        if let Some(existing) = documents.iter_mut().find(|d| filter.matches(d)) {
            match existing {
                Value::Object(target) => target.extend(fields),
                other => *other = Value::Object(fields),
            }
            return Ok(UpdateResult {
                matched: 1,
                upserted: false,
            });
        }

        if !upsert {
            return Ok(UpdateResult::default());
        }

        let mut document: Map<String, Value> = filter.to_document();
        document.extend(fields);
        documents.push(Value::Object(document));
        Ok(UpdateResult {
            matched: 0,
            upserted: true,
        })
    }

    fn insert_one(&self, collection: &str, document: Value) -> Result<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(document);
        Ok(())
    }
}
