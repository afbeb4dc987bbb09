use crate::document_store::{DocumentStore, UpdateFn, UpdateOutcome};
use apimigrate_core::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

type CollectionMap = Arc<DashMap<String, Value>>;

/// Process-local store. Contents are lost on restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    collections: Arc<DashMap<String, CollectionMap>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, name: &str) -> CollectionMap {
        if let Some(existing) = self.collections.get(name) {
            return existing.clone();
        }
        self.collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(DashMap::new()))
            .clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, id: &str, doc: Value) -> Result<()> {
        self.collection(collection).insert(id.to_string(), doc);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self.collection(collection).get(id).map(|d| d.value().clone()))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>> {
        Ok(self
            .collection(collection)
            .iter()
            .map(|d| d.value().clone())
            .collect())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.collection(collection).remove(id).is_some())
    }

    async fn update(&self, collection: &str, id: &str, f: UpdateFn<'_>) -> Result<UpdateOutcome> {
        let coll = self.collection(collection);
        // The entry guard holds the shard lock for the whole read-modify-write.
        let Some(mut entry) = coll.get_mut(id) else {
            return Ok(UpdateOutcome::Missing);
        };
        let mut candidate = entry.value().clone();
        if f(&mut candidate)? {
            *entry.value_mut() = candidate.clone();
            Ok(UpdateOutcome::Updated(candidate))
        } else {
            Ok(UpdateOutcome::Unchanged(entry.value().clone()))
        }
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.collection(collection).len())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
