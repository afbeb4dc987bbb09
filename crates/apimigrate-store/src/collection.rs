use crate::document_store::*;
use apimigrate_core::{
    MigrationExecution, MigrationPlan, ProxyAnalysis, ProxyFile, Result, StoredCredentials,
    SwaggerDoc,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

/// A record type that lives in exactly one collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    /// Timestamp used for newest-first listings.
    fn sort_key(&self) -> DateTime<Utc>;
}

macro_rules! document {
    ($ty:ty, $collection:expr, $sort:ident) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> &str {
                &self.id
            }

            fn sort_key(&self) -> DateTime<Utc> {
                self.$sort
            }
        }
    };
}

document!(ProxyFile, PROXY_FILES, uploaded_at);
document!(ProxyAnalysis, PROXY_ANALYSES, analyzed_at);
document!(MigrationPlan, MIGRATION_PLANS, created_at);
document!(StoredCredentials, APIGEE_CREDENTIALS, created_at);
document!(MigrationExecution, MIGRATION_EXECUTIONS, created_at);
document!(SwaggerDoc, SWAGGER_DOCS, uploaded_at);

/// Typed view over one collection of a [`DocumentStore`].
pub struct Collection<T: Document> {
    store: Arc<dyn DocumentStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Collection<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub async fn insert(&self, doc: &T) -> Result<()> {
        let value = serde_json::to_value(doc)?;
        self.store.insert(T::COLLECTION, doc.id(), value).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Every readable document. Documents that no longer deserialize are
    /// skipped with a warning rather than failing the listing.
    pub async fn list(&self) -> Result<Vec<T>> {
        let values = self.store.list(T::COLLECTION).await?;
        let mut docs = Vec::with_capacity(values.len());
        for value in values {
            match serde_json::from_value::<T>(value) {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!("Skipping unreadable {} document: {}", T::COLLECTION, e),
            }
        }
        Ok(docs)
    }

    /// Newest first, at most `limit` documents.
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<T>> {
        let mut docs = self.list().await?;
        docs.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        docs.truncate(limit);
        Ok(docs)
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.store.delete(T::COLLECTION, id).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count(T::COLLECTION).await
    }

    /// Atomic read-modify-write. `f` returns whether it changed the
    /// document; nothing is written otherwise.
    pub async fn update<F>(&self, id: &str, f: F) -> Result<UpdateOutcome<T>>
    where
        F: FnOnce(&mut T) -> bool + Send,
    {
        let step: UpdateFn<'_> = Box::new(move |value: &mut Value| {
            let mut doc: T = serde_json::from_value(value.clone())?;
            if !f(&mut doc) {
                return Ok(false);
            }
            *value = serde_json::to_value(&doc)?;
            Ok(true)
        });

        let outcome = self.store.update(T::COLLECTION, id, step).await?;
        Ok(match outcome {
            UpdateOutcome::Missing => UpdateOutcome::Missing,
            UpdateOutcome::Unchanged(v) => UpdateOutcome::Unchanged(serde_json::from_value(v)?),
            UpdateOutcome::Updated(v) => UpdateOutcome::Updated(serde_json::from_value(v)?),
        })
    }
}

/// All typed collections over one backing store.
#[derive(Clone)]
pub struct Collections {
    pub proxy_files: Collection<ProxyFile>,
    pub analyses: Collection<ProxyAnalysis>,
    pub plans: Collection<MigrationPlan>,
    pub credentials: Collection<StoredCredentials>,
    pub executions: Collection<MigrationExecution>,
    pub swagger_docs: Collection<SwaggerDoc>,
    backend: &'static str,
}

impl Collections {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            proxy_files: Collection::new(store.clone()),
            analyses: Collection::new(store.clone()),
            plans: Collection::new(store.clone()),
            credentials: Collection::new(store.clone()),
            executions: Collection::new(store.clone()),
            swagger_docs: Collection::new(store.clone()),
            backend: store.backend_name(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend
    }
}

impl std::fmt::Debug for Collections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collections")
            .field("backend", &self.backend)
            .finish()
    }
}
