use apimigrate_core::Result;
use async_trait::async_trait;
use serde_json::Value;

pub const PROXY_FILES: &str = "proxy_files";
pub const PROXY_ANALYSES: &str = "proxy_analyses";
pub const MIGRATION_PLANS: &str = "migration_plans";
pub const APIGEE_CREDENTIALS: &str = "apigee_credentials";
pub const MIGRATION_EXECUTIONS: &str = "migration_executions";
pub const SWAGGER_DOCS: &str = "swagger_docs";

pub const COLLECTIONS: [&str; 6] = [
    PROXY_FILES,
    PROXY_ANALYSES,
    MIGRATION_PLANS,
    APIGEE_CREDENTIALS,
    MIGRATION_EXECUTIONS,
    SWAGGER_DOCS,
];

/// Read-modify-write step. Returns whether the document changed; on
/// `Ok(false)` nothing is written.
pub type UpdateFn<'a> = Box<dyn FnOnce(&mut Value) -> Result<bool> + Send + 'a>;

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome<T = Value> {
    Missing,
    Unchanged(T),
    Updated(T),
}

impl<T> UpdateOutcome<T> {
    pub fn is_updated(&self) -> bool {
        matches!(self, UpdateOutcome::Updated(_))
    }
}

/// Named collections of JSON documents keyed by id.
///
/// `update` is atomic with respect to every other write on the same store,
/// which is what keeps concurrent status writers from clobbering each other.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, collection: &str, id: &str, doc: Value) -> Result<()>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// All documents, in no particular order.
    async fn list(&self, collection: &str) -> Result<Vec<Value>>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    async fn update(&self, collection: &str, id: &str, f: UpdateFn<'_>) -> Result<UpdateOutcome>;

    async fn count(&self, collection: &str) -> Result<usize>;

    fn backend_name(&self) -> &'static str;
}
