pub mod collection;
pub mod document_store;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocks;

pub use collection::{Collection, Collections, Document};
pub use document_store::*;
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb")]
pub use rocks::RocksStore;

#[cfg(not(feature = "rocksdb"))]
use apimigrate_core::MigrateError;
use apimigrate_core::{DatabaseBackend, DatabaseConfig, Result};
use std::sync::Arc;
use tracing::info;

/// Opens the backend selected by `database.backend`.
pub fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.backend {
        DatabaseBackend::Memory => {
            info!("Using in-memory document store; records are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "rocksdb")]
        DatabaseBackend::RocksDb => Ok(Arc::new(RocksStore::open(&config.rocksdb.path)?)),
        #[cfg(not(feature = "rocksdb"))]
        DatabaseBackend::RocksDb => Err(MigrateError::Database(
            "RocksDB backend requested but this build lacks the 'rocksdb' feature".to_string(),
        )),
    }
}
