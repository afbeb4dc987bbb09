use crate::document_store::{DocumentStore, UpdateFn, UpdateOutcome, COLLECTIONS};
use apimigrate_core::{MigrateError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBCompressionType, DBWithThreadMode, IteratorMode,
    MultiThreaded, Options, WriteOptions,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

type DB = DBWithThreadMode<MultiThreaded>;

fn db_err(context: &str, e: rocksdb::Error) -> MigrateError {
    MigrateError::Database(format!("{}: {}", context, e))
}

/// RocksDB-backed store with one column family per collection; documents
/// are stored as JSON under their id.
pub struct RocksStore {
    db: DB,
    db_path: PathBuf,
    write_options: WriteOptions,
    // Serializes read-modify-write against other writers.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl RocksStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_compression_type(DBCompressionType::Zstd);

        // Every existing column family must be opened, plus the known collections.
        let mut families: BTreeSet<String> = DB::list_cf(&db_opts, path)
            .unwrap_or_default()
            .into_iter()
            .collect();
        families.extend(COLLECTIONS.iter().map(|c| c.to_string()));

        let cf_descriptors = families.iter().map(|name| {
            let mut opts = Options::default();
            opts.set_compression_type(DBCompressionType::Zstd);
            ColumnFamilyDescriptor::new(name, opts)
        });

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)
            .map_err(|e| db_err("Failed to open database", e))?;

        let mut write_options = WriteOptions::default();
        write_options.set_sync(false);

        info!("Opened RocksDB document store at {}", path.display());

        Ok(Self {
            db,
            db_path: path.to_path_buf(),
            write_options,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        if self.db.cf_handle(name).is_none() {
            let opts = Options::default();
            self.db
                .create_cf(name, &opts)
                .map_err(|e| db_err("Failed to create column family", e))?;
        }
        self.db
            .cf_handle(name)
            .ok_or_else(|| MigrateError::Database(format!("Column family '{}' not found", name)))
    }

    fn read(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let cf = self.cf_handle(collection)?;
        match self
            .db
            .get_cf(&cf, id.as_bytes())
            .map_err(|e| db_err("Failed to read document", e))?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write(&self, collection: &str, id: &str, doc: &Value) -> Result<()> {
        let cf = self.cf_handle(collection)?;
        let bytes = serde_json::to_vec(doc)?;
        self.db
            .put_cf_opt(&cf, id.as_bytes(), bytes, &self.write_options)
            .map_err(|e| db_err("Failed to write document", e))
    }
}

#[async_trait]
impl DocumentStore for RocksStore {
    async fn insert(&self, collection: &str, id: &str, doc: Value) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.write(collection, id, &doc)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        self.read(collection, id)
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>> {
        let cf = self.cf_handle(collection)?;
        let mut docs = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, bytes) = item.map_err(|e| db_err("Failed to iterate collection", e))?;
            docs.push(serde_json::from_slice(&bytes)?);
        }
        Ok(docs)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let cf = self.cf_handle(collection)?;
        let existed = self
            .db
            .get_pinned_cf(&cf, id.as_bytes())
            .map_err(|e| db_err("Failed to read document", e))?
            .is_some();
        if existed {
            self.db
                .delete_cf_opt(&cf, id.as_bytes(), &self.write_options)
                .map_err(|e| db_err("Failed to delete document", e))?;
        }
        Ok(existed)
    }

    async fn update(&self, collection: &str, id: &str, f: UpdateFn<'_>) -> Result<UpdateOutcome> {
        let _guard = self.write_lock.lock();
        let Some(current) = self.read(collection, id)? else {
            return Ok(UpdateOutcome::Missing);
        };
        let mut candidate = current.clone();
        if f(&mut candidate)? {
            self.write(collection, id, &candidate)?;
            Ok(UpdateOutcome::Updated(candidate))
        } else {
            Ok(UpdateOutcome::Unchanged(current))
        }
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let cf = self.cf_handle(collection)?;
        let mut n = 0;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            item.map_err(|e| db_err("Failed to iterate collection", e))?;
            n += 1;
        }
        Ok(n)
    }

    fn backend_name(&self) -> &'static str {
        "rocksdb"
    }
}
