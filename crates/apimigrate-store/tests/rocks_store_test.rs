#![cfg(feature = "rocksdb")]

use apimigrate_core::{DatabaseBackend, DatabaseConfig, FileType, ProxyFile, RocksDbConfig};
use apimigrate_store::{open_store, Collection, DocumentStore, RocksStore, UpdateOutcome};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn documents_survive_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("db");

    let id = {
        let store: Arc<dyn DocumentStore> = Arc::new(RocksStore::open(&path).unwrap());
        let files: Collection<ProxyFile> = Collection::new(store);
        let file = ProxyFile::new("p.xml", "<APIProxy/>".into(), FileType::Xml);
        files.insert(&file).await.unwrap();
        file.id
    };

    let store: Arc<dyn DocumentStore> = Arc::new(RocksStore::open(&path).unwrap());
    let files: Collection<ProxyFile> = Collection::new(store);
    let loaded = files.get(&id).await.unwrap().expect("persisted");
    assert_eq!(loaded.content, "<APIProxy/>");
}

#[tokio::test]
async fn raw_operations() {
    let tmp = TempDir::new().unwrap();
    let store = RocksStore::open(tmp.path().join("db")).unwrap();

    store.insert("extra_collection", "a", json!({"n": 1})).await.unwrap();
    assert_eq!(store.count("extra_collection").await.unwrap(), 1);

    let outcome = store
        .update(
            "extra_collection",
            "a",
            Box::new(|doc: &mut Value| {
                doc["n"] = json!(2);
                Ok(true)
            }),
        )
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Updated(json!({"n": 2})));

    assert!(store.delete("extra_collection", "a").await.unwrap());
    assert!(!store.delete("extra_collection", "a").await.unwrap());
    assert!(store.list("extra_collection").await.unwrap().is_empty());
    assert_eq!(store.backend_name(), "rocksdb");
}

#[tokio::test]
async fn open_store_selects_rocksdb() {
    let tmp = TempDir::new().unwrap();
    let config = DatabaseConfig {
        backend: DatabaseBackend::RocksDb,
        rocksdb: RocksDbConfig {
            path: tmp.path().join("db").to_string_lossy().into_owned(),
        },
    };
    assert_eq!(open_store(&config).unwrap().backend_name(), "rocksdb");
}
