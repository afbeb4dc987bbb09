use apimigrate_core::{
    FileType, MigrationExecution, MigrationRequest, MigrationStatus, ProxyFile, TargetEnvironment,
};
use apimigrate_store::{Collection, Collections, DocumentStore, MemoryStore, UpdateOutcome};
use chrono::{Duration, Utc};
use std::sync::Arc;

fn store() -> Arc<dyn DocumentStore> {
    Arc::new(MemoryStore::new())
}

fn execution() -> MigrationExecution {
    let request = MigrationRequest {
        proxy_analysis_ids: vec!["analysis-1".into()],
        credentials_id: "cred-1".into(),
        target_environment: TargetEnvironment::Staging,
        auto_deploy: false,
    };
    MigrationExecution::queued("analysis-1", "orders", &request)
}

#[tokio::test]
async fn typed_round_trip() {
    let files: Collection<ProxyFile> = Collection::new(store());
    let file = ProxyFile::new("a.xml", "<APIProxy/>".into(), FileType::Xml);
    files.insert(&file).await.unwrap();

    let loaded = files.get(&file.id).await.unwrap().expect("stored");
    assert_eq!(loaded.filename, "a.xml");
    assert_eq!(loaded.file_type, FileType::Xml);
    assert!(files.get("missing").await.unwrap().is_none());
    assert_eq!(files.count().await.unwrap(), 1);
    assert!(files.delete(&file.id).await.unwrap());
    assert_eq!(files.count().await.unwrap(), 0);
}

#[tokio::test]
async fn list_recent_is_newest_first_and_bounded() {
    let files: Collection<ProxyFile> = Collection::new(store());
    let now = Utc::now();
    for i in 0..5 {
        let mut file = ProxyFile::new(format!("{}.xml", i), "<a/>".into(), FileType::Xml);
        file.uploaded_at = now - Duration::minutes(10 - i);
        files.insert(&file).await.unwrap();
    }

    let recent = files.list_recent(3).await.unwrap();
    let names: Vec<_> = recent.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(names, vec!["4.xml", "3.xml", "2.xml"]);
}

#[tokio::test]
async fn unreadable_documents_are_skipped() {
    let raw = store();
    raw.insert("proxy_files", "junk", serde_json::json!({"id": "junk"}))
        .await
        .unwrap();
    let files: Collection<ProxyFile> = Collection::new(raw);
    files
        .insert(&ProxyFile::new("ok.xml", "<a/>".into(), FileType::Xml))
        .await
        .unwrap();
    assert_eq!(files.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn typed_update_respects_terminal_state() {
    let collections = Collections::new(store());
    let exec = execution();
    collections.executions.insert(&exec).await.unwrap();

    let outcome = collections
        .executions
        .update(&exec.id, |e| e.fail("boom"))
        .await
        .unwrap();
    assert!(outcome.is_updated());

    // A second writer cannot overwrite the terminal record.
    let outcome = collections
        .executions
        .update(&exec.id, |e| e.fail("again"))
        .await
        .unwrap();
    match outcome {
        UpdateOutcome::Unchanged(e) => {
            assert_eq!(e.status, MigrationStatus::Failed);
            assert_eq!(e.error_message.as_deref(), Some("boom"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let missing = collections
        .executions
        .update("nope", |e| e.fail("x"))
        .await
        .unwrap();
    assert!(matches!(missing, UpdateOutcome::Missing));
    assert_eq!(collections.backend_name(), "memory");
}

#[tokio::test]
async fn concurrent_updates_do_not_lose_writes() {
    let collections = Collections::new(store());
    let exec = execution();
    collections.executions.insert(&exec).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let executions = collections.executions.clone();
        let id = exec.id.clone();
        handles.push(tokio::spawn(async move {
            executions
                .update(&id, move |e| {
                    e.migration_log.push(format!("line {}", i));
                    true
                })
                .await
                .unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let stored = collections.executions.get(&exec.id).await.unwrap().unwrap();
    assert_eq!(stored.migration_log.len(), 20);
}
