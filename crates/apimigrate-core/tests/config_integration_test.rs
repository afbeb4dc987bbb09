use apimigrate_core::{ConfigManager, DatabaseBackend, Settings};
use secrecy::SecretString;
use std::fs;
use tempfile::TempDir;

fn config_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, body) in files {
        fs::write(dir.path().join(name), body).unwrap();
    }
    dir
}

#[tokio::test]
async fn load_layers_default_env_and_local_files() {
    let dir = config_dir(&[
        (
            "default.toml",
            "[server]\nport = 9000\n[llm]\nmodel = \"gpt-4o-mini\"\n",
        ),
        ("production.yaml", "server:\n  port: 9200\nuploads:\n  max_proxy_bytes: 2048\n"),
        ("local.toml", "[cors]\nallowed_origins = [\"https://console.example.com\"]\n"),
    ]);

    let manager = ConfigManager::load(
        Some(dir.path().to_path_buf()),
        Some("production".to_string()),
    )
    .unwrap();
    let settings = manager.snapshot().await;

    assert_eq!(settings.env, "production");
    assert_eq!(settings.server.port, 9200);
    assert_eq!(settings.llm.model, "gpt-4o-mini");
    assert_eq!(settings.uploads.max_proxy_bytes, 2048);
    assert_eq!(settings.uploads.max_swagger_bytes, 10 * 1024 * 1024);
    assert!(!settings.cors.allows_any());
    assert_eq!(manager.config_dir(), dir.path());
}

#[test]
fn json_defaults_are_read() {
    let dir = config_dir(&[(
        "default.json",
        r#"{"database": {"backend": "rocksdb", "rocksdb": {"path": "/var/lib/apimigrate"}}}"#,
    )]);

    let settings = ConfigManager::load_from_sources(dir.path(), "development").unwrap();
    assert_eq!(settings.database.backend, DatabaseBackend::RocksDb);
    assert_eq!(settings.database.rocksdb.path, "/var/lib/apimigrate");
}

#[test]
fn invalid_files_are_rejected_on_load() {
    let dir = config_dir(&[("default.toml", "[llm]\ntemperature = 3.5\n")]);
    let err = ConfigManager::load(Some(dir.path().to_path_buf()), Some("test".into()))
        .unwrap_err();
    assert!(err.to_string().contains("temperature"));
}

#[test]
fn from_settings_validates() {
    let mut settings = Settings::default();
    settings.uploads.max_swagger_bytes = 0;
    assert!(ConfigManager::from_settings(settings).is_err());
}

#[tokio::test]
async fn writes_through_the_lock_are_visible_to_snapshots() {
    let manager = ConfigManager::from_settings(Settings::default()).unwrap();
    manager.settings().write().await.server.port = 8123;
    assert_eq!(manager.snapshot().await.server.port, 8123);
}

#[test]
fn secrets_never_serialize() {
    let mut settings = Settings::default();
    settings.secrets.openai_api_key = Some(SecretString::from("sk-live".to_string()));
    settings.secrets.credential_key = Some(SecretString::from("a2V5".to_string()));

    let rendered = serde_json::to_string(&settings).unwrap();
    assert!(!rendered.contains("sk-live"));
    assert!(!rendered.contains("a2V5"));
    assert_eq!(settings.credential_key().as_deref(), Some("a2V5"));
}
