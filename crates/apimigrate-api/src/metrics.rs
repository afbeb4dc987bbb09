use apimigrate_core::MigrationStatus;
use lazy_static::lazy_static;
use prometheus::{IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Once;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref PROXY_UPLOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("apimigrate_proxy_uploads_total", "Accepted proxy uploads by file type"),
        &["file_type"]
    )
    .unwrap();

    pub static ref ANALYSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("apimigrate_analyses_total", "Completed proxy analyses by complexity level"),
        &["level"]
    )
    .unwrap();

    pub static ref MIGRATIONS_FINISHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("apimigrate_migrations_finished_total", "Migrations that reached a terminal state"),
        &["outcome"]
    )
    .unwrap();

    pub static ref MIGRATIONS_STARTED_TOTAL: prometheus::IntCounter = prometheus::IntCounter::new(
        "apimigrate_migrations_started_total",
        "Migrations handed to the runner"
    )
    .unwrap();

    pub static ref ACTIVE_MIGRATIONS: IntGauge = IntGauge::new(
        "apimigrate_active_migrations",
        "Migrations currently running"
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

/// Idempotent; every router build calls it.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        REGISTRY.register(Box::new(PROXY_UPLOADS_TOTAL.clone())).unwrap();
        REGISTRY.register(Box::new(ANALYSES_TOTAL.clone())).unwrap();
        REGISTRY.register(Box::new(MIGRATIONS_FINISHED_TOTAL.clone())).unwrap();
        REGISTRY.register(Box::new(MIGRATIONS_STARTED_TOTAL.clone())).unwrap();
        REGISTRY.register(Box::new(ACTIVE_MIGRATIONS.clone())).unwrap();
    });
}

pub fn migration_started() {
    MIGRATIONS_STARTED_TOTAL.inc();
    ACTIVE_MIGRATIONS.inc();
}

pub fn migration_finished(status: MigrationStatus) {
    ACTIVE_MIGRATIONS.dec();
    MIGRATIONS_FINISHED_TOTAL
        .with_label_values(&[status.as_str()])
        .inc();
}
