use crate::{handlers, metrics, migration_handlers, openapi, swagger_handlers, AppState};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

fn api_routes() -> Router<AppState> {
    Router::new()
        // Proxies and analyses
        .route("/upload-proxy", post(handlers::upload_proxy))
        .route("/analyze-proxy/{proxy_id}", post(handlers::analyze_proxy))
        .route("/analyses", get(handlers::list_analyses))
        .route("/analysis/{id}", get(handlers::get_analysis))
        .route("/analysis/{id}/policies", get(handlers::policy_comparison))
        .route(
            "/analysis/{id}/policies/{edge_policy}",
            put(handlers::update_policy_mapping),
        )
        .route("/dashboard-stats", get(handlers::dashboard_stats))
        // Swagger
        .route("/upload-swagger", post(swagger_handlers::upload_swagger))
        .route(
            "/convert-swagger/{spec_id}",
            post(swagger_handlers::convert_swagger),
        )
        // Credentials
        .route(
            "/credentials",
            post(migration_handlers::save_credentials).get(migration_handlers::list_credentials),
        )
        .route(
            "/credentials/{id}",
            delete(migration_handlers::delete_credentials),
        )
        // Plans
        .route(
            "/migration-plans",
            post(migration_handlers::create_plan).get(migration_handlers::list_plans),
        )
        .route("/migration-plans/{id}", get(migration_handlers::get_plan))
        .route(
            "/migration-plans/{id}/status",
            put(migration_handlers::update_plan_status),
        )
        // Executions
        .route("/migrate", post(migration_handlers::start_migration))
        .route("/migrations", get(migration_handlers::list_migrations))
        .route(
            "/migration/{id}",
            get(migration_handlers::get_migration).delete(migration_handlers::cancel_migration),
        )
        .route("/openapi.json", get(openapi::openapi_json))
}

fn cors_layer(origins: &[String], allow_any: bool) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allow_any {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim()) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

pub fn create_router(state: AppState) -> Router {
    metrics::register_metrics();

    let cors = match state.config.settings().try_read() {
        Ok(settings) => cors_layer(&settings.cors.allowed_origins, settings.cors.allows_any()),
        Err(_) => cors_layer(&[], true),
    };
    let body_limit = state.body_limit;

    Router::new()
        .route("/api", get(handlers::root))
        .route("/api/", get(handlers::root))
        .nest("/api", api_routes())
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
