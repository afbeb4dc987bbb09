use crate::{handlers, migration_handlers, swagger_handlers};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Apigee Migration Tool API"),
    paths(
        handlers::root,
        handlers::health,
        handlers::upload_proxy,
        handlers::analyze_proxy,
        handlers::list_analyses,
        handlers::get_analysis,
        handlers::policy_comparison,
        handlers::update_policy_mapping,
        handlers::dashboard_stats,
        swagger_handlers::upload_swagger,
        swagger_handlers::convert_swagger,
        migration_handlers::save_credentials,
        migration_handlers::list_credentials,
        migration_handlers::delete_credentials,
        migration_handlers::create_plan,
        migration_handlers::list_plans,
        migration_handlers::get_plan,
        migration_handlers::update_plan_status,
        migration_handlers::start_migration,
        migration_handlers::list_migrations,
        migration_handlers::get_migration,
        migration_handlers::cancel_migration,
    ),
    components(
        schemas(
            handlers::RootResponse,
            handlers::HealthResponse,
            handlers::UploadForm,
            handlers::UploadProxyResponse,
            handlers::MessageResponse,
            handlers::PolicyComparison,
            handlers::PolicyMappingUpdate,
            swagger_handlers::UploadSwaggerResponse,
            swagger_handlers::ConvertSwaggerResponse,
            migration_handlers::SavedCredentialsResponse,
            migration_handlers::CreatePlanRequest,
            migration_handlers::PlanStatusUpdate,
        )
    ),
    tags(
        (name = "service", description = "Service metadata and health"),
        (name = "proxies", description = "Edge proxy uploads"),
        (name = "analyses", description = "Complexity analysis and policy mapping"),
        (name = "swagger", description = "Swagger/OpenAPI conversion"),
        (name = "credentials", description = "Apigee credentials"),
        (name = "plans", description = "Migration plans"),
        (name = "migrations", description = "Migration executions")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    axum::Json(ApiDoc::openapi())
}
