//! Credentials, migration plans and migration executions.

use crate::handlers::{MessageResponse, LIST_LIMIT};
use crate::{metrics, ApiError, ApiResult, AppState};
use apimigrate_core::{
    new_record_id, ApigeeCredentials, CredentialSummary, MigrationExecution, MigrationPlan,
    MigrationRequest, PlanStatus, StoredCredentials,
};
use apimigrate_store::UpdateOutcome;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct SavedCredentialsResponse {
    pub id: String,
    pub message: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreatePlanRequest {
    pub proxy_analysis_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PlanStatusUpdate {
    pub status: PlanStatus,
}

/// `/api/migrate` only queues work against saved credentials.
pub const UNKNOWN_CREDENTIALS: &str =
    "Credentials not found; save Apigee credentials with POST /api/credentials before starting a migration";

fn require(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} is required", field)));
    }
    Ok(())
}

/// Store Apigee credentials; secrets are sealed at rest
#[utoipa::path(
    post,
    path = "/api/credentials",
    tag = "credentials",
    request_body = ApigeeCredentials,
    responses(
        (status = 200, body = SavedCredentialsResponse),
        (status = 400, description = "Missing field")
    )
)]
pub async fn save_credentials(
    State(state): State<AppState>,
    Json(credentials): Json<ApigeeCredentials>,
) -> ApiResult<Json<SavedCredentialsResponse>> {
    require("name", &credentials.name)?;
    require("apigee_x_project", &credentials.apigee_x_project)?;
    require("apigee_x_env", &credentials.apigee_x_env)?;

    let stored = StoredCredentials {
        id: new_record_id(),
        name: credentials.name,
        edge_org: credentials.edge_org,
        edge_env: credentials.edge_env,
        edge_username: credentials.edge_username,
        sealed_edge_password: state.sealer.seal(&credentials.edge_password)?,
        apigee_x_project: credentials.apigee_x_project,
        apigee_x_env: credentials.apigee_x_env,
        sealed_service_account: state.sealer.seal(&credentials.apigee_x_service_account)?,
        created_at: Utc::now(),
    };
    state.collections.credentials.insert(&stored).await?;
    info!("Saved credentials '{}' ({})", stored.name, stored.id);

    Ok(Json(SavedCredentialsResponse {
        id: stored.id,
        message: "Credentials saved successfully".to_string(),
    }))
}

/// Saved credentials without secrets
#[utoipa::path(
    get,
    path = "/api/credentials",
    tag = "credentials",
    responses((status = 200, body = [CredentialSummary]))
)]
pub async fn list_credentials(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CredentialSummary>>> {
    let stored = state.collections.credentials.list_recent(LIST_LIMIT).await?;
    Ok(Json(stored.iter().map(CredentialSummary::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/api/credentials/{id}",
    tag = "credentials",
    params(("id" = String, Path)),
    responses(
        (status = 200, body = MessageResponse),
        (status = 404, description = "Credentials not found")
    )
)]
pub async fn delete_credentials(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    if !state.collections.credentials.delete(&id).await? {
        return Err(ApiError::NotFound("Credentials not found".to_string()));
    }
    Ok(MessageResponse::new("Credentials deleted successfully"))
}

/// Draft a migration plan from an analysis
#[utoipa::path(
    post,
    path = "/api/migration-plans",
    tag = "plans",
    request_body = CreatePlanRequest,
    responses(
        (status = 200, body = MigrationPlan),
        (status = 404, description = "Analysis not found")
    )
)]
pub async fn create_plan(
    State(state): State<AppState>,
    Json(request): Json<CreatePlanRequest>,
) -> ApiResult<Json<MigrationPlan>> {
    let analysis = state
        .collections
        .analyses
        .get(&request.proxy_analysis_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Analysis not found".to_string()))?;

    let plan = MigrationPlan::draft(&analysis);
    state.collections.plans.insert(&plan).await?;
    Ok(Json(plan))
}

#[utoipa::path(
    get,
    path = "/api/migration-plans",
    tag = "plans",
    responses((status = 200, body = [MigrationPlan]))
)]
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<MigrationPlan>>> {
    Ok(Json(state.collections.plans.list_recent(LIST_LIMIT).await?))
}

#[utoipa::path(
    get,
    path = "/api/migration-plans/{id}",
    tag = "plans",
    params(("id" = String, Path)),
    responses(
        (status = 200, body = MigrationPlan),
        (status = 404, description = "Migration plan not found")
    )
)]
pub async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MigrationPlan>> {
    state
        .collections
        .plans
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Migration plan not found".to_string()))
}

#[utoipa::path(
    put,
    path = "/api/migration-plans/{id}/status",
    tag = "plans",
    params(("id" = String, Path)),
    request_body = PlanStatusUpdate,
    responses(
        (status = 200, body = MigrationPlan),
        (status = 400, description = "Transition not allowed"),
        (status = 404, description = "Migration plan not found")
    )
)]
pub async fn update_plan_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<PlanStatusUpdate>,
) -> ApiResult<Json<MigrationPlan>> {
    let next = update.status;
    let outcome = state
        .collections
        .plans
        .update(&id, move |plan| {
            if !plan.status.can_transition_to(next) {
                return false;
            }
            plan.status = next;
            plan.updated_at = Utc::now();
            true
        })
        .await?;

    match outcome {
        UpdateOutcome::Updated(plan) => Ok(Json(plan)),
        UpdateOutcome::Unchanged(plan) => Err(ApiError::BadRequest(format!(
            "Cannot move plan from {:?} to {:?}",
            plan.status, next
        ))),
        UpdateOutcome::Missing => Err(ApiError::NotFound("Migration plan not found".to_string())),
    }
}

/// Queue one execution per known analysis and start them in the background.
/// Unknown analysis ids are skipped.
#[utoipa::path(
    post,
    path = "/api/migrate",
    tag = "migrations",
    request_body = MigrationRequest,
    responses(
        (status = 200, body = [MigrationExecution]),
        (status = 404, description = "Unknown credentials_id; nothing was queued")
    )
)]
pub async fn start_migration(
    State(state): State<AppState>,
    Json(request): Json<MigrationRequest>,
) -> ApiResult<Json<Vec<MigrationExecution>>> {
    if state
        .collections
        .credentials
        .get(&request.credentials_id)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound(UNKNOWN_CREDENTIALS.to_string()));
    }

    let mut executions = Vec::with_capacity(request.proxy_analysis_ids.len());
    for analysis_id in &request.proxy_analysis_ids {
        let Some(analysis) = state.collections.analyses.get(analysis_id).await? else {
            continue;
        };

        let execution = MigrationExecution::queued(analysis_id, &analysis.proxy_name, &request);
        state.collections.executions.insert(&execution).await?;

        metrics::migration_started();
        state.runner.spawn(execution.id.clone());
        info!("Queued migration {} for {}", execution.id, analysis.proxy_name);
        executions.push(execution);
    }

    Ok(Json(executions))
}

#[utoipa::path(
    get,
    path = "/api/migrations",
    tag = "migrations",
    responses((status = 200, body = [MigrationExecution]))
)]
pub async fn list_migrations(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<MigrationExecution>>> {
    Ok(Json(state.collections.executions.list_recent(LIST_LIMIT).await?))
}

/// Current state of one execution; clients poll this
#[utoipa::path(
    get,
    path = "/api/migration/{id}",
    tag = "migrations",
    params(("id" = String, Path)),
    responses(
        (status = 200, body = MigrationExecution),
        (status = 404, description = "Migration not found")
    )
)]
pub async fn get_migration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MigrationExecution>> {
    state
        .collections
        .executions
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Migration not found".to_string()))
}

#[utoipa::path(
    delete,
    path = "/api/migration/{id}",
    tag = "migrations",
    params(("id" = String, Path)),
    responses(
        (status = 200, body = MessageResponse),
        (status = 404, description = "Migration not found or cannot be cancelled")
    )
)]
pub async fn cancel_migration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    match state.runner.cancel(&id).await? {
        Some(_) => Ok(MessageResponse::new("Migration cancelled successfully")),
        None => Err(ApiError::NotFound(
            "Migration not found or cannot be cancelled".to_string(),
        )),
    }
}
