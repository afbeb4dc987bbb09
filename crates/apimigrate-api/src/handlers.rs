use crate::{metrics, ApiError, ApiResult, AppState};
use apimigrate_bundle::{ProxySource, ProxyUpload};
use apimigrate_core::policy_catalog::{self, assess, map_policies};
use apimigrate_core::{AnalysisStatus, Complexity, DashboardStats, PolicyMapping, ProxyAnalysis};
use apimigrate_store::UpdateOutcome;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

pub(crate) const LIST_LIMIT: usize = 100;

#[derive(Serialize, ToSchema)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store_backend: String,
    pub ai_enabled: bool,
    pub active_migrations: usize,
}

/// Multipart body with a single `file` part.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[derive(Serialize, ToSchema)]
pub struct UploadProxyResponse {
    pub proxy_id: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// One row of the Edge/X policy comparison view.
#[derive(Serialize, ToSchema)]
pub struct PolicyComparison {
    #[serde(flatten)]
    pub mapping: PolicyMapping,
    /// Edge XML for the policy when the upload carried it
    pub edge_source: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct PolicyMappingUpdate {
    pub apigee_x_equivalent: Option<String>,
    pub complexity: Option<Complexity>,
    pub migration_notes: Option<String>,
    pub custom_code_required: Option<bool>,
}

/// Reads the `file` part of a multipart upload.
pub(crate) async fn read_upload(mut multipart: Multipart) -> ApiResult<(String, Bytes)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        return Ok((filename, data));
    }
    Err(ApiError::BadRequest("No file uploaded".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/",
    tag = "service",
    responses((status = 200, body = RootResponse))
)]
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Apigee Migration Tool API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "service",
    responses(
        (status = 200, body = HealthResponse),
        (status = 503, description = "Document store unreachable")
    )
)]
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state
        .collections
        .proxy_files
        .count()
        .await
        .map_err(|e| ApiError::ServiceUnavailable(format!("Document store unavailable: {}", e)))?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        store_backend: state.collections.backend_name().to_string(),
        ai_enabled: state.advisor.is_enabled(),
        active_migrations: state.runner.active_count(),
    }))
}

pub async fn metrics_handler() -> (StatusCode, String) {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metrics::REGISTRY.gather(), &mut buffer) {
        warn!("could not encode metrics: {}", e);
    };
    let res = match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            warn!("metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    };
    (StatusCode::OK, res)
}

/// Upload an Edge proxy definition (XML, JSON or ZIP bundle)
#[utoipa::path(
    post,
    path = "/api/upload-proxy",
    tag = "proxies",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = UploadProxyResponse),
        (status = 400, description = "Unsupported or malformed file"),
        (status = 413, description = "File too large")
    )
)]
pub async fn upload_proxy(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<UploadProxyResponse>> {
    let (filename, data) = read_upload(multipart).await?;
    let limits = state.upload_limits().await;

    let upload = ProxyUpload::parse(&filename, &data, &limits)?;
    let message = upload.success_message();
    let file_type = upload.file_type();
    let proxy_file = upload.into_proxy_file(filename);

    state.collections.proxy_files.insert(&proxy_file).await?;
    let label = file_type.to_string();
    metrics::PROXY_UPLOADS_TOTAL
        .with_label_values(&[label.as_str()])
        .inc();
    info!("Stored {} proxy {} ({})", file_type, proxy_file.filename, proxy_file.id);

    Ok(Json(UploadProxyResponse {
        proxy_id: proxy_file.id,
        message: message.to_string(),
    }))
}

/// Score an uploaded proxy and store the analysis
#[utoipa::path(
    post,
    path = "/api/analyze-proxy/{proxy_id}",
    tag = "analyses",
    params(("proxy_id" = String, Path, description = "Uploaded proxy id")),
    responses(
        (status = 200, body = ProxyAnalysis),
        (status = 404, description = "Proxy file not found")
    )
)]
pub async fn analyze_proxy(
    State(state): State<AppState>,
    Path(proxy_id): Path<String>,
) -> ApiResult<Json<ProxyAnalysis>> {
    let proxy_file = state
        .collections
        .proxy_files
        .get(&proxy_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Proxy file not found".to_string()))?;

    let source = ProxySource::from_proxy_file(&proxy_file)?;
    let breakdown = map_policies(&source.policies);
    let ai = state
        .advisor
        .analyze_proxy(&source.analysis_content, &source.policies)
        .await;
    let assessment = assess(
        breakdown.total_points,
        source.policies.len(),
        ai.complexity_score,
        ai.migration_effort.as_deref(),
    );

    let analysis = ProxyAnalysis {
        id: apimigrate_core::new_record_id(),
        proxy_id,
        proxy_name: source.info.name.clone(),
        complexity_score: assessment.complexity_score,
        complexity_level: assessment.complexity_level,
        policy_count: source.policies.len(),
        custom_policies: breakdown.custom_policies,
        policy_mappings: breakdown.mappings,
        dependencies: source.info.target_servers.clone(),
        migration_effort: assessment.migration_effort,
        ai_recommendations: ai.recommendations_text(),
        analyzed_at: Utc::now(),
        status: AnalysisStatus::Completed,
    };

    state.collections.analyses.insert(&analysis).await?;
    metrics::ANALYSES_TOTAL
        .with_label_values(&[analysis.complexity_level.as_str()])
        .inc();
    info!(
        "Analyzed proxy {}: score {:.1} ({})",
        analysis.proxy_name, analysis.complexity_score, analysis.complexity_level
    );

    Ok(Json(analysis))
}

#[utoipa::path(
    get,
    path = "/api/analyses",
    tag = "analyses",
    responses((status = 200, body = [ProxyAnalysis]))
)]
pub async fn list_analyses(State(state): State<AppState>) -> ApiResult<Json<Vec<ProxyAnalysis>>> {
    Ok(Json(state.collections.analyses.list_recent(LIST_LIMIT).await?))
}

async fn load_analysis(state: &AppState, id: &str) -> ApiResult<ProxyAnalysis> {
    state
        .collections
        .analyses
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Analysis not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/analysis/{id}",
    tag = "analyses",
    params(("id" = String, Path)),
    responses(
        (status = 200, body = ProxyAnalysis),
        (status = 404, description = "Analysis not found")
    )
)]
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProxyAnalysis>> {
    Ok(Json(load_analysis(&state, &id).await?))
}

/// Side-by-side Edge and Apigee X view of every policy in an analysis
#[utoipa::path(
    get,
    path = "/api/analysis/{id}/policies",
    tag = "analyses",
    params(("id" = String, Path)),
    responses(
        (status = 200, body = [PolicyComparison]),
        (status = 404, description = "Analysis not found")
    )
)]
pub async fn policy_comparison(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<PolicyComparison>>> {
    let analysis = load_analysis(&state, &id).await?;

    let source = match state.collections.proxy_files.get(&analysis.proxy_id).await? {
        Some(file) => match ProxySource::from_proxy_file(&file) {
            Ok(source) => Some(source),
            Err(e) => {
                warn!("Could not reopen proxy {}: {}", file.id, e);
                None
            }
        },
        None => None,
    };

    let rows = analysis
        .policy_mappings
        .into_iter()
        .map(|mapping| PolicyComparison {
            edge_source: source
                .as_ref()
                .and_then(|s| s.policy_source(&mapping.edge_policy)),
            mapping,
        })
        .collect();

    Ok(Json(rows))
}

/// Edit one policy mapping and rescore the analysis
#[utoipa::path(
    put,
    path = "/api/analysis/{id}/policies/{edge_policy}",
    tag = "analyses",
    params(("id" = String, Path), ("edge_policy" = String, Path)),
    request_body = PolicyMappingUpdate,
    responses(
        (status = 200, body = ProxyAnalysis),
        (status = 400, description = "Invalid mapping"),
        (status = 404, description = "Analysis or policy not found")
    )
)]
pub async fn update_policy_mapping(
    State(state): State<AppState>,
    Path((id, edge_policy)): Path<(String, String)>,
    Json(update): Json<PolicyMappingUpdate>,
) -> ApiResult<Json<ProxyAnalysis>> {
    if update
        .apigee_x_equivalent
        .as_deref()
        .is_some_and(|v| v.trim().is_empty())
    {
        return Err(ApiError::BadRequest(
            "apigee_x_equivalent cannot be empty".to_string(),
        ));
    }

    let policy = edge_policy.clone();
    let outcome = state
        .collections
        .analyses
        .update(&id, move |analysis| {
            let Some(mapping) = analysis
                .policy_mappings
                .iter_mut()
                .find(|m| m.edge_policy == policy)
            else {
                return false;
            };
            if let Some(target) = update.apigee_x_equivalent {
                mapping.apigee_x_equivalent = target.trim().to_string();
            }
            if let Some(complexity) = update.complexity {
                mapping.complexity = complexity;
            }
            if let Some(notes) = update.migration_notes {
                mapping.migration_notes = notes;
            }
            if let Some(custom) = update.custom_code_required {
                mapping.custom_code_required = custom;
            }
            policy_catalog::reassess(analysis);
            true
        })
        .await?;

    match outcome {
        UpdateOutcome::Updated(analysis) => {
            info!(
                "Mapping for {} edited; analysis {} rescored to {:.1}",
                edge_policy, analysis.id, analysis.complexity_score
            );
            Ok(Json(analysis))
        }
        UpdateOutcome::Unchanged(_) => Err(ApiError::NotFound(format!(
            "Policy '{}' not found in analysis",
            edge_policy
        ))),
        UpdateOutcome::Missing => {
            Err(ApiError::NotFound("Analysis not found".to_string()))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/dashboard-stats",
    tag = "analyses",
    responses((status = 200, body = DashboardStats))
)]
pub async fn dashboard_stats(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    let analyses = state.collections.analyses.list().await?;
    Ok(Json(DashboardStats::from_analyses(&analyses)))
}
