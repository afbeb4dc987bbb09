use crate::handlers::{read_upload, UploadForm};
use crate::{ApiError, ApiResult, AppState};
use apimigrate_bundle::parse_spec;
use apimigrate_core::{ConversionStatus, SwaggerDoc};
use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadSwaggerResponse {
    pub spec_id: String,
    pub message: String,
    /// The uploaded document re-serialized as JSON text
    pub original_spec: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertSwaggerResponse {
    #[schema(value_type = Object)]
    pub converted_spec: Value,
    pub message: String,
}

/// Upload Swagger 2.0 / OpenAPI 3 documentation (JSON or YAML)
#[utoipa::path(
    post,
    path = "/api/upload-swagger",
    tag = "swagger",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = UploadSwaggerResponse),
        (status = 400, description = "Not a JSON/YAML OpenAPI document"),
        (status = 413, description = "File too large")
    )
)]
pub async fn upload_swagger(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<UploadSwaggerResponse>> {
    let (filename, data) = read_upload(multipart).await?;
    let limits = state.upload_limits().await;
    let parsed = parse_spec(&filename, &data, limits.max_swagger_bytes)?;

    let original_spec = serde_json::to_string(&parsed.document)
        .map_err(|e| ApiError::Internal(format!("Upload failed: {}", e)))?;

    let doc = SwaggerDoc {
        id: apimigrate_core::new_record_id(),
        filename,
        original_spec: parsed.document,
        spec_version: parsed.spec_version,
        uploaded_at: Utc::now(),
        migrated_spec: None,
        conversion_status: ConversionStatus::Pending,
        converted_at: None,
    };
    state.collections.swagger_docs.insert(&doc).await?;
    info!("Stored {} spec {} ({})", doc.spec_version, doc.filename, doc.id);

    Ok(Json(UploadSwaggerResponse {
        spec_id: doc.id,
        message: "Swagger documentation uploaded successfully".to_string(),
        original_spec,
    }))
}

/// Convert a stored document for Apigee X, with the model when available
#[utoipa::path(
    post,
    path = "/api/convert-swagger/{spec_id}",
    tag = "swagger",
    params(("spec_id" = String, Path)),
    responses(
        (status = 200, body = ConvertSwaggerResponse),
        (status = 404, description = "Swagger document not found")
    )
)]
pub async fn convert_swagger(
    State(state): State<AppState>,
    Path(spec_id): Path<String>,
) -> ApiResult<Json<ConvertSwaggerResponse>> {
    let doc = state
        .collections
        .swagger_docs
        .get(&spec_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Swagger document not found".to_string()))?;

    let converted = state.advisor.convert_swagger(&doc.original_spec).await;

    let stored = converted.clone();
    state
        .collections
        .swagger_docs
        .update(&spec_id, move |d| {
            d.migrated_spec = Some(stored);
            d.conversion_status = ConversionStatus::Completed;
            d.converted_at = Some(Utc::now());
            true
        })
        .await?;

    Ok(Json(ConvertSwaggerResponse {
        converted_spec: converted,
        message: "Swagger documentation converted to Apigee X format".to_string(),
    }))
}
