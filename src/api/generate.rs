//! Project generation endpoint
//!
//! POST /generate-project - one synchronous crew run, returned as a zip

use super::ApiError;
use crate::service::CrewService;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Request body for a generation run
#[derive(Debug, Deserialize)]
pub struct GenerateProjectRequest {
    /// Free-text requirement description
    pub requirements: String,
    /// Target module name; server default when omitted
    #[serde(default)]
    pub module_name: Option<String>,
    /// Target primary class name; server default when omitted
    #[serde(default)]
    pub class_name: Option<String>,
}

/// Run one crew execution and return the delivery archive.
///
/// Blank requirement text is rejected up front: an empty requirement has no
/// deterministic meaning for the crew, so it is a client error, not a run.
async fn generate_project(
    Extension(service): Extension<Arc<CrewService>>,
    Json(request): Json<GenerateProjectRequest>,
) -> Result<Response, ApiError> {
    if request.requirements.trim().is_empty() {
        return Err(ApiError::bad_request("requirements must not be empty"));
    }

    let inputs = service.inputs(
        request.requirements,
        request.module_name,
        request.class_name,
    );

    let archive = service
        .generate(inputs)
        .await
        .map_err(|e| ApiError::from_core(&e))?;

    info!(
        run_id = %archive.run_id,
        bytes = archive.bytes.len(),
        "Delivering archive"
    );

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", archive.file_name),
        ),
    ];
    Ok((headers, archive.bytes).into_response())
}

/// Create generation routes
pub fn generate_routes() -> Router {
    Router::new().route("/generate-project", post(generate_project))
}
