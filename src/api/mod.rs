//! HTTP API
//!
//! - `GET /health` — liveness probe
//! - `POST /generate-project` — one crew run, returned as a zip download

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub mod generate;
pub mod health;

pub use generate::generate_routes;
pub use health::health_routes;

/// Error payload returned to HTTP clients
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    category: &'static str,
    message: String,
}

impl ApiError {
    /// A client-side input error (400)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            category: "input",
            message: message.into(),
        }
    }

    /// Map a core error onto an HTTP status.
    ///
    /// Run-level failures (the agents could not deliver) map to 502; local
    /// failures (configuration, workspace, packaging) map to 500.
    pub fn from_core(error: &forge_core::Error) -> Self {
        use forge_core::Error;
        let (status, category) = match error {
            Error::Planning(_) => (StatusCode::BAD_GATEWAY, "planning"),
            Error::Execution(_) => (StatusCode::BAD_GATEWAY, "execution"),
            Error::Llm(_) => (StatusCode::BAD_GATEWAY, "llm"),
            Error::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
            Error::Workspace(_) => (StatusCode::INTERNAL_SERVER_ERROR, "workspace"),
            Error::Packaging(_) => (StatusCode::INTERNAL_SERVER_ERROR, "packaging"),
        };
        Self {
            status,
            category,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "category": self.category,
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}
