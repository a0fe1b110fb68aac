//! Liveness endpoints

use axum::http::StatusCode;

use crate::models::{ApiResponse, HealthStatus};

/// GET /api/v1/healthcheck
pub async fn healthcheck() -> ApiResponse<HealthStatus> {
    ApiResponse::new(
        StatusCode::OK,
        HealthStatus { status: "OK" },
        "Health check successful",
    )
}

/// GET /
pub async fn root() -> &'static str {
    "ProfileVault API Server"
}
