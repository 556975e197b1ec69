use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use shopper_shared::types::api::{HealthCheck, HealthResponse, HealthStatus};

use crate::routes::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.missions.ping().await {
        Ok(()) => HealthCheck {
            name: "database".into(),
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach the database");
            HealthCheck {
                name: "database".into(),
                status: HealthStatus::Unhealthy,
                message: Some("database unreachable".into()),
            }
        }
    };

    let response = HealthResponse::healthy("shopper-api", env!("CARGO_PKG_VERSION")).with_checks(vec![database]);
    let status = if response.status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(response))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render()
}
