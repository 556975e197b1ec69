use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use shopper_shared::errors::AppResult;
use shopper_shared::middleware::AppJson;
use shopper_shared::types::api::ApiResponse;

use crate::routes::extract::CurrentUser;
use crate::routes::AppState;
use crate::services::token_service;
use crate::services::users::Registration;
use crate::services::views::{AuthSession, UserView};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<Registration>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthSession>>)> {
    let user = state.missions.register(body).await?;
    let session = token_service::issue_session(user, &state.config.jwt_secret, state.config.jwt_expires_in_secs)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(session, "registration successful")),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthSession>>> {
    let user = state.missions.login(&body.email, &body.password).await?;
    let session = token_service::issue_session(user, &state.config.jwt_secret, state.config.jwt_expires_in_secs)?;
    Ok(Json(ApiResponse::ok_with_message(session, "login successful")))
}

pub async fn me(CurrentUser(user): CurrentUser) -> AppResult<Json<ApiResponse<UserView>>> {
    Ok(Json(ApiResponse::ok(UserView::from_row(user)?)))
}
