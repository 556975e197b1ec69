use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use shopper_shared::errors::AppResult;
use shopper_shared::middleware::{AppJson, AppPath, AppQuery};
use shopper_shared::types::api::ApiResponse;
use shopper_shared::types::auth::UserRole;
use shopper_shared::types::pagination::PaginationParams;

use crate::domain::answers::ReportAnswer;
use crate::routes::extract::{CurrentUser, ShopperUser};
use crate::routes::{non_blank, AppState};
use crate::services::views::{ApplyOutcome, MissionView, ReportView, ShopperMission, SubmitOutcome};
use crate::store::AvailableMissionSort;

#[derive(Debug, Default, Deserialize)]
pub struct AvailableQuery {
    pub category: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitReportRequest {
    #[serde(default)]
    pub answers: Vec<ReportAnswer>,
}

pub async fn list_available(
    State(state): State<Arc<AppState>>,
    ShopperUser(_): ShopperUser,
    AppQuery(params): AppQuery<PaginationParams>,
    AppQuery(query): AppQuery<AvailableQuery>,
) -> AppResult<Json<ApiResponse<Vec<MissionView>>>> {
    let page = params.resolve::<AvailableMissionSort>()?;
    let (missions, pagination) = state
        .missions
        .list_available(non_blank(query.category), non_blank(query.location), page)
        .await?;
    Ok(Json(ApiResponse::paginated(missions, pagination)))
}

pub async fn get_mission(
    State(state): State<Arc<AppState>>,
    ShopperUser(user): ShopperUser,
    AppPath(mission_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<MissionView>>> {
    let mission = state.missions.shopper_mission(user.id, mission_id).await?;
    Ok(Json(ApiResponse::ok(mission)))
}

pub async fn assigned(
    State(state): State<Arc<AppState>>,
    ShopperUser(user): ShopperUser,
) -> AppResult<Json<ApiResponse<Vec<ShopperMission>>>> {
    Ok(Json(ApiResponse::ok(state.missions.assigned_missions(user.id).await?)))
}

pub async fn completed(
    State(state): State<Arc<AppState>>,
    ShopperUser(user): ShopperUser,
) -> AppResult<Json<ApiResponse<Vec<ShopperMission>>>> {
    Ok(Json(ApiResponse::ok(state.missions.completed_missions(user.id).await?)))
}

pub async fn apply(
    State(state): State<Arc<AppState>>,
    ShopperUser(user): ShopperUser,
    AppPath(mission_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<ApplyOutcome>>> {
    let outcome = state.missions.apply(user.id, mission_id).await?;
    Ok(Json(ApiResponse::ok_with_message(outcome, "application accepted")))
}

/// 201 for the first report on a mission, 200 when a pending one is updated.
pub async fn submit_report(
    State(state): State<Arc<AppState>>,
    ShopperUser(user): ShopperUser,
    AppPath(mission_id): AppPath<Uuid>,
    AppJson(body): AppJson<SubmitReportRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<SubmitOutcome>>)> {
    let outcome = state.missions.submit_report(user.id, mission_id, body.answers).await?;
    let (status, message) = if outcome.created {
        (StatusCode::CREATED, "report submitted")
    } else {
        (StatusCode::OK, "report updated")
    };
    Ok((status, Json(ApiResponse::ok_with_message(outcome, message))))
}

pub async fn own_report(
    State(state): State<Arc<AppState>>,
    ShopperUser(user): ShopperUser,
    AppPath(mission_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<ReportView>>> {
    let report = state.missions.own_report_for_mission(user.id, mission_id).await?;
    Ok(Json(ApiResponse::ok(report)))
}

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppPath((mission_id, report_id)): AppPath<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<ReportView>>> {
    let is_admin = user.role()? == UserRole::Admin;
    let report = state
        .missions
        .report_in_mission(user.id, is_admin, mission_id, report_id)
        .await?;
    Ok(Json(ApiResponse::ok(report)))
}
