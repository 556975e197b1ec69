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

use crate::domain::mission::{MissionDraft, MissionPatch};
use crate::domain::status::{MissionStatus, ReportStatus, UserStatus};
use crate::domain::survey::SurveyQuestion;
use crate::routes::extract::AdminUser;
use crate::routes::{non_blank, AppState};
use crate::services::missions::DeletedMission;
use crate::services::users::UserEdit;
use crate::services::views::{BulkAssignResult, MissionDetail, MissionView, ReportView, ReviewOutcome, UserView};
use crate::store::{AdminMissionSort, DashboardStats, MissionFilter, ReportFilter, ReportSort, UserFilter, UserSort};

// --- Query and body types ---

#[derive(Debug, Default, Deserialize)]
pub struct MissionQuery {
    pub status: Option<MissionStatus>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
    pub mission_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    #[serde(default)]
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SurveyRequest {
    #[serde(alias = "surveyQuestions")]
    pub questions: Vec<SurveyQuestion>,
}

#[derive(Debug, Deserialize)]
pub struct RefuseRequest {
    #[serde(default)]
    pub reason: String,
}

// --- Missions ---

pub async fn list_missions(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    AppQuery(params): AppQuery<PaginationParams>,
    AppQuery(query): AppQuery<MissionQuery>,
) -> AppResult<Json<ApiResponse<Vec<MissionView>>>> {
    let page = params.resolve::<AdminMissionSort>()?;
    let filter = MissionFilter {
        status: query.status,
        category: non_blank(query.category),
        location: None,
        search: non_blank(query.search),
    };
    let (missions, pagination) = state.missions.list_missions(filter, page).await?;
    Ok(Json(ApiResponse::paginated(missions, pagination)))
}

pub async fn create_mission(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppJson(draft): AppJson<MissionDraft>,
) -> AppResult<(StatusCode, Json<ApiResponse<MissionView>>)> {
    let mission = state.missions.create_mission(admin.id, draft).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok_with_message(mission, "mission created"))))
}

pub async fn get_mission(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    AppPath(mission_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<MissionDetail>>> {
    Ok(Json(ApiResponse::ok(state.missions.mission_detail(mission_id).await?)))
}

pub async fn update_mission(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(mission_id): AppPath<Uuid>,
    AppJson(patch): AppJson<MissionPatch>,
) -> AppResult<Json<ApiResponse<MissionView>>> {
    let mission = state.missions.update_mission(admin.id, mission_id, patch).await?;
    Ok(Json(ApiResponse::ok_with_message(mission, "mission updated")))
}

pub async fn delete_mission(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(mission_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<DeletedMission>>> {
    let deleted = state.missions.delete_mission(admin.id, mission_id).await?;
    Ok(Json(ApiResponse::ok_with_message(deleted, "mission deleted")))
}

pub async fn assign(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(mission_id): AppPath<Uuid>,
    AppJson(body): AppJson<AssignRequest>,
) -> AppResult<Json<ApiResponse<BulkAssignResult>>> {
    let result = state.missions.bulk_assign(admin.id, mission_id, body.user_ids).await?;
    let message = format!("{} shopper(s) assigned", result.assigned.len());
    Ok(Json(ApiResponse::ok_with_message(result, message)))
}

pub async fn get_survey(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    AppPath(mission_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<SurveyQuestion>>>> {
    Ok(Json(ApiResponse::ok(state.missions.survey(mission_id).await?)))
}

pub async fn replace_survey(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(mission_id): AppPath<Uuid>,
    AppJson(body): AppJson<SurveyRequest>,
) -> AppResult<Json<ApiResponse<Vec<SurveyQuestion>>>> {
    let questions = state.missions.replace_survey(admin.id, mission_id, body.questions).await?;
    Ok(Json(ApiResponse::ok_with_message(questions, "survey saved")))
}

// --- Reports ---

pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    AppQuery(params): AppQuery<PaginationParams>,
    AppQuery(query): AppQuery<ReportQuery>,
) -> AppResult<Json<ApiResponse<Vec<ReportView>>>> {
    let page = params.resolve::<ReportSort>()?;
    let filter = ReportFilter {
        status: query.status,
        mission_id: query.mission_id,
        user_id: query.user_id,
    };
    let (reports, pagination) = state.missions.list_reports(filter, page).await?;
    Ok(Json(ApiResponse::paginated(reports, pagination)))
}

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    AppPath(report_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<ReportView>>> {
    Ok(Json(ApiResponse::ok(state.missions.report(report_id).await?)))
}

pub async fn approve_report(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(report_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<ReviewOutcome>>> {
    let outcome = state.missions.approve_report(admin.id, report_id).await?;
    Ok(Json(ApiResponse::ok_with_message(outcome, "report approved")))
}

pub async fn refuse_report(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(report_id): AppPath<Uuid>,
    AppJson(body): AppJson<RefuseRequest>,
) -> AppResult<Json<ApiResponse<ReviewOutcome>>> {
    let outcome = state.missions.refuse_report(admin.id, report_id, &body.reason).await?;
    Ok(Json(ApiResponse::ok_with_message(outcome, "report refused")))
}

// --- Users and stats ---

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    AppQuery(params): AppQuery<PaginationParams>,
    AppQuery(query): AppQuery<UserQuery>,
) -> AppResult<Json<ApiResponse<Vec<UserView>>>> {
    let page = params.resolve::<UserSort>()?;
    let filter = UserFilter {
        role: query.role,
        status: query.status,
        search: non_blank(query.search),
    };
    let (users, pagination) = state.missions.list_users(filter, page).await?;
    Ok(Json(ApiResponse::paginated(users, pagination)))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(user_id): AppPath<Uuid>,
    AppJson(edit): AppJson<UserEdit>,
) -> AppResult<Json<ApiResponse<UserView>>> {
    let user = state.missions.update_user(admin.id, user_id, edit).await?;
    Ok(Json(ApiResponse::ok_with_message(user, "user updated")))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<ApiResponse<DashboardStats>>> {
    Ok(Json(ApiResponse::ok(state.missions.dashboard_stats().await?)))
}
