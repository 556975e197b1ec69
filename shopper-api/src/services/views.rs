use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use shopper_shared::errors::AppResult;
use shopper_shared::types::auth::UserRole;

use crate::domain::answers::{decode_answers, ReportAnswer};
use crate::domain::status::{AssignmentStatus, MissionStatus, ReportStatus, UserStatus};
use crate::domain::survey::{decode_questions, SurveyQuestion};
use crate::models::{Assignment, Mission, Report, User};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub completed_missions: i32,
    pub created_at: DateTime<Utc>,
}

impl UserView {
    pub fn from_row(user: User) -> AppResult<Self> {
        Ok(Self {
            role: user.role()?,
            status: user.status()?,
            id: user.id,
            name: user.name,
            email: user.email,
            completed_missions: user.completed_missions,
            created_at: user.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub reward: f64,
    pub location: String,
    pub category: String,
    pub business_name: String,
    pub status: MissionStatus,
    pub survey_questions: Vec<SurveyQuestion>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MissionView {
    pub fn from_row(mission: Mission) -> AppResult<Self> {
        Ok(Self {
            status: mission.status()?,
            survey_questions: decode_questions(&mission.survey_questions),
            id: mission.id,
            title: mission.title,
            description: mission.description,
            deadline: mission.deadline,
            reward: mission.reward,
            location: mission.location,
            category: mission.category,
            business_name: mission.business_name,
            created_by: mission.created_by,
            created_at: mission.created_at,
            updated_at: mission.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssigneeView {
    pub user_id: Uuid,
    pub status: AssignmentStatus,
    pub applied_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AssigneeView {
    pub fn from_row(assignment: &Assignment) -> AppResult<Self> {
        Ok(Self {
            user_id: assignment.user_id,
            status: assignment.status()?,
            applied_at: assignment.applied_at,
            completed_at: assignment.completed_at,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: ReportStatus,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Admin view of one mission with its assignees and reports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionDetail {
    #[serde(flatten)]
    pub mission: MissionView,
    pub assignees: Vec<AssigneeView>,
    pub reports: Vec<ReportSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub user_id: Uuid,
    pub answers: Vec<ReportAnswer>,
    pub status: ReportStatus,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub refusal_reason: Option<String>,
}

impl ReportView {
    pub fn from_row(report: Report) -> AppResult<Self> {
        Ok(Self {
            status: report.status()?,
            answers: decode_answers(&report.answers),
            id: report.id,
            mission_id: report.mission_id,
            user_id: report.user_id,
            submitted_at: report.submitted_at,
            reviewed_at: report.reviewed_at,
            reviewed_by: report.reviewed_by,
            refusal_reason: report.refusal_reason,
        })
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            id: self.id,
            user_id: self.user_id,
            status: self.status,
            submitted_at: self.submitted_at,
            reviewed_at: self.reviewed_at,
        }
    }
}

/// A mission as seen from one shopper's queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopperMission {
    #[serde(flatten)]
    pub mission: MissionView,
    pub assignment_status: AssignmentStatus,
    pub applied_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub report_id: Option<Uuid>,
    pub report_status: Option<ReportStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub report: ReportView,
    pub mission_status: MissionStatus,
    /// `false` when an earlier pending report was overwritten.
    pub created: bool,
}

/// Simulated payout for an approved report. No money moves.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedPayment {
    pub user_id: Uuid,
    pub mission_id: Uuid,
    pub report_id: Uuid,
    pub amount: f64,
    pub simulated: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub report: ReportView,
    pub mission_status: MissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<SimulatedPayment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignFailure {
    pub user_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAssignResult {
    pub assigned: Vec<Uuid>,
    pub already_assigned: Vec<Uuid>,
    pub failed: Vec<AssignFailure>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub mission_id: Uuid,
    pub mission_status: MissionStatus,
    pub assignment: AssigneeView,
}
