use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use shopper_shared::errors::{AppError, AppResult};
use shopper_shared::types::auth::UserRole;

use crate::domain::status::{AssignmentStatus, MissionStatus, ReportStatus, UserStatus};
use crate::schema::{assignments, missions, reports, users};

fn parse_column<T>(raw: &str) -> AppResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse().map_err(AppError::internal)
}

// --- User ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub completed_missions: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> AppResult<UserRole> {
        parse_column(&self.role)
    }

    pub fn status(&self) -> AppResult<UserStatus> {
        parse_column(&self.status)
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active.as_str()
    }

    pub fn is_shopper(&self) -> bool {
        self.role == UserRole::Shopper.as_str()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserChanges {
    pub name: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.role.is_none() && self.status.is_none()
    }
}

// --- Mission ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = missions)]
pub struct Mission {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub reward: f64,
    pub location: String,
    pub category: String,
    pub business_name: String,
    pub status: String,
    pub survey_questions: serde_json::Value,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mission {
    pub fn status(&self) -> AppResult<MissionStatus> {
        parse_column(&self.status)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = missions)]
pub struct NewMission {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub reward: f64,
    pub location: String,
    pub category: String,
    pub business_name: String,
    pub status: String,
    pub survey_questions: serde_json::Value,
    pub created_by: Uuid,
}

/// Partial mission edit. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = missions)]
pub struct MissionChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub reward: Option<f64>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub business_name: Option<String>,
    pub status: Option<String>,
    pub survey_questions: Option<serde_json::Value>,
    pub updated_at: Option<DateTime<Utc>>,
}

// --- Assignment ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = assignments)]
pub struct Assignment {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub applied_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn status(&self) -> AppResult<AssignmentStatus> {
        parse_column(&self.status)
    }

    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Assigned.as_str()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = assignments)]
pub struct NewAssignment {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub user_id: Uuid,
    pub status: String,
}

// --- Report ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = reports)]
pub struct Report {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub user_id: Uuid,
    pub answers: serde_json::Value,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub refusal_reason: Option<String>,
}

impl Report {
    pub fn status(&self) -> AppResult<ReportStatus> {
        parse_column(&self.status)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = reports)]
pub struct NewReport {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub user_id: Uuid,
    pub answers: serde_json::Value,
    pub status: String,
}

/// Verdict written onto a report by an admin.
#[derive(Debug, Clone)]
pub struct ReportReview {
    pub status: ReportStatus,
    pub reviewed_by: Uuid,
    pub refusal_reason: Option<String>,
}
