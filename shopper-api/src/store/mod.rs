//! Storage boundary for the lifecycle engine.
//!
//! A [`MissionStore`] hands out [`MissionTx`] handles; every read and write of
//! one engine operation goes through a single handle and lands atomically on
//! [`MissionTx::commit`]. Dropping a handle without committing rolls back.
//! The `lock_*` reads take a row lock held until the handle ends; callers lock
//! mission, then report, then user so concurrent reviews cannot deadlock.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use shopper_shared::errors::AppResult;
use shopper_shared::types::auth::UserRole;
use shopper_shared::types::pagination::{PageRequest, SortKey, SortOrder};

use crate::domain::status::{AssignmentStatus, MissionStatus, ReportStatus, UserStatus};
use crate::models::{
    Assignment, Mission, MissionChanges, NewMission, NewReport, NewUser, Report, ReportReview,
    User, UserChanges,
};

#[cfg(test)]
pub mod memory;
pub mod pg;

pub use pg::PgStore;

pub trait MissionStore: Send + Sync {
    fn begin(&self) -> AppResult<Box<dyn MissionTx + '_>>;

    /// Cheap connectivity probe for the health check.
    fn ping(&self) -> AppResult<()>;
}

pub trait MissionTx {
    // users
    fn find_user(&mut self, id: Uuid) -> AppResult<Option<User>>;
    fn lock_user(&mut self, id: Uuid) -> AppResult<Option<User>>;
    fn find_user_by_email(&mut self, email: &str) -> AppResult<Option<User>>;
    fn insert_user(&mut self, user: NewUser) -> AppResult<User>;
    fn update_user(&mut self, id: Uuid, changes: UserChanges) -> AppResult<User>;
    fn increment_completed_missions(&mut self, id: Uuid) -> AppResult<User>;
    fn list_users(
        &mut self,
        filter: &UserFilter,
        page: &PageRequest<UserSort>,
    ) -> AppResult<(Vec<User>, i64)>;

    // missions
    fn insert_mission(&mut self, mission: NewMission) -> AppResult<Mission>;
    fn find_mission(&mut self, id: Uuid) -> AppResult<Option<Mission>>;
    fn lock_mission(&mut self, id: Uuid) -> AppResult<Option<Mission>>;
    fn update_mission(&mut self, id: Uuid, changes: MissionChanges) -> AppResult<Mission>;
    fn list_missions(
        &mut self,
        filter: &MissionFilter,
        page: &PageRequest<MissionColumn>,
    ) -> AppResult<(Vec<Mission>, i64)>;
    fn delete_mission(&mut self, id: Uuid) -> AppResult<()>;
    fn delete_messages_for(&mut self, mission_id: Uuid) -> AppResult<usize>;
    fn delete_notifications_for(&mut self, mission_id: Uuid) -> AppResult<usize>;

    // assignments
    fn find_assignment(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<Option<Assignment>>;
    /// Inserts or re-activates the single assignment row for the pair.
    fn upsert_assignment(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<Assignment>;
    fn complete_assignment(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<()>;
    fn assignments_for_mission(&mut self, mission_id: Uuid) -> AppResult<Vec<Assignment>>;
    fn missions_for_user(
        &mut self,
        user_id: Uuid,
        status: AssignmentStatus,
    ) -> AppResult<Vec<(Assignment, Mission)>>;
    fn delete_assignments_for(&mut self, mission_id: Uuid) -> AppResult<usize>;

    // reports
    fn find_report(&mut self, id: Uuid) -> AppResult<Option<Report>>;
    fn lock_report(&mut self, id: Uuid) -> AppResult<Option<Report>>;
    fn find_report_for(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<Option<Report>>;
    fn lock_report_for(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<Option<Report>>;
    fn insert_report(&mut self, report: NewReport) -> AppResult<Report>;
    /// Overwrites answers and resets `submitted_at`.
    fn resubmit_report(&mut self, id: Uuid, answers: serde_json::Value) -> AppResult<Report>;
    fn review_report(&mut self, id: Uuid, review: ReportReview) -> AppResult<Report>;
    fn reports_for_mission(&mut self, mission_id: Uuid) -> AppResult<Vec<Report>>;
    fn reports_for_user(&mut self, user_id: Uuid) -> AppResult<Vec<Report>>;
    fn list_reports(
        &mut self,
        filter: &ReportFilter,
        page: &PageRequest<ReportSort>,
    ) -> AppResult<(Vec<Report>, i64)>;
    fn delete_reports_for(&mut self, mission_id: Uuid) -> AppResult<usize>;

    fn dashboard_stats(&mut self) -> AppResult<DashboardStats>;

    fn commit(self: Box<Self>) -> AppResult<()>;
}

// --- Filters ---

#[derive(Debug, Clone, Default)]
pub struct MissionFilter {
    pub status: Option<MissionStatus>,
    pub category: Option<String>,
    pub location: Option<String>,
    /// Case-insensitive substring of title, business name or location.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    /// Case-insensitive substring of name or email.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub mission_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

// --- Sort whitelists ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionColumn {
    CreatedAt,
    Deadline,
    Reward,
    Title,
    Status,
}

/// Admin mission listing: every column, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminMissionSort(pub MissionColumn);

impl SortKey for AdminMissionSort {
    const DEFAULT: Self = AdminMissionSort(MissionColumn::CreatedAt);
    const DEFAULT_ORDER: SortOrder = SortOrder::Desc;

    fn parse(column: &str) -> Option<Self> {
        let column = match column {
            "created_at" | "createdAt" => MissionColumn::CreatedAt,
            "deadline" => MissionColumn::Deadline,
            "reward" => MissionColumn::Reward,
            "title" => MissionColumn::Title,
            "status" => MissionColumn::Status,
            _ => return None,
        };
        Some(AdminMissionSort(column))
    }
}

/// Shopper listing of open missions: soonest deadline first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailableMissionSort(pub MissionColumn);

impl SortKey for AvailableMissionSort {
    const DEFAULT: Self = AvailableMissionSort(MissionColumn::Deadline);
    const DEFAULT_ORDER: SortOrder = SortOrder::Asc;

    fn parse(column: &str) -> Option<Self> {
        let column = match column {
            "deadline" => MissionColumn::Deadline,
            "reward" => MissionColumn::Reward,
            "created_at" | "createdAt" => MissionColumn::CreatedAt,
            _ => return None,
        };
        Some(AvailableMissionSort(column))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSort {
    CreatedAt,
    Name,
    Email,
    CompletedMissions,
}

impl SortKey for UserSort {
    const DEFAULT: Self = UserSort::CreatedAt;
    const DEFAULT_ORDER: SortOrder = SortOrder::Desc;

    fn parse(column: &str) -> Option<Self> {
        match column {
            "created_at" | "createdAt" => Some(UserSort::CreatedAt),
            "name" => Some(UserSort::Name),
            "email" => Some(UserSort::Email),
            "completed_missions" | "completedMissions" => Some(UserSort::CompletedMissions),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSort {
    SubmittedAt,
    Status,
}

impl SortKey for ReportSort {
    const DEFAULT: Self = ReportSort::SubmittedAt;
    const DEFAULT_ORDER: SortOrder = SortOrder::Desc;

    fn parse(column: &str) -> Option<Self> {
        match column {
            "submitted_at" | "submittedAt" => Some(ReportSort::SubmittedAt),
            "status" => Some(ReportSort::Status),
            _ => None,
        }
    }
}

// --- Aggregates ---

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub missions_by_status: BTreeMap<String, i64>,
    pub total_missions: i64,
    pub pending_reports: i64,
    pub approved_reports: i64,
    pub active_shoppers: i64,
    /// Sum of rewards over approved reports.
    pub total_payouts: f64,
}

impl DashboardStats {
    /// Every mission status appears in the map, zero when absent.
    pub fn with_status_counts(mut self, counts: impl IntoIterator<Item = (String, i64)>) -> Self {
        self.missions_by_status = MissionStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for (status, count) in counts {
            self.total_missions += count;
            *self.missions_by_status.entry(status).or_insert(0) += count;
        }
        self
    }
}
