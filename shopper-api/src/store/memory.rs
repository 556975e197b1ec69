//! In-memory store for engine and router tests.
//!
//! A transaction holds the whole-store mutex until it ends and works on a
//! copy of the tables; commit swaps the copy in. Holding one lock for the
//! transaction is stricter than row locking, so every interleaving the
//! Postgres store allows is also serialized here.

use std::cmp::Ordering;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use shopper_shared::errors::{AppError, AppResult, ErrorCode};
use shopper_shared::types::auth::UserRole;
use shopper_shared::types::pagination::{PageRequest, SortOrder};

use crate::domain::status::{AssignmentStatus, MissionStatus, ReportStatus, UserStatus};
use crate::models::{
    Assignment, Mission, MissionChanges, NewMission, NewReport, NewUser, Report, ReportReview,
    User, UserChanges,
};
use crate::store::{
    DashboardStats, MissionColumn, MissionFilter, MissionStore, MissionTx, ReportFilter,
    ReportSort, UserFilter, UserSort,
};

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: Uuid,
    pub mission_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: Uuid,
    pub mission_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub users: Vec<User>,
    pub missions: Vec<Mission>,
    pub assignments: Vec<Assignment>,
    pub reports: Vec<Report>,
    pub messages: Vec<MessageRow>,
    pub notifications: Vec<NotificationRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_step: Mutex<Option<&'static str>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the named cascade step (`reports`, `assignments`, `messages`,
    /// `notifications`, `mission`) fail inside the next transactions.
    pub fn fail_on(&self, step: &'static str) {
        *lock(&self.fail_step) = Some(step);
    }

    pub fn clear_failure(&self) {
        *lock(&self.fail_step) = None;
    }

    pub fn seed_message(&self, mission_id: Uuid) {
        lock(&self.tables).messages.push(MessageRow { id: Uuid::now_v7(), mission_id });
    }

    pub fn seed_notification(&self, mission_id: Uuid) {
        lock(&self.tables).notifications.push(NotificationRow {
            id: Uuid::now_v7(),
            mission_id: Some(mission_id),
        });
    }

    /// Reads the committed tables directly.
    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&lock(&self.tables))
    }
}

impl MissionStore for MemoryStore {
    fn begin(&self) -> AppResult<Box<dyn MissionTx + '_>> {
        let guard = lock(&self.tables);
        let work = guard.clone();
        let fail_step = *lock(&self.fail_step);
        Ok(Box::new(MemoryTx { guard, work, fail_step }))
    }

    fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

pub struct MemoryTx<'a> {
    guard: MutexGuard<'a, Tables>,
    work: Tables,
    fail_step: Option<&'static str>,
}

impl MemoryTx<'_> {
    fn step(&self, name: &str) -> AppResult<()> {
        if self.fail_step == Some(name) {
            return Err(AppError::internal(format!("injected failure deleting {name}")));
        }
        Ok(())
    }

    fn user_mut(&mut self, id: Uuid) -> AppResult<&mut User> {
        self.work
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(AppError::Database(diesel::result::Error::NotFound))
    }

    fn mission_mut(&mut self, id: Uuid) -> AppResult<&mut Mission> {
        self.work
            .missions
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(AppError::Database(diesel::result::Error::NotFound))
    }

    fn report_mut(&mut self, id: Uuid) -> AppResult<&mut Report> {
        self.work
            .reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(AppError::Database(diesel::result::Error::NotFound))
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn paginate<T: Clone, K>(rows: Vec<T>, page: &PageRequest<K>) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let items = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
    (items, total)
}

impl MissionTx for MemoryTx<'_> {
    fn find_user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.work.users.iter().find(|u| u.id == id).cloned())
    }

    fn lock_user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        self.find_user(id)
    }

    fn find_user_by_email(&mut self, email: &str) -> AppResult<Option<User>> {
        Ok(self.work.users.iter().find(|u| u.email == email).cloned())
    }

    fn insert_user(&mut self, user: NewUser) -> AppResult<User> {
        if self.work.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::new(ErrorCode::EmailAlreadyExists, "email is already registered"));
        }
        let now = Utc::now();
        let row = User {
            id: user.id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            status: user.status,
            completed_missions: 0,
            created_at: now,
            updated_at: now,
        };
        self.work.users.push(row.clone());
        Ok(row)
    }

    fn update_user(&mut self, id: Uuid, changes: UserChanges) -> AppResult<User> {
        let user = self.user_mut(id)?;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(status) = changes.status {
            user.status = status;
        }
        if let Some(at) = changes.updated_at {
            user.updated_at = at;
        }
        Ok(user.clone())
    }

    fn increment_completed_missions(&mut self, id: Uuid) -> AppResult<User> {
        let user = self.user_mut(id)?;
        user.completed_missions += 1;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    fn list_users(
        &mut self,
        filter: &UserFilter,
        page: &PageRequest<UserSort>,
    ) -> AppResult<(Vec<User>, i64)> {
        let mut rows: Vec<User> = self
            .work
            .users
            .iter()
            .filter(|u| filter.role.map_or(true, |r| u.role == r.as_str()))
            .filter(|u| filter.status.map_or(true, |s| u.status == s.as_str()))
            .filter(|u| {
                filter
                    .search
                    .as_deref()
                    .map_or(true, |s| contains(&u.name, s) || contains(&u.email, s))
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ordering = match page.sort {
                UserSort::CreatedAt => a.created_at.cmp(&b.created_at),
                UserSort::Name => a.name.cmp(&b.name),
                UserSort::Email => a.email.cmp(&b.email),
                UserSort::CompletedMissions => a.completed_missions.cmp(&b.completed_missions),
            };
            directed(ordering, page.order).then(a.id.cmp(&b.id))
        });
        Ok(paginate(rows, page))
    }

    fn insert_mission(&mut self, mission: NewMission) -> AppResult<Mission> {
        let now = Utc::now();
        let row = Mission {
            id: mission.id,
            title: mission.title,
            description: mission.description,
            deadline: mission.deadline,
            reward: mission.reward,
            location: mission.location,
            category: mission.category,
            business_name: mission.business_name,
            status: mission.status,
            survey_questions: mission.survey_questions,
            created_by: mission.created_by,
            created_at: now,
            updated_at: now,
        };
        self.work.missions.push(row.clone());
        Ok(row)
    }

    fn find_mission(&mut self, id: Uuid) -> AppResult<Option<Mission>> {
        Ok(self.work.missions.iter().find(|m| m.id == id).cloned())
    }

    fn lock_mission(&mut self, id: Uuid) -> AppResult<Option<Mission>> {
        self.find_mission(id)
    }

    fn update_mission(&mut self, id: Uuid, changes: MissionChanges) -> AppResult<Mission> {
        let mission = self.mission_mut(id)?;
        if let Some(v) = changes.title {
            mission.title = v;
        }
        if let Some(v) = changes.description {
            mission.description = v;
        }
        if let Some(v) = changes.deadline {
            mission.deadline = v;
        }
        if let Some(v) = changes.reward {
            mission.reward = v;
        }
        if let Some(v) = changes.location {
            mission.location = v;
        }
        if let Some(v) = changes.category {
            mission.category = v;
        }
        if let Some(v) = changes.business_name {
            mission.business_name = v;
        }
        if let Some(v) = changes.status {
            mission.status = v;
        }
        if let Some(v) = changes.survey_questions {
            mission.survey_questions = v;
        }
        if let Some(v) = changes.updated_at {
            mission.updated_at = v;
        }
        Ok(mission.clone())
    }

    fn list_missions(
        &mut self,
        filter: &MissionFilter,
        page: &PageRequest<MissionColumn>,
    ) -> AppResult<(Vec<Mission>, i64)> {
        let mut rows: Vec<Mission> = self
            .work
            .missions
            .iter()
            .filter(|m| filter.status.map_or(true, |s| m.status == s.as_str()))
            .filter(|m| filter.category.as_deref().map_or(true, |c| m.category == c))
            .filter(|m| filter.location.as_deref().map_or(true, |l| contains(&m.location, l)))
            .filter(|m| {
                filter.search.as_deref().map_or(true, |s| {
                    contains(&m.title, s) || contains(&m.business_name, s) || contains(&m.location, s)
                })
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ordering = match page.sort {
                MissionColumn::CreatedAt => a.created_at.cmp(&b.created_at),
                MissionColumn::Deadline => a.deadline.cmp(&b.deadline),
                MissionColumn::Reward => a.reward.total_cmp(&b.reward),
                MissionColumn::Title => a.title.cmp(&b.title),
                MissionColumn::Status => a.status.cmp(&b.status),
            };
            directed(ordering, page.order).then(a.id.cmp(&b.id))
        });
        Ok(paginate(rows, page))
    }

    fn delete_mission(&mut self, id: Uuid) -> AppResult<()> {
        self.step("mission")?;
        self.work.missions.retain(|m| m.id != id);
        Ok(())
    }

    fn delete_messages_for(&mut self, mission_id: Uuid) -> AppResult<usize> {
        self.step("messages")?;
        let before = self.work.messages.len();
        self.work.messages.retain(|m| m.mission_id != mission_id);
        Ok(before - self.work.messages.len())
    }

    fn delete_notifications_for(&mut self, mission_id: Uuid) -> AppResult<usize> {
        self.step("notifications")?;
        let before = self.work.notifications.len();
        self.work.notifications.retain(|n| n.mission_id != Some(mission_id));
        Ok(before - self.work.notifications.len())
    }

    fn find_assignment(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<Option<Assignment>> {
        Ok(self
            .work
            .assignments
            .iter()
            .find(|a| a.mission_id == mission_id && a.user_id == user_id)
            .cloned())
    }

    fn upsert_assignment(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<Assignment> {
        let now = Utc::now();
        if let Some(existing) = self
            .work
            .assignments
            .iter_mut()
            .find(|a| a.mission_id == mission_id && a.user_id == user_id)
        {
            existing.status = AssignmentStatus::Assigned.as_str().to_string();
            existing.applied_at = now;
            existing.completed_at = None;
            return Ok(existing.clone());
        }

        let row = Assignment {
            id: Uuid::now_v7(),
            mission_id,
            user_id,
            status: AssignmentStatus::Assigned.as_str().to_string(),
            applied_at: now,
            completed_at: None,
        };
        self.work.assignments.push(row.clone());
        Ok(row)
    }

    fn complete_assignment(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let now = Utc::now();
        for a in self
            .work
            .assignments
            .iter_mut()
            .filter(|a| a.mission_id == mission_id && a.user_id == user_id)
        {
            a.status = AssignmentStatus::Completed.as_str().to_string();
            a.completed_at = Some(now);
        }
        Ok(())
    }

    fn assignments_for_mission(&mut self, mission_id: Uuid) -> AppResult<Vec<Assignment>> {
        Ok(self
            .work
            .assignments
            .iter()
            .filter(|a| a.mission_id == mission_id)
            .cloned()
            .collect())
    }

    fn missions_for_user(
        &mut self,
        user_id: Uuid,
        status: AssignmentStatus,
    ) -> AppResult<Vec<(Assignment, Mission)>> {
        let mut rows: Vec<(Assignment, Mission)> = self
            .work
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id && a.status == status.as_str())
            .filter_map(|a| {
                self.work
                    .missions
                    .iter()
                    .find(|m| m.id == a.mission_id)
                    .map(|m| (a.clone(), m.clone()))
            })
            .collect();
        rows.sort_by(|(_, a), (_, b)| a.deadline.cmp(&b.deadline));
        Ok(rows)
    }

    fn delete_assignments_for(&mut self, mission_id: Uuid) -> AppResult<usize> {
        self.step("assignments")?;
        let before = self.work.assignments.len();
        self.work.assignments.retain(|a| a.mission_id != mission_id);
        Ok(before - self.work.assignments.len())
    }

    fn find_report(&mut self, id: Uuid) -> AppResult<Option<Report>> {
        Ok(self.work.reports.iter().find(|r| r.id == id).cloned())
    }

    fn lock_report(&mut self, id: Uuid) -> AppResult<Option<Report>> {
        self.find_report(id)
    }

    fn find_report_for(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<Option<Report>> {
        Ok(self
            .work
            .reports
            .iter()
            .find(|r| r.mission_id == mission_id && r.user_id == user_id)
            .cloned())
    }

    fn lock_report_for(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<Option<Report>> {
        self.find_report_for(mission_id, user_id)
    }

    fn insert_report(&mut self, report: NewReport) -> AppResult<Report> {
        if self
            .work
            .reports
            .iter()
            .any(|r| r.mission_id == report.mission_id && r.user_id == report.user_id)
        {
            return Err(AppError::Database(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                Box::new("uq_reports_mission_user".to_string()),
            )));
        }
        let row = Report {
            id: report.id,
            mission_id: report.mission_id,
            user_id: report.user_id,
            answers: report.answers,
            status: report.status,
            submitted_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            refusal_reason: None,
        };
        self.work.reports.push(row.clone());
        Ok(row)
    }

    fn resubmit_report(&mut self, id: Uuid, answers: serde_json::Value) -> AppResult<Report> {
        let report = self.report_mut(id)?;
        report.answers = answers;
        report.submitted_at = Utc::now();
        Ok(report.clone())
    }

    fn review_report(&mut self, id: Uuid, review: ReportReview) -> AppResult<Report> {
        let report = self.report_mut(id)?;
        report.status = review.status.as_str().to_string();
        report.reviewed_by = Some(review.reviewed_by);
        report.reviewed_at = Some(Utc::now());
        report.refusal_reason = review.refusal_reason;
        Ok(report.clone())
    }

    fn reports_for_mission(&mut self, mission_id: Uuid) -> AppResult<Vec<Report>> {
        Ok(self
            .work
            .reports
            .iter()
            .filter(|r| r.mission_id == mission_id)
            .cloned()
            .collect())
    }

    fn reports_for_user(&mut self, user_id: Uuid) -> AppResult<Vec<Report>> {
        Ok(self
            .work
            .reports
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    fn list_reports(
        &mut self,
        filter: &ReportFilter,
        page: &PageRequest<ReportSort>,
    ) -> AppResult<(Vec<Report>, i64)> {
        let mut rows: Vec<Report> = self
            .work
            .reports
            .iter()
            .filter(|r| filter.status.map_or(true, |s| r.status == s.as_str()))
            .filter(|r| filter.mission_id.map_or(true, |id| r.mission_id == id))
            .filter(|r| filter.user_id.map_or(true, |id| r.user_id == id))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ordering = match page.sort {
                ReportSort::SubmittedAt => a.submitted_at.cmp(&b.submitted_at),
                ReportSort::Status => a.status.cmp(&b.status),
            };
            directed(ordering, page.order).then(a.id.cmp(&b.id))
        });
        Ok(paginate(rows, page))
    }

    fn delete_reports_for(&mut self, mission_id: Uuid) -> AppResult<usize> {
        self.step("reports")?;
        let before = self.work.reports.len();
        self.work.reports.retain(|r| r.mission_id != mission_id);
        Ok(before - self.work.reports.len())
    }

    fn dashboard_stats(&mut self) -> AppResult<DashboardStats> {
        let tables = &self.work;
        let count_reports = |status: ReportStatus| {
            tables.reports.iter().filter(|r| r.status == status.as_str()).count() as i64
        };

        let total_payouts = tables
            .reports
            .iter()
            .filter(|r| r.status == ReportStatus::Approved.as_str())
            .filter_map(|r| tables.missions.iter().find(|m| m.id == r.mission_id))
            .map(|m| m.reward)
            .sum();

        let counts = MissionStatus::ALL.iter().map(|s| {
            let n = tables.missions.iter().filter(|m| m.status == s.as_str()).count() as i64;
            (s.as_str().to_string(), n)
        });

        Ok(DashboardStats {
            pending_reports: count_reports(ReportStatus::Submitted),
            approved_reports: count_reports(ReportStatus::Approved),
            active_shoppers: tables
                .users
                .iter()
                .filter(|u| u.role == UserRole::Shopper.as_str())
                .filter(|u| u.status == UserStatus::Active.as_str())
                .count() as i64,
            total_payouts,
            ..Default::default()
        }
        .with_status_counts(counts))
    }

    fn commit(mut self: Box<Self>) -> AppResult<()> {
        let work = std::mem::take(&mut self.work);
        *self.guard = work;
        Ok(())
    }
}
