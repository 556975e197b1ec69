use chrono::{DateTime, Utc};
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::dsl::{count_star, sql, sum};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::BigInt;
use uuid::Uuid;

use shopper_shared::clients::db::{checkout, DbConn, DbPool};
use shopper_shared::errors::{AppError, AppResult, ErrorCode};
use shopper_shared::types::auth::UserRole;
use shopper_shared::types::pagination::{PageRequest, SortOrder};

use crate::domain::status::{AssignmentStatus, ReportStatus, UserStatus};
use crate::models::{
    Assignment, Mission, MissionChanges, NewAssignment, NewMission, NewReport, NewUser, Report,
    ReportReview, User, UserChanges,
};
use crate::schema::{assignments, messages, missions, notifications, reports, users};
use crate::store::{
    DashboardStats, MissionColumn, MissionFilter, MissionStore, MissionTx, ReportFilter,
    ReportSort, UserFilter, UserSort,
};

/// Postgres-backed store over an r2d2 pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl MissionStore for PgStore {
    fn begin(&self) -> AppResult<Box<dyn MissionTx + '_>> {
        let mut conn = checkout(&self.pool)?;
        AnsiTransactionManager::begin_transaction(&mut *conn)?;
        Ok(Box::new(PgTx { conn, open: true }))
    }

    fn ping(&self) -> AppResult<()> {
        let mut conn = checkout(&self.pool)?;
        diesel::sql_query("SELECT 1").execute(&mut *conn)?;
        Ok(())
    }
}

/// One pooled connection with an open transaction.
pub struct PgTx {
    conn: DbConn,
    open: bool,
}

impl Drop for PgTx {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Err(e) = AnsiTransactionManager::rollback_transaction(&mut *self.conn) {
            tracing::error!(error = %e, "failed to roll back transaction");
        }
    }
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn filtered_missions(filter: &MissionFilter) -> missions::BoxedQuery<'static, Pg> {
    let mut query = missions::table.into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(missions::status.eq(status.as_str()));
    }
    if let Some(category) = &filter.category {
        query = query.filter(missions::category.eq(category.clone()));
    }
    if let Some(location) = &filter.location {
        query = query.filter(missions::location.ilike(like_pattern(location)));
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        query = query.filter(
            missions::title
                .ilike(pattern.clone())
                .or(missions::business_name.ilike(pattern.clone()))
                .or(missions::location.ilike(pattern)),
        );
    }
    query
}

fn filtered_users(filter: &UserFilter) -> users::BoxedQuery<'static, Pg> {
    let mut query = users::table.into_boxed();
    if let Some(role) = filter.role {
        query = query.filter(users::role.eq(role.as_str()));
    }
    if let Some(status) = filter.status {
        query = query.filter(users::status.eq(status.as_str()));
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        query = query.filter(users::name.ilike(pattern.clone()).or(users::email.ilike(pattern)));
    }
    query
}

fn filtered_reports(filter: &ReportFilter) -> reports::BoxedQuery<'static, Pg> {
    let mut query = reports::table.into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(reports::status.eq(status.as_str()));
    }
    if let Some(mission_id) = filter.mission_id {
        query = query.filter(reports::mission_id.eq(mission_id));
    }
    if let Some(user_id) = filter.user_id {
        query = query.filter(reports::user_id.eq(user_id));
    }
    query
}

/// Splits `(row, COUNT(*) OVER())` pairs. A page past the end carries no
/// window total, so the count is taken separately.
fn split_page<T>(
    rows: Vec<(T, i64)>,
    offset: i64,
    count: impl FnOnce() -> QueryResult<i64>,
) -> AppResult<(Vec<T>, i64)> {
    let total = match rows.first() {
        Some((_, total)) => *total,
        None if offset > 0 => count()?,
        None => 0,
    };
    Ok((rows.into_iter().map(|(row, _)| row).collect(), total))
}

impl MissionTx for PgTx {
    // --- users ---

    fn find_user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        Ok(users::table
            .find(id)
            .select(User::as_select())
            .first(&mut *self.conn)
            .optional()?)
    }

    fn lock_user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        Ok(users::table
            .find(id)
            .select(User::as_select())
            .for_update()
            .first(&mut *self.conn)
            .optional()?)
    }

    fn find_user_by_email(&mut self, email: &str) -> AppResult<Option<User>> {
        Ok(users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(&mut *self.conn)
            .optional()?)
    }

    fn insert_user(&mut self, user: NewUser) -> AppResult<User> {
        diesel::insert_into(users::table)
            .values(&user)
            .returning(User::as_returning())
            .get_result(&mut *self.conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    AppError::new(ErrorCode::EmailAlreadyExists, "email is already registered")
                }
                other => other.into(),
            })
    }

    fn update_user(&mut self, id: Uuid, changes: UserChanges) -> AppResult<User> {
        Ok(diesel::update(users::table.find(id))
            .set(&changes)
            .returning(User::as_returning())
            .get_result(&mut *self.conn)?)
    }

    fn increment_completed_missions(&mut self, id: Uuid) -> AppResult<User> {
        Ok(diesel::update(users::table.find(id))
            .set((
                users::completed_missions.eq(users::completed_missions + 1),
                users::updated_at.eq(Utc::now()),
            ))
            .returning(User::as_returning())
            .get_result(&mut *self.conn)?)
    }

    fn list_users(
        &mut self,
        filter: &UserFilter,
        page: &PageRequest<UserSort>,
    ) -> AppResult<(Vec<User>, i64)> {
        let query = filtered_users(filter);
        let query = match (page.sort, page.order) {
            (UserSort::CreatedAt, SortOrder::Asc) => query.order(users::created_at.asc()),
            (UserSort::CreatedAt, SortOrder::Desc) => query.order(users::created_at.desc()),
            (UserSort::Name, SortOrder::Asc) => query.order(users::name.asc()),
            (UserSort::Name, SortOrder::Desc) => query.order(users::name.desc()),
            (UserSort::Email, SortOrder::Asc) => query.order(users::email.asc()),
            (UserSort::Email, SortOrder::Desc) => query.order(users::email.desc()),
            (UserSort::CompletedMissions, SortOrder::Asc) => {
                query.order(users::completed_missions.asc())
            }
            (UserSort::CompletedMissions, SortOrder::Desc) => {
                query.order(users::completed_missions.desc())
            }
        };

        let rows: Vec<(User, i64)> = query
            .then_order_by(users::id.asc())
            .select((User::as_select(), sql::<BigInt>("COUNT(*) OVER()")))
            .offset(page.offset())
            .limit(page.limit)
            .load(&mut *self.conn)?;

        let conn = &mut *self.conn;
        split_page(rows, page.offset(), || filtered_users(filter).count().get_result(conn))
    }

    // --- missions ---

    fn insert_mission(&mut self, mission: NewMission) -> AppResult<Mission> {
        Ok(diesel::insert_into(missions::table)
            .values(&mission)
            .returning(Mission::as_returning())
            .get_result(&mut *self.conn)?)
    }

    fn find_mission(&mut self, id: Uuid) -> AppResult<Option<Mission>> {
        Ok(missions::table
            .find(id)
            .select(Mission::as_select())
            .first(&mut *self.conn)
            .optional()?)
    }

    fn lock_mission(&mut self, id: Uuid) -> AppResult<Option<Mission>> {
        Ok(missions::table
            .find(id)
            .select(Mission::as_select())
            .for_update()
            .first(&mut *self.conn)
            .optional()?)
    }

    fn update_mission(&mut self, id: Uuid, changes: MissionChanges) -> AppResult<Mission> {
        Ok(diesel::update(missions::table.find(id))
            .set(&changes)
            .returning(Mission::as_returning())
            .get_result(&mut *self.conn)?)
    }

    fn list_missions(
        &mut self,
        filter: &MissionFilter,
        page: &PageRequest<MissionColumn>,
    ) -> AppResult<(Vec<Mission>, i64)> {
        use MissionColumn as C;

        let query = filtered_missions(filter);
        let query = match (page.sort, page.order) {
            (C::CreatedAt, SortOrder::Asc) => query.order(missions::created_at.asc()),
            (C::CreatedAt, SortOrder::Desc) => query.order(missions::created_at.desc()),
            (C::Deadline, SortOrder::Asc) => query.order(missions::deadline.asc()),
            (C::Deadline, SortOrder::Desc) => query.order(missions::deadline.desc()),
            (C::Reward, SortOrder::Asc) => query.order(missions::reward.asc()),
            (C::Reward, SortOrder::Desc) => query.order(missions::reward.desc()),
            (C::Title, SortOrder::Asc) => query.order(missions::title.asc()),
            (C::Title, SortOrder::Desc) => query.order(missions::title.desc()),
            (C::Status, SortOrder::Asc) => query.order(missions::status.asc()),
            (C::Status, SortOrder::Desc) => query.order(missions::status.desc()),
        };

        let rows: Vec<(Mission, i64)> = query
            .then_order_by(missions::id.asc())
            .select((Mission::as_select(), sql::<BigInt>("COUNT(*) OVER()")))
            .offset(page.offset())
            .limit(page.limit)
            .load(&mut *self.conn)?;

        let conn = &mut *self.conn;
        split_page(rows, page.offset(), || filtered_missions(filter).count().get_result(conn))
    }

    fn delete_mission(&mut self, id: Uuid) -> AppResult<()> {
        diesel::delete(missions::table.find(id)).execute(&mut *self.conn)?;
        Ok(())
    }

    fn delete_messages_for(&mut self, mission_id: Uuid) -> AppResult<usize> {
        Ok(diesel::delete(messages::table.filter(messages::mission_id.eq(mission_id)))
            .execute(&mut *self.conn)?)
    }

    fn delete_notifications_for(&mut self, mission_id: Uuid) -> AppResult<usize> {
        Ok(
            diesel::delete(notifications::table.filter(notifications::mission_id.eq(mission_id)))
                .execute(&mut *self.conn)?,
        )
    }

    // --- assignments ---

    fn find_assignment(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<Option<Assignment>> {
        Ok(assignments::table
            .filter(assignments::mission_id.eq(mission_id))
            .filter(assignments::user_id.eq(user_id))
            .select(Assignment::as_select())
            .first(&mut *self.conn)
            .optional()?)
    }

    fn upsert_assignment(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<Assignment> {
        let row = NewAssignment {
            id: Uuid::now_v7(),
            mission_id,
            user_id,
            status: AssignmentStatus::Assigned.as_str().to_string(),
        };
        Ok(diesel::insert_into(assignments::table)
            .values(&row)
            .on_conflict((assignments::mission_id, assignments::user_id))
            .do_update()
            .set((
                assignments::status.eq(AssignmentStatus::Assigned.as_str()),
                assignments::applied_at.eq(Utc::now()),
                assignments::completed_at.eq(None::<DateTime<Utc>>),
            ))
            .returning(Assignment::as_returning())
            .get_result(&mut *self.conn)?)
    }

    fn complete_assignment(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<()> {
        diesel::update(
            assignments::table
                .filter(assignments::mission_id.eq(mission_id))
                .filter(assignments::user_id.eq(user_id)),
        )
        .set((
            assignments::status.eq(AssignmentStatus::Completed.as_str()),
            assignments::completed_at.eq(Some(Utc::now())),
        ))
        .execute(&mut *self.conn)?;
        Ok(())
    }

    fn assignments_for_mission(&mut self, mission_id: Uuid) -> AppResult<Vec<Assignment>> {
        Ok(assignments::table
            .filter(assignments::mission_id.eq(mission_id))
            .order(assignments::applied_at.asc())
            .select(Assignment::as_select())
            .load(&mut *self.conn)?)
    }

    fn missions_for_user(
        &mut self,
        user_id: Uuid,
        status: AssignmentStatus,
    ) -> AppResult<Vec<(Assignment, Mission)>> {
        Ok(assignments::table
            .inner_join(missions::table)
            .filter(assignments::user_id.eq(user_id))
            .filter(assignments::status.eq(status.as_str()))
            .order(missions::deadline.asc())
            .select((Assignment::as_select(), Mission::as_select()))
            .load(&mut *self.conn)?)
    }

    fn delete_assignments_for(&mut self, mission_id: Uuid) -> AppResult<usize> {
        Ok(diesel::delete(assignments::table.filter(assignments::mission_id.eq(mission_id)))
            .execute(&mut *self.conn)?)
    }

    // --- reports ---

    fn find_report(&mut self, id: Uuid) -> AppResult<Option<Report>> {
        Ok(reports::table
            .find(id)
            .select(Report::as_select())
            .first(&mut *self.conn)
            .optional()?)
    }

    fn lock_report(&mut self, id: Uuid) -> AppResult<Option<Report>> {
        Ok(reports::table
            .find(id)
            .select(Report::as_select())
            .for_update()
            .first(&mut *self.conn)
            .optional()?)
    }

    fn find_report_for(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<Option<Report>> {
        Ok(reports::table
            .filter(reports::mission_id.eq(mission_id))
            .filter(reports::user_id.eq(user_id))
            .select(Report::as_select())
            .first(&mut *self.conn)
            .optional()?)
    }

    fn lock_report_for(&mut self, mission_id: Uuid, user_id: Uuid) -> AppResult<Option<Report>> {
        Ok(reports::table
            .filter(reports::mission_id.eq(mission_id))
            .filter(reports::user_id.eq(user_id))
            .select(Report::as_select())
            .for_update()
            .first(&mut *self.conn)
            .optional()?)
    }

    fn insert_report(&mut self, report: NewReport) -> AppResult<Report> {
        Ok(diesel::insert_into(reports::table)
            .values(&report)
            .returning(Report::as_returning())
            .get_result(&mut *self.conn)?)
    }

    fn resubmit_report(&mut self, id: Uuid, answers: serde_json::Value) -> AppResult<Report> {
        Ok(diesel::update(reports::table.find(id))
            .set((reports::answers.eq(answers), reports::submitted_at.eq(Utc::now())))
            .returning(Report::as_returning())
            .get_result(&mut *self.conn)?)
    }

    fn review_report(&mut self, id: Uuid, review: ReportReview) -> AppResult<Report> {
        Ok(diesel::update(reports::table.find(id))
            .set((
                reports::status.eq(review.status.as_str()),
                reports::reviewed_by.eq(Some(review.reviewed_by)),
                reports::reviewed_at.eq(Some(Utc::now())),
                reports::refusal_reason.eq(review.refusal_reason),
            ))
            .returning(Report::as_returning())
            .get_result(&mut *self.conn)?)
    }

    fn reports_for_mission(&mut self, mission_id: Uuid) -> AppResult<Vec<Report>> {
        Ok(reports::table
            .filter(reports::mission_id.eq(mission_id))
            .order(reports::submitted_at.asc())
            .select(Report::as_select())
            .load(&mut *self.conn)?)
    }

    fn reports_for_user(&mut self, user_id: Uuid) -> AppResult<Vec<Report>> {
        Ok(reports::table
            .filter(reports::user_id.eq(user_id))
            .order(reports::submitted_at.desc())
            .select(Report::as_select())
            .load(&mut *self.conn)?)
    }

    fn list_reports(
        &mut self,
        filter: &ReportFilter,
        page: &PageRequest<ReportSort>,
    ) -> AppResult<(Vec<Report>, i64)> {
        let query = filtered_reports(filter);
        let query = match (page.sort, page.order) {
            (ReportSort::SubmittedAt, SortOrder::Asc) => query.order(reports::submitted_at.asc()),
            (ReportSort::SubmittedAt, SortOrder::Desc) => query.order(reports::submitted_at.desc()),
            (ReportSort::Status, SortOrder::Asc) => query.order(reports::status.asc()),
            (ReportSort::Status, SortOrder::Desc) => query.order(reports::status.desc()),
        };

        let rows: Vec<(Report, i64)> = query
            .then_order_by(reports::id.asc())
            .select((Report::as_select(), sql::<BigInt>("COUNT(*) OVER()")))
            .offset(page.offset())
            .limit(page.limit)
            .load(&mut *self.conn)?;

        let conn = &mut *self.conn;
        split_page(rows, page.offset(), || filtered_reports(filter).count().get_result(conn))
    }

    fn delete_reports_for(&mut self, mission_id: Uuid) -> AppResult<usize> {
        Ok(diesel::delete(reports::table.filter(reports::mission_id.eq(mission_id)))
            .execute(&mut *self.conn)?)
    }

    fn dashboard_stats(&mut self) -> AppResult<DashboardStats> {
        let conn = &mut *self.conn;

        let by_status: Vec<(String, i64)> = missions::table
            .group_by(missions::status)
            .select((missions::status, count_star()))
            .load(conn)?;

        let pending_reports: i64 = reports::table
            .filter(reports::status.eq(ReportStatus::Submitted.as_str()))
            .count()
            .get_result(conn)?;

        let approved_reports: i64 = reports::table
            .filter(reports::status.eq(ReportStatus::Approved.as_str()))
            .count()
            .get_result(conn)?;

        let active_shoppers: i64 = users::table
            .filter(users::role.eq(UserRole::Shopper.as_str()))
            .filter(users::status.eq(UserStatus::Active.as_str()))
            .count()
            .get_result(conn)?;

        let total_payouts: Option<f64> = reports::table
            .inner_join(missions::table)
            .filter(reports::status.eq(ReportStatus::Approved.as_str()))
            .select(sum(missions::reward))
            .first(conn)?;

        Ok(DashboardStats {
            pending_reports,
            approved_reports,
            active_shoppers,
            total_payouts: total_payouts.unwrap_or(0.0),
            ..Default::default()
        }
        .with_status_counts(by_status))
    }

    fn commit(mut self: Box<Self>) -> AppResult<()> {
        AnsiTransactionManager::commit_transaction(&mut *self.conn)?;
        self.open = false;
        Ok(())
    }
}
