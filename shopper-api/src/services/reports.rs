use chrono::Utc;
use uuid::Uuid;

use shopper_shared::errors::{AppError, AppResult, ErrorCode};
use shopper_shared::types::pagination::{PageRequest, Pagination};

use crate::domain::answers::{encode_answers, validate_answers, ReportAnswer};
use crate::domain::review::{ReviewTally, Verdict};
use crate::domain::status::{MissionEvent, MissionStatus, ReportEvent, ReportStatus};
use crate::domain::survey::decode_questions;
use crate::events::publisher;
use crate::models::{Mission, MissionChanges, NewReport, Report, ReportReview};
use crate::services::views::{ReportView, ReviewOutcome, SimulatedPayment, SubmitOutcome};
use crate::services::{mission_moved, mission_not_found, report_not_found, user_not_found, MissionService};
use crate::store::{MissionTx, ReportFilter, ReportSort};

pub const MAX_REFUSAL_REASON: usize = 1000;

fn review_tally(tx: &mut dyn MissionTx, mission_id: Uuid) -> AppResult<ReviewTally> {
    let assignees = tx.assignments_for_mission(mission_id)?.len() as i64;
    let mut tally = ReviewTally { assignees, ..Default::default() };
    for report in tx.reports_for_mission(mission_id)? {
        let status = report.status()?;
        if status.is_reviewed() {
            tally.reviewed += 1;
        }
        if status == ReportStatus::Approved {
            tally.approved += 1;
        }
    }
    Ok(tally)
}

fn set_mission_status(tx: &mut dyn MissionTx, mission_id: Uuid, status: MissionStatus) -> AppResult<()> {
    tx.update_mission(
        mission_id,
        MissionChanges {
            status: Some(status.as_str().to_string()),
            updated_at: Some(Utc::now()),
            ..Default::default()
        },
    )?;
    Ok(())
}

/// Row state shared by approve and refuse once every lock is held.
struct Reviewed {
    mission: Mission,
    report: Report,
    from: MissionStatus,
    to: MissionStatus,
}

impl MissionService {
    /// First submission inserts the report; while it is still `submitted` a
    /// later one overwrites its answers in place.
    pub async fn submit_report(
        &self,
        user_id: Uuid,
        mission_id: Uuid,
        answers: Vec<ReportAnswer>,
    ) -> AppResult<SubmitOutcome> {
        let (report, created, from, to) = self
            .in_tx(move |tx| {
                let mission = tx.lock_mission(mission_id)?.ok_or_else(mission_not_found)?;
                let existing = tx.lock_report_for(mission_id, user_id)?;

                if let Some(report) = &existing {
                    report
                        .status()?
                        .apply(ReportEvent::Resubmit)
                        .map_err(|_| {
                            AppError::new(
                                ErrorCode::ReportAlreadyReviewed,
                                "this report has already been reviewed and cannot be changed",
                            )
                        })?;
                }

                let active = tx
                    .find_assignment(mission_id, user_id)?
                    .is_some_and(|a| a.is_active());
                if !active {
                    return Err(AppError::new(
                        ErrorCode::NotAssigned,
                        "you are not assigned to this mission",
                    ));
                }

                let current = mission.status()?;
                let next = current
                    .apply(MissionEvent::ReportSubmitted)
                    .map_err(|e| e.into_app_error(ErrorCode::InvalidTransition))?;

                let survey = decode_questions(&mission.survey_questions);
                validate_answers(&answers, &survey).map_err(AppError::Validation)?;
                let document = encode_answers(&answers);

                let (report, created) = match existing {
                    Some(report) => (tx.resubmit_report(report.id, document)?, false),
                    None => {
                        let row = NewReport {
                            id: Uuid::now_v7(),
                            mission_id,
                            user_id,
                            answers: document,
                            status: ReportStatus::Submitted.as_str().to_string(),
                        };
                        (tx.insert_report(row)?, true)
                    }
                };

                if next != current {
                    set_mission_status(tx, mission_id, next)?;
                }
                Ok((report, created, current, next))
            })
            .await?;

        tracing::info!(
            report_id = %report.id,
            mission_id = %mission_id,
            user_id = %user_id,
            created,
            from = %from,
            to = %to,
            "report submitted"
        );
        mission_moved(from, to);
        publisher::publish_report_submitted(self.events(), report.id, mission_id, user_id, !created);

        Ok(SubmitOutcome {
            report: ReportView::from_row(report)?,
            mission_status: to,
            created,
        })
    }

    /// Approves a submitted report, credits the shopper and simulates payment.
    pub async fn approve_report(&self, admin_id: Uuid, report_id: Uuid) -> AppResult<ReviewOutcome> {
        let policy = self.policy();
        let reviewed = self
            .in_tx(move |tx| {
                let (mission, report) = lock_for_review(tx, report_id)?;
                report
                    .status()?
                    .apply(ReportEvent::Approve)
                    .map_err(|_| {
                        AppError::new(
                            ErrorCode::ReportNotSubmitted,
                            format!("cannot approve a report that is {}", report.status),
                        )
                    })?;
                tx.lock_user(report.user_id)?.ok_or_else(user_not_found)?;

                let report = tx.review_report(
                    report_id,
                    ReportReview {
                        status: ReportStatus::Approved,
                        reviewed_by: admin_id,
                        refusal_reason: None,
                    },
                )?;
                tx.increment_completed_missions(report.user_id)?;
                tx.complete_assignment(report.mission_id, report.user_id)?;

                let tally = review_tally(tx, mission.id)?;
                let (from, to) = close_out(tx, &mission, policy.mission_event(Verdict::Approved, &tally))?;
                Ok(Reviewed { mission, report, from, to })
            })
            .await?;

        let Reviewed { mission, report, from, to } = reviewed;
        let payment = SimulatedPayment {
            user_id: report.user_id,
            mission_id: mission.id,
            report_id: report.id,
            amount: mission.reward,
            simulated: true,
        };

        tracing::info!(
            report_id = %report.id,
            mission_id = %mission.id,
            user_id = %report.user_id,
            admin_id = %admin_id,
            from = %from,
            to = %to,
            amount = payment.amount,
            "report approved"
        );
        mission_moved(from, to);
        publisher::publish_report_approved(self.events(), report.id, mission.id, report.user_id, to);
        publisher::publish_payment_simulated(
            self.events(),
            report.id,
            mission.id,
            report.user_id,
            payment.amount,
        );

        Ok(ReviewOutcome {
            report: ReportView::from_row(report)?,
            mission_status: to,
            payment: Some(payment),
        })
    }

    pub async fn refuse_report(
        &self,
        admin_id: Uuid,
        report_id: Uuid,
        reason: &str,
    ) -> AppResult<ReviewOutcome> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(AppError::field("reason", "a refusal reason is required"));
        }
        if reason.chars().count() > MAX_REFUSAL_REASON {
            return Err(AppError::field(
                "reason",
                format!("reason must be at most {MAX_REFUSAL_REASON} characters"),
            ));
        }

        let policy = self.policy();
        let stored_reason = reason.clone();
        let reviewed = self
            .in_tx(move |tx| {
                let (mission, report) = lock_for_review(tx, report_id)?;
                report
                    .status()?
                    .apply(ReportEvent::Refuse)
                    .map_err(|_| {
                        AppError::new(
                            ErrorCode::ReportNotSubmitted,
                            format!("cannot refuse a report that is {}", report.status),
                        )
                    })?;
                tx.lock_user(report.user_id)?.ok_or_else(user_not_found)?;

                let report = tx.review_report(
                    report_id,
                    ReportReview {
                        status: ReportStatus::Refused,
                        reviewed_by: admin_id,
                        refusal_reason: Some(stored_reason),
                    },
                )?;
                tx.complete_assignment(report.mission_id, report.user_id)?;

                let tally = review_tally(tx, mission.id)?;
                let (from, to) = close_out(tx, &mission, policy.mission_event(Verdict::Refused, &tally))?;
                Ok(Reviewed { mission, report, from, to })
            })
            .await?;

        let Reviewed { mission, report, from, to } = reviewed;
        tracing::info!(
            report_id = %report.id,
            mission_id = %mission.id,
            user_id = %report.user_id,
            admin_id = %admin_id,
            from = %from,
            to = %to,
            "report refused"
        );
        mission_moved(from, to);
        publisher::publish_report_refused(
            self.events(),
            report.id,
            mission.id,
            report.user_id,
            reason,
            to,
        );

        Ok(ReviewOutcome {
            report: ReportView::from_row(report)?,
            mission_status: to,
            payment: None,
        })
    }

    /// The caller's own report on a mission.
    pub async fn own_report_for_mission(&self, user_id: Uuid, mission_id: Uuid) -> AppResult<ReportView> {
        let report = self
            .in_tx(move |tx| {
                tx.find_mission(mission_id)?.ok_or_else(mission_not_found)?;
                tx.find_report_for(mission_id, user_id)?.ok_or_else(report_not_found)
            })
            .await?;
        ReportView::from_row(report)
    }

    /// A report under `mission_id`; shoppers may only read their own.
    pub async fn report_in_mission(
        &self,
        caller_id: Uuid,
        is_admin: bool,
        mission_id: Uuid,
        report_id: Uuid,
    ) -> AppResult<ReportView> {
        let report = self
            .in_tx(move |tx| tx.find_report(report_id)?.ok_or_else(report_not_found))
            .await?;
        if report.mission_id != mission_id {
            return Err(report_not_found());
        }
        if !is_admin && report.user_id != caller_id {
            return Err(AppError::new(ErrorCode::ReportNotOwned, "this report belongs to another shopper"));
        }
        ReportView::from_row(report)
    }

    pub async fn report(&self, report_id: Uuid) -> AppResult<ReportView> {
        let report = self
            .in_tx(move |tx| tx.find_report(report_id)?.ok_or_else(report_not_found))
            .await?;
        ReportView::from_row(report)
    }

    pub async fn list_reports(
        &self,
        filter: ReportFilter,
        page: PageRequest<ReportSort>,
    ) -> AppResult<(Vec<ReportView>, Pagination)> {
        let (rows, total) = self.in_tx(move |tx| tx.list_reports(&filter, &page)).await?;
        let items = rows.into_iter().map(ReportView::from_row).collect::<AppResult<_>>()?;
        Ok((items, Pagination::new(total, &page)))
    }
}

/// Locks mission then report; the report is read once unlocked to learn
/// which mission to lock first.
fn lock_for_review(tx: &mut dyn MissionTx, report_id: Uuid) -> AppResult<(Mission, Report)> {
    let mission_id = tx.find_report(report_id)?.ok_or_else(report_not_found)?.mission_id;
    let mission = tx.lock_mission(mission_id)?.ok_or_else(mission_not_found)?;
    let report = tx.lock_report(report_id)?.ok_or_else(report_not_found)?;
    Ok((mission, report))
}

/// Applies the policy's mission event, if any. An event the mission can no
/// longer take (a refusal after it closed) leaves it unchanged.
fn close_out(
    tx: &mut dyn MissionTx,
    mission: &Mission,
    event: Option<MissionEvent>,
) -> AppResult<(MissionStatus, MissionStatus)> {
    let current = mission.status()?;
    let Some(event) = event else {
        return Ok((current, current));
    };

    match current.apply(event) {
        Ok(next) => {
            if next != current {
                set_mission_status(tx, mission.id, next)?;
            }
            Ok((current, next))
        }
        Err(e) => {
            tracing::debug!(mission_id = %mission.id, reason = %e, "mission status left unchanged");
            Ok((current, current))
        }
    }
}
