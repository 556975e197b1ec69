use std::collections::HashSet;

use uuid::Uuid;

use shopper_shared::errors::{AppError, AppResult, ErrorCode};

use crate::domain::status::{MissionEvent, MissionStatus};
use crate::events::publisher;
use crate::models::MissionChanges;
use crate::services::views::{ApplyOutcome, AssignFailure, AssigneeView, BulkAssignResult};
use crate::services::{mission_moved, mission_not_found, user_not_found, MissionService};
use crate::store::MissionTx;

pub const MAX_BULK_ASSIGN: usize = 100;

/// Moves the locked mission along `Assign` when it is not already there.
fn record_assignment(
    tx: &mut dyn MissionTx,
    mission_id: Uuid,
    current: MissionStatus,
) -> AppResult<MissionStatus> {
    let next = current
        .apply(MissionEvent::Assign)
        .map_err(|e| e.into_app_error(ErrorCode::InvalidTransition))?;
    if next != current {
        tx.update_mission(
            mission_id,
            MissionChanges {
                status: Some(next.as_str().to_string()),
                updated_at: Some(chrono::Utc::now()),
                ..Default::default()
            },
        )?;
    }
    Ok(next)
}

impl MissionService {
    /// A shopper claims an open mission for themselves.
    pub async fn apply(&self, user_id: Uuid, mission_id: Uuid) -> AppResult<ApplyOutcome> {
        let (assignment, from, to) = self
            .in_tx(move |tx| {
                let mission = tx.lock_mission(mission_id)?.ok_or_else(mission_not_found)?;
                // A repeat claim is reported as such even though the first one
                // already moved the mission out of `available`.
                if tx.find_assignment(mission_id, user_id)?.is_some() {
                    return Err(AppError::new(
                        ErrorCode::AlreadyAssigned,
                        "you have already applied to this mission",
                    ));
                }
                let current = mission.status()?;
                if current != MissionStatus::Available {
                    return Err(AppError::new(
                        ErrorCode::MissionNotAvailable,
                        "mission is not available",
                    ));
                }

                let user = tx.find_user(user_id)?.ok_or_else(user_not_found)?;
                if !user.is_shopper() {
                    return Err(AppError::forbidden("only shoppers can apply to missions"));
                }
                if !user.is_active() {
                    return Err(AppError::new(ErrorCode::AccountInactive, "account is inactive"));
                }

                let assignment = tx.upsert_assignment(mission_id, user_id)?;
                let next = record_assignment(tx, mission_id, current)?;
                Ok((assignment, current, next))
            })
            .await?;

        tracing::info!(
            mission_id = %mission_id,
            user_id = %user_id,
            from = %from,
            to = %to,
            "shopper applied to mission"
        );
        mission_moved(from, to);
        publisher::publish_mission_assigned(self.events(), user_id, mission_id, vec![user_id], to);

        Ok(ApplyOutcome {
            mission_id,
            mission_status: to,
            assignment: AssigneeView::from_row(&assignment)?,
        })
    }

    /// Admin assigns several shoppers at once.
    ///
    /// Each user is checked independently: an unknown, inactive or non-shopper
    /// user lands in `failed` and an existing active claim in
    /// `alreadyAssigned`, without stopping the rest of the batch.
    pub async fn bulk_assign(
        &self,
        admin_id: Uuid,
        mission_id: Uuid,
        user_ids: Vec<Uuid>,
    ) -> AppResult<BulkAssignResult> {
        let mut seen = HashSet::new();
        let user_ids: Vec<Uuid> = user_ids.into_iter().filter(|id| seen.insert(*id)).collect();
        if user_ids.is_empty() {
            return Err(AppError::field("userIds", "at least one user id is required"));
        }
        if user_ids.len() > MAX_BULK_ASSIGN {
            return Err(AppError::field(
                "userIds",
                format!("at most {MAX_BULK_ASSIGN} users can be assigned at once"),
            ));
        }

        let (result, from, to) = self
            .in_tx(move |tx| {
                let mission = tx.lock_mission(mission_id)?.ok_or_else(mission_not_found)?;
                let current = mission.status()?;
                if !matches!(current, MissionStatus::Available | MissionStatus::Assigned) {
                    return Err(AppError::new(
                        ErrorCode::MissionNotAvailable,
                        format!("cannot assign shoppers to a mission that is {current}"),
                    ));
                }

                let mut result = BulkAssignResult::default();
                for user_id in user_ids {
                    let reason = match tx.find_user(user_id)? {
                        None => Some("user not found"),
                        Some(user) if !user.is_shopper() => Some("user is not a shopper"),
                        Some(user) if !user.is_active() => Some("user is inactive"),
                        Some(_) => None,
                    };
                    if let Some(reason) = reason {
                        result.failed.push(AssignFailure { user_id, reason: reason.to_string() });
                        continue;
                    }

                    let active = tx
                        .find_assignment(mission_id, user_id)?
                        .is_some_and(|a| a.is_active());
                    if active {
                        result.already_assigned.push(user_id);
                    } else {
                        tx.upsert_assignment(mission_id, user_id)?;
                        result.assigned.push(user_id);
                    }
                }

                let next = if result.assigned.is_empty() {
                    current
                } else {
                    record_assignment(tx, mission_id, current)?
                };
                Ok((result, current, next))
            })
            .await?;

        tracing::info!(
            mission_id = %mission_id,
            admin_id = %admin_id,
            assigned = result.assigned.len(),
            already_assigned = result.already_assigned.len(),
            failed = result.failed.len(),
            from = %from,
            to = %to,
            "bulk assignment processed"
        );
        mission_moved(from, to);
        if !result.assigned.is_empty() {
            publisher::publish_mission_assigned(
                self.events(),
                admin_id,
                mission_id,
                result.assigned.clone(),
                to,
            );
        }
        Ok(result)
    }
}
