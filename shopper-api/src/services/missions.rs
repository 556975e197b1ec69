use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use shopper_shared::errors::{AppError, AppResult, ErrorCode};
use shopper_shared::types::pagination::{PageRequest, Pagination};

use crate::domain::mission::{parse_deadline, MissionDraft, MissionPatch};
use crate::domain::status::{AssignmentStatus, MissionEvent, MissionStatus};
use crate::domain::survey::{decode_questions, encode_questions, validate_questions, SurveyQuestion};
use crate::events::publisher;
use crate::models::{MissionChanges, NewMission};
use crate::services::views::{
    AssigneeView, MissionDetail, MissionView, ReportView, ShopperMission,
};
use crate::services::{field_errors, mission_moved, mission_not_found, MissionService};
use crate::store::{AdminMissionSort, AvailableMissionSort, MissionFilter};

/// Counts of rows removed by a mission cascade delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedMission {
    pub id: Uuid,
    pub reports: usize,
    pub assignments: usize,
    pub messages: usize,
    pub notifications: usize,
}

impl MissionService {
    pub async fn create_mission(&self, admin_id: Uuid, draft: MissionDraft) -> AppResult<MissionView> {
        let draft = draft.normalized();
        let mut errors = field_errors(draft.validate());
        if let Err(survey_errors) = validate_questions(&draft.survey_questions) {
            errors.extend(
                survey_errors
                    .into_iter()
                    .map(|(k, v)| (k.replacen("questions", "surveyQuestions", 1), v)),
            );
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }
        let deadline = parse_deadline(&draft.deadline)
            .ok_or_else(|| AppError::field("deadline", "deadline must be a valid date"))?;

        let row = NewMission {
            id: Uuid::now_v7(),
            title: draft.title,
            description: draft.description,
            deadline,
            reward: draft.reward,
            location: draft.location,
            category: draft.category,
            business_name: draft.business_name,
            status: MissionStatus::Available.as_str().to_string(),
            survey_questions: encode_questions(&draft.survey_questions),
            created_by: admin_id,
        };

        let mission = self.in_tx(move |tx| tx.insert_mission(row)).await?;
        tracing::info!(mission_id = %mission.id, admin_id = %admin_id, "mission created");
        MissionView::from_row(mission)
    }

    /// Admin edit, allowed while the mission is `available` or `assigned`.
    pub async fn update_mission(
        &self,
        admin_id: Uuid,
        mission_id: Uuid,
        patch: MissionPatch,
    ) -> AppResult<MissionView> {
        let patch = patch.normalized();
        let errors = field_errors(patch.validate());
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }
        let deadline = match patch.deadline.as_deref() {
            Some(raw) => Some(
                parse_deadline(raw)
                    .ok_or_else(|| AppError::field("deadline", "deadline must be a valid date"))?,
            ),
            None => None,
        };

        let (mission, from) = self
            .in_tx(move |tx| {
                let mission = tx.lock_mission(mission_id)?.ok_or_else(mission_not_found)?;
                let current = mission.status()?;
                if !current.is_editable() {
                    return Err(AppError::new(
                        ErrorCode::MissionLocked,
                        format!("mission cannot be edited once it is {current}"),
                    ));
                }

                let status = match patch.status {
                    Some(target) if target != current => Some(
                        current
                            .apply(MissionEvent::Override(target))
                            .map_err(|e| e.into_app_error(ErrorCode::InvalidTransition))?,
                    ),
                    _ => None,
                };

                let changes = MissionChanges {
                    title: patch.title,
                    description: patch.description,
                    deadline,
                    reward: patch.reward,
                    location: patch.location,
                    category: patch.category,
                    business_name: patch.business_name,
                    status: status.map(|s| s.as_str().to_string()),
                    survey_questions: None,
                    updated_at: Some(Utc::now()),
                };
                Ok((tx.update_mission(mission_id, changes)?, current))
            })
            .await?;

        tracing::info!(
            mission_id = %mission_id,
            admin_id = %admin_id,
            from = %from,
            to = %mission.status,
            "mission updated"
        );
        mission_moved(from, mission.status()?);
        MissionView::from_row(mission)
    }

    /// Removes the mission and every row hanging off it in one transaction.
    pub async fn delete_mission(&self, admin_id: Uuid, mission_id: Uuid) -> AppResult<DeletedMission> {
        let (title, deleted) = self
            .in_tx(move |tx| {
                let mission = tx.lock_mission(mission_id)?.ok_or_else(mission_not_found)?;
                let deleted = DeletedMission {
                    id: mission_id,
                    reports: tx.delete_reports_for(mission_id)?,
                    assignments: tx.delete_assignments_for(mission_id)?,
                    messages: tx.delete_messages_for(mission_id)?,
                    notifications: tx.delete_notifications_for(mission_id)?,
                };
                tx.delete_mission(mission_id)?;
                Ok((mission.title, deleted))
            })
            .await?;

        tracing::info!(
            mission_id = %mission_id,
            admin_id = %admin_id,
            reports = deleted.reports,
            assignments = deleted.assignments,
            "mission deleted"
        );
        publisher::publish_mission_deleted(self.events(), admin_id, mission_id, title);
        Ok(deleted)
    }

    pub async fn replace_survey(
        &self,
        admin_id: Uuid,
        mission_id: Uuid,
        questions: Vec<SurveyQuestion>,
    ) -> AppResult<Vec<SurveyQuestion>> {
        validate_questions(&questions).map_err(AppError::Validation)?;
        let document = encode_questions(&questions);

        let mission = self
            .in_tx(move |tx| {
                tx.lock_mission(mission_id)?.ok_or_else(mission_not_found)?;
                tx.update_mission(
                    mission_id,
                    MissionChanges {
                        survey_questions: Some(document),
                        updated_at: Some(Utc::now()),
                        ..Default::default()
                    },
                )
            })
            .await?;

        tracing::info!(mission_id = %mission_id, admin_id = %admin_id, questions = questions.len(), "survey replaced");
        Ok(decode_questions(&mission.survey_questions))
    }

    pub async fn survey(&self, mission_id: Uuid) -> AppResult<Vec<SurveyQuestion>> {
        let mission = self
            .in_tx(move |tx| tx.find_mission(mission_id)?.ok_or_else(mission_not_found))
            .await?;
        Ok(decode_questions(&mission.survey_questions))
    }

    pub async fn list_missions(
        &self,
        filter: MissionFilter,
        page: PageRequest<AdminMissionSort>,
    ) -> AppResult<(Vec<MissionView>, Pagination)> {
        let page = page.map_sort(|s| s.0);
        let (rows, total) = self.in_tx(move |tx| tx.list_missions(&filter, &page)).await?;
        let items = rows.into_iter().map(MissionView::from_row).collect::<AppResult<_>>()?;
        Ok((items, Pagination::new(total, &page)))
    }

    /// Open missions a shopper can apply to.
    pub async fn list_available(
        &self,
        category: Option<String>,
        location: Option<String>,
        page: PageRequest<AvailableMissionSort>,
    ) -> AppResult<(Vec<MissionView>, Pagination)> {
        let filter = MissionFilter {
            status: Some(MissionStatus::Available),
            category,
            location,
            search: None,
        };
        let page = page.map_sort(|s| s.0);
        let (rows, total) = self.in_tx(move |tx| tx.list_missions(&filter, &page)).await?;
        let items = rows.into_iter().map(MissionView::from_row).collect::<AppResult<_>>()?;
        Ok((items, Pagination::new(total, &page)))
    }

    pub async fn mission_detail(&self, mission_id: Uuid) -> AppResult<MissionDetail> {
        let (mission, assignments, reports) = self
            .in_tx(move |tx| {
                let mission = tx.find_mission(mission_id)?.ok_or_else(mission_not_found)?;
                let assignments = tx.assignments_for_mission(mission_id)?;
                let reports = tx.reports_for_mission(mission_id)?;
                Ok((mission, assignments, reports))
            })
            .await?;

        Ok(MissionDetail {
            mission: MissionView::from_row(mission)?,
            assignees: assignments.iter().map(AssigneeView::from_row).collect::<AppResult<_>>()?,
            reports: reports
                .into_iter()
                .map(|r| ReportView::from_row(r).map(|v| v.summary()))
                .collect::<AppResult<_>>()?,
        })
    }

    /// A shopper may see open missions and the ones they hold or reported on.
    pub async fn shopper_mission(&self, user_id: Uuid, mission_id: Uuid) -> AppResult<MissionView> {
        let mission = self
            .in_tx(move |tx| {
                let mission = tx.find_mission(mission_id)?.ok_or_else(mission_not_found)?;
                if mission.status()? == MissionStatus::Available {
                    return Ok(mission);
                }
                let involved = tx.find_assignment(mission_id, user_id)?.is_some()
                    || tx.find_report_for(mission_id, user_id)?.is_some();
                if !involved {
                    return Err(AppError::forbidden("you do not have access to this mission"));
                }
                Ok(mission)
            })
            .await?;
        MissionView::from_row(mission)
    }

    pub async fn assigned_missions(&self, user_id: Uuid) -> AppResult<Vec<ShopperMission>> {
        self.shopper_queue(user_id, AssignmentStatus::Assigned).await
    }

    pub async fn completed_missions(&self, user_id: Uuid) -> AppResult<Vec<ShopperMission>> {
        self.shopper_queue(user_id, AssignmentStatus::Completed).await
    }

    async fn shopper_queue(
        &self,
        user_id: Uuid,
        status: AssignmentStatus,
    ) -> AppResult<Vec<ShopperMission>> {
        let (rows, reports) = self
            .in_tx(move |tx| Ok((tx.missions_for_user(user_id, status)?, tx.reports_for_user(user_id)?)))
            .await?;

        rows.into_iter()
            .map(|(assignment, mission)| {
                let report = reports.iter().find(|r| r.mission_id == mission.id);
                Ok(ShopperMission {
                    assignment_status: assignment.status()?,
                    applied_at: assignment.applied_at,
                    completed_at: assignment.completed_at,
                    report_id: report.map(|r| r.id),
                    report_status: report.map(|r| r.status()).transpose()?,
                    mission: MissionView::from_row(mission)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use shopper_shared::errors::ErrorCode;
    use shopper_shared::types::pagination::PaginationParams;

    use super::*;
    use crate::services::testing::{draft, harness};
    use crate::store::MissionStore;

    #[tokio::test]
    async fn create_starts_available_with_creator() {
        let h = harness();
        let admin = h.admin();

        let mission = h.service.create_mission(admin.id, draft("Store visit")).await.unwrap();

        assert_eq!(mission.status, MissionStatus::Available);
        assert_eq!(mission.created_by, admin.id);
        assert_eq!(mission.reward, 50.0);
    }

    #[tokio::test]
    async fn create_reports_every_bad_field_at_once() {
        let h = harness();
        let mut bad = draft(" ");
        bad.reward = -3.0;
        bad.deadline = "soon".into();
        bad.survey_questions = serde_json::from_value(json!([
            {"id": "q1", "type": "multiple_choice", "text": "Pick", "options": ["one"]}
        ]))
        .unwrap();

        let err = h.service.create_mission(Uuid::now_v7(), bad).await.unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.contains_key("title"));
        assert!(errors.contains_key("reward"));
        assert!(errors.contains_key("deadline"));
        assert!(errors.contains_key("surveyQuestions[0].options"));
        assert_eq!(h.store.read(|t| t.missions.len()), 0);
    }

    #[tokio::test]
    async fn edits_are_locked_after_submission() {
        let h = harness();
        let admin = h.admin();
        let mission = h.service.create_mission(admin.id, draft("Locked")).await.unwrap();

        let patch = MissionPatch { reward: Some(75.0), ..Default::default() };
        let updated = h.service.update_mission(admin.id, mission.id, patch).await.unwrap();
        assert_eq!(updated.reward, 75.0);

        {
            let mut tx = h.store.begin().unwrap();
            tx.update_mission(
                mission.id,
                MissionChanges {
                    status: Some("submitted".into()),
                    ..Default::default()
                },
            )
            .unwrap();
            tx.commit().unwrap();
        }

        let err = h
            .service
            .update_mission(admin.id, mission.id, MissionPatch { reward: Some(1.0), ..Default::default() })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissionLocked);
    }

    #[tokio::test]
    async fn status_override_is_limited() {
        let h = harness();
        let admin = h.admin();
        let mission = h.service.create_mission(admin.id, draft("Override")).await.unwrap();

        let err = h
            .service
            .update_mission(
                admin.id,
                mission.id,
                MissionPatch { status: Some(MissionStatus::Approved), ..Default::default() },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTransition);

        let cancelled = h
            .service
            .update_mission(
                admin.id,
                mission.id,
                MissionPatch { status: Some(MissionStatus::Cancelled), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(cancelled.status, MissionStatus::Cancelled);
    }

    #[tokio::test]
    async fn survey_replacement_validates_and_round_trips() {
        let h = harness();
        let admin = h.admin();
        let mission = h.service.create_mission(admin.id, draft("Survey")).await.unwrap();

        let questions: Vec<SurveyQuestion> = serde_json::from_value(json!([
            {"id": "q1", "type": "rating", "text": "Overall", "maxRating": 5, "isRequired": true}
        ]))
        .unwrap();
        let stored = h.service.replace_survey(admin.id, mission.id, questions.clone()).await.unwrap();
        assert_eq!(stored, questions);
        assert_eq!(h.service.survey(mission.id).await.unwrap(), questions);

        let bad: Vec<SurveyQuestion> =
            serde_json::from_value(json!([{"id": "", "type": "text", "text": "x"}])).unwrap();
        let err = h.service.replace_survey(admin.id, mission.id, bad).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err = h.service.survey(Uuid::now_v7()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissionNotFound);
    }

    #[tokio::test]
    async fn listing_filters_and_paginates() {
        let h = harness();
        let admin = h.admin();
        for i in 0..5 {
            let mut d = draft(&format!("Visit {i}"));
            d.category = if i % 2 == 0 { "food".into() } else { "retail".into() };
            d.reward = f64::from(i * 10);
            h.service.create_mission(admin.id, d).await.unwrap();
        }

        let page = PaginationParams { limit: 2, sort_by: Some("reward".into()), order: Some("asc".into()), ..Default::default() }
            .resolve::<AdminMissionSort>()
            .unwrap();
        let filter = MissionFilter { category: Some("food".into()), ..Default::default() };
        let (items, pagination) = h.service.list_missions(filter, page).await.unwrap();

        assert_eq!(pagination.total, 3);
        assert_eq!(pagination.total_pages, 2);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].reward, 0.0);
        assert_eq!(items[1].reward, 20.0);

        let filter = MissionFilter { search: Some("VISIT 3".into()), ..Default::default() };
        let page = PaginationParams::default().resolve::<AdminMissionSort>().unwrap();
        let (items, _) = h.service.list_missions(filter, page).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn shoppers_only_see_open_or_their_own_missions() {
        let h = harness();
        let admin = h.admin();
        let (alice, bob) = (h.shopper(), h.shopper());
        let mission = h.service.create_mission(admin.id, draft("Private")).await.unwrap();

        assert!(h.service.shopper_mission(bob.id, mission.id).await.is_ok());

        h.service.apply(alice.id, mission.id).await.unwrap();

        assert!(h.service.shopper_mission(alice.id, mission.id).await.is_ok());
        let err = h.service.shopper_mission(bob.id, mission.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let open = PaginationParams::default().resolve::<AvailableMissionSort>().unwrap();
        let (items, _) = h.service.list_available(None, None, open).await.unwrap();
        assert!(items.is_empty());

        let queue = h.service.assigned_missions(alice.id).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].mission.id, mission.id);
        assert!(queue[0].report_id.is_none());
    }
}
