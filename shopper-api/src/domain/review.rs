use serde::{Deserialize, Serialize};

use crate::domain::status::MissionEvent;

/// How a refused report affects its mission.
///
/// `AnyRefusal` downgrades the mission on the first refusal even while other
/// assignees are still pending, while approval waits for every assignee. The
/// two rules are asymmetric; `AfterAllReviewed` makes refusal wait as well and
/// closes the mission as approved when at least one report was approved.
/// Which one the product wants is still open, so it is configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalPolicy {
    #[default]
    AnyRefusal,
    AfterAllReviewed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Refused,
}

/// Review progress of one mission, counted after the current verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReviewTally {
    /// Assignment rows for the mission, active or completed.
    pub assignees: i64,
    /// Reports in `approved` or `refused`.
    pub reviewed: i64,
    pub approved: i64,
}

impl ReviewTally {
    pub fn all_reviewed(&self) -> bool {
        self.assignees > 0 && self.reviewed >= self.assignees
    }
}

impl RefusalPolicy {
    /// Mission event implied by `verdict`, if any.
    pub fn mission_event(self, verdict: Verdict, tally: &ReviewTally) -> Option<MissionEvent> {
        match (self, verdict) {
            (RefusalPolicy::AnyRefusal, Verdict::Refused) => Some(MissionEvent::Refuse),
            (_, Verdict::Approved) | (RefusalPolicy::AfterAllReviewed, Verdict::Refused) => tally
                .all_reviewed()
                .then_some(MissionEvent::Close {
                    any_approved: tally.approved > 0,
                }),
        }
    }
}
