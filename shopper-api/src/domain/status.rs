//! Status state machines for missions, reports, assignments and users.
//!
//! Every status change in the lifecycle engine goes through one of the
//! `apply` functions below; a `(state, event)` pair missing from a table is
//! rejected with [`InvalidTransition`].

use serde::{Deserialize, Serialize};

use shopper_shared::errors::{AppError, ErrorCode};

macro_rules! status_str {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("unknown {}: {s}", stringify!($name))),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Available,
    Assigned,
    Submitted,
    Approved,
    Refused,
    Cancelled,
}

status_str!(MissionStatus {
    Available => "available",
    Assigned => "assigned",
    Submitted => "submitted",
    Approved => "approved",
    Refused => "refused",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Submitted,
    Approved,
    Refused,
}

status_str!(ReportStatus {
    Submitted => "submitted",
    Approved => "approved",
    Refused => "refused",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Assigned,
    Completed,
}

status_str!(AssignmentStatus {
    Assigned => "assigned",
    Completed => "completed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

status_str!(UserStatus {
    Active => "active",
    Inactive => "inactive",
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {event} to {entity} in status '{from}'")]
pub struct InvalidTransition {
    pub entity: &'static str,
    pub from: &'static str,
    pub event: &'static str,
}

impl InvalidTransition {
    pub fn into_app_error(self, code: ErrorCode) -> AppError {
        AppError::new(code, self.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionEvent {
    /// One or more shoppers now hold an assignment.
    Assign,
    /// A shopper submitted (or re-submitted) a report.
    ReportSubmitted,
    /// Every assignee has been reviewed.
    Close { any_approved: bool },
    /// A single refusal downgrades the mission immediately.
    Refuse,
    /// Admin edit setting the status directly.
    Override(MissionStatus),
}

impl MissionEvent {
    fn name(&self) -> &'static str {
        match self {
            MissionEvent::Assign => "assign",
            MissionEvent::ReportSubmitted => "report submission",
            MissionEvent::Close { .. } => "close-out",
            MissionEvent::Refuse => "refusal",
            MissionEvent::Override(_) => "status override",
        }
    }
}

impl MissionStatus {
    pub fn apply(self, event: MissionEvent) -> Result<MissionStatus, InvalidTransition> {
        use MissionEvent as E;
        use MissionStatus as S;

        let next = match (self, event) {
            (S::Available | S::Assigned, E::Assign) => Some(S::Assigned),
            (S::Assigned | S::Submitted, E::ReportSubmitted) => Some(S::Submitted),
            (S::Submitted, E::Close { any_approved: true }) => Some(S::Approved),
            (S::Submitted, E::Close { any_approved: false }) => Some(S::Refused),
            (S::Submitted, E::Refuse) => Some(S::Refused),
            // An early refusal is superseded once every assignee is reviewed
            // and at least one report was approved.
            (S::Refused, E::Close { any_approved: true }) => Some(S::Approved),
            // Admins may reopen, hold or cancel a mission nobody has reported on yet;
            // review outcomes are never set by hand.
            (S::Available | S::Assigned, E::Override(target @ (S::Available | S::Assigned | S::Cancelled))) => {
                Some(target)
            }
            _ => None,
        };

        next.ok_or(InvalidTransition {
            entity: "mission",
            from: self.as_str(),
            event: event.name(),
        })
    }

    /// Whether admin edits are accepted in this status.
    pub fn is_editable(self) -> bool {
        matches!(self, MissionStatus::Available | MissionStatus::Assigned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportEvent {
    Resubmit,
    Approve,
    Refuse,
}

impl ReportStatus {
    pub fn apply(self, event: ReportEvent) -> Result<ReportStatus, InvalidTransition> {
        let next = match (self, event) {
            (ReportStatus::Submitted, ReportEvent::Resubmit) => Some(ReportStatus::Submitted),
            (ReportStatus::Submitted, ReportEvent::Approve) => Some(ReportStatus::Approved),
            (ReportStatus::Submitted, ReportEvent::Refuse) => Some(ReportStatus::Refused),
            _ => None,
        };

        next.ok_or(InvalidTransition {
            entity: "report",
            from: self.as_str(),
            event: match event {
                ReportEvent::Resubmit => "resubmission",
                ReportEvent::Approve => "approval",
                ReportEvent::Refuse => "refusal",
            },
        })
    }

    pub fn is_reviewed(self) -> bool {
        matches!(self, ReportStatus::Approved | ReportStatus::Refused)
    }
}
