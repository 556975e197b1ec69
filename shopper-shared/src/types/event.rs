use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ Event envelope wrapping all domain events.
///
/// Routing key format: `shopper.{entity}.{action}`
/// Example: `shopper.report.approved`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    pub const MISSION_ASSIGNED: &str = "shopper.mission.assigned";
    pub const MISSION_DELETED: &str = "shopper.mission.deleted";

    pub const REPORT_SUBMITTED: &str = "shopper.report.submitted";
    pub const REPORT_APPROVED: &str = "shopper.report.approved";
    pub const REPORT_REFUSED: &str = "shopper.report.refused";

    pub const PAYMENT_SIMULATED: &str = "shopper.payment.simulated";
}

/// Event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MissionAssigned {
        pub mission_id: Uuid,
        pub user_ids: Vec<Uuid>,
        pub mission_status: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MissionDeleted {
        pub mission_id: Uuid,
        pub title: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ReportSubmitted {
        pub report_id: Uuid,
        pub mission_id: Uuid,
        pub user_id: Uuid,
        pub resubmission: bool,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ReportApproved {
        pub report_id: Uuid,
        pub mission_id: Uuid,
        pub user_id: Uuid,
        pub mission_status: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ReportRefused {
        pub report_id: Uuid,
        pub mission_id: Uuid,
        pub user_id: Uuid,
        pub reason: String,
        pub mission_status: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PaymentSimulated {
        pub report_id: Uuid,
        pub mission_id: Uuid,
        pub user_id: Uuid,
        pub amount: f64,
    }
}
