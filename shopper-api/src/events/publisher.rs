use serde::Serialize;
use uuid::Uuid;

use shopper_shared::types::event::{payloads, routing_keys, Event};

use crate::domain::status::MissionStatus;
use crate::events::EventSink;

pub const SOURCE: &str = "shopper-api";

fn emit<T: Serialize>(sink: &dyn EventSink, routing_key: &'static str, user_id: Uuid, data: T) {
    match serde_json::to_value(data) {
        Ok(data) => sink.emit(routing_key, Event::new(SOURCE, routing_key, data).with_user(user_id)),
        Err(e) => tracing::error!(error = %e, routing_key, "failed to serialize event payload"),
    }
}

pub fn publish_mission_assigned(
    sink: &dyn EventSink,
    actor_id: Uuid,
    mission_id: Uuid,
    user_ids: Vec<Uuid>,
    mission_status: MissionStatus,
) {
    emit(
        sink,
        routing_keys::MISSION_ASSIGNED,
        actor_id,
        payloads::MissionAssigned {
            mission_id,
            user_ids,
            mission_status: mission_status.to_string(),
        },
    );
}

pub fn publish_mission_deleted(sink: &dyn EventSink, admin_id: Uuid, mission_id: Uuid, title: String) {
    emit(
        sink,
        routing_keys::MISSION_DELETED,
        admin_id,
        payloads::MissionDeleted { mission_id, title },
    );
}

pub fn publish_report_submitted(
    sink: &dyn EventSink,
    report_id: Uuid,
    mission_id: Uuid,
    user_id: Uuid,
    resubmission: bool,
) {
    emit(
        sink,
        routing_keys::REPORT_SUBMITTED,
        user_id,
        payloads::ReportSubmitted {
            report_id,
            mission_id,
            user_id,
            resubmission,
        },
    );
}

pub fn publish_report_approved(
    sink: &dyn EventSink,
    report_id: Uuid,
    mission_id: Uuid,
    user_id: Uuid,
    mission_status: MissionStatus,
) {
    emit(
        sink,
        routing_keys::REPORT_APPROVED,
        user_id,
        payloads::ReportApproved {
            report_id,
            mission_id,
            user_id,
            mission_status: mission_status.to_string(),
        },
    );
}

pub fn publish_report_refused(
    sink: &dyn EventSink,
    report_id: Uuid,
    mission_id: Uuid,
    user_id: Uuid,
    reason: String,
    mission_status: MissionStatus,
) {
    emit(
        sink,
        routing_keys::REPORT_REFUSED,
        user_id,
        payloads::ReportRefused {
            report_id,
            mission_id,
            user_id,
            reason,
            mission_status: mission_status.to_string(),
        },
    );
}

pub fn publish_payment_simulated(
    sink: &dyn EventSink,
    report_id: Uuid,
    mission_id: Uuid,
    user_id: Uuid,
    amount: f64,
) {
    emit(
        sink,
        routing_keys::PAYMENT_SIMULATED,
        user_id,
        payloads::PaymentSimulated {
            report_id,
            mission_id,
            user_id,
            amount,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;

    #[test]
    fn envelope_carries_source_user_and_payload() {
        let sink = RecordingSink::default();
        let (report, mission, user) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());

        publish_payment_simulated(&sink, report, mission, user, 50.0);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        let (key, event) = &events[0];
        assert_eq!(*key, routing_keys::PAYMENT_SIMULATED);
        assert_eq!(event.source, SOURCE);
        assert_eq!(event.event_type, routing_keys::PAYMENT_SIMULATED);
        assert_eq!(event.user_id, Some(user));
        assert_eq!(event.data["amount"], 50.0);
        assert_eq!(event.data["report_id"], report.to_string());
    }
}
