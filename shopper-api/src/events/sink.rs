use shopper_shared::clients::rabbitmq::RabbitMQClient;
use shopper_shared::types::event::Event;

/// Outbound side of the lifecycle engine.
///
/// Called only after a transaction commits. Delivery is best-effort: a sink
/// never reports failure back to the request that produced the event.
pub trait EventSink: Send + Sync {
    fn emit(&self, routing_key: &'static str, event: Event<serde_json::Value>);
}

/// Publishes to the `shopper.events` topic exchange without blocking the caller.
pub struct RabbitSink {
    client: RabbitMQClient,
    runtime: tokio::runtime::Handle,
}

impl RabbitSink {
    pub fn new(client: RabbitMQClient, runtime: tokio::runtime::Handle) -> Self {
        Self { client, runtime }
    }
}

impl EventSink for RabbitSink {
    fn emit(&self, routing_key: &'static str, event: Event<serde_json::Value>) {
        let client = self.client.clone();
        self.runtime.spawn(async move {
            if let Err(e) = client.publish(routing_key, &event).await {
                tracing::error!(error = %e, routing_key, event_id = %event.id, "failed to publish event");
            }
        });
    }
}

/// Used when no broker is configured.
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, routing_key: &'static str, event: Event<serde_json::Value>) {
        tracing::info!(
            routing_key,
            event_id = %event.id,
            user_id = ?event.user_id,
            data = %event.data,
            "event emitted (no broker configured)"
        );
    }
}

#[cfg(test)]
pub use recording::RecordingSink;
