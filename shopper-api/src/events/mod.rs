pub mod publisher;
pub mod sink;

pub use sink::{EventSink, LogSink, RabbitSink};

#[cfg(test)]
pub use sink::RecordingSink;
