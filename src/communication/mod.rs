pub mod messages;
pub mod publisher;

pub use messages::SignalMessage;
pub use publisher::{AmqpPublisher, LogSink, StatusSink};
