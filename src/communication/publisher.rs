// communication/publisher.rs
use crate::communication::messages::SignalMessage;
use crate::error::Result;
use crate::global_variables::{QUEUE_RECOMMENDATIONS, QUEUE_SIGNAL_STATUS};
use amiquip::{Channel, Connection, Exchange, Publish, QueueDeclareOptions};
use log::{info, warn};

/// Somewhere to send signal messages.
pub trait StatusSink {
    fn publish(&mut self, message: &SignalMessage) -> Result<()>;
}

/// Writes every message to the log at info level.
#[derive(Debug, Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn publish(&mut self, message: &SignalMessage) -> Result<()> {
        info!("{}", serde_json::to_string(message)?);
        Ok(())
    }
}

/// Publishes JSON messages to RabbitMQ through the default direct exchange.
pub struct AmqpPublisher {
    connection: Option<Connection>,
    channel: Channel,
}

impl AmqpPublisher {
    pub fn connect(url: &str) -> Result<Self> {
        let mut connection = Connection::insecure_open(url)?;
        let channel = connection.open_channel(None)?;
        channel.queue_declare(QUEUE_SIGNAL_STATUS, QueueDeclareOptions::default())?;
        channel.queue_declare(QUEUE_RECOMMENDATIONS, QueueDeclareOptions::default())?;
        info!("Connected to message broker at {}", url);
        Ok(Self {
            connection: Some(connection),
            channel,
        })
    }

    pub fn close(mut self) -> Result<()> {
        match self.connection.take() {
            Some(connection) => Ok(connection.close()?),
            None => Ok(()),
        }
    }
}

impl StatusSink for AmqpPublisher {
    fn publish(&mut self, message: &SignalMessage) -> Result<()> {
        let payload = serde_json::to_string(message)?;
        let exchange = Exchange::direct(&self.channel);
        exchange.publish(Publish::new(payload.as_bytes(), message.routing_key()))?;
        Ok(())
    }
}

impl Drop for AmqpPublisher {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                warn!("Closing broker connection failed: {}", e);
            }
        }
    }
}
