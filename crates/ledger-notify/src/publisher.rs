use crate::channels::user_balance_channel;
use crate::connection::RedisConnection;
use crate::messages::{BalanceMessage, StreamMessage};
use crate::{NotifyError, Result};
use async_trait::async_trait;
use ledger_core::notify::{BalanceChangedEvent, BalanceNotifier};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Redis stream publisher. In async mode messages go through a bounded
/// channel to a background task that pipelines XADDs; a full queue drops the
/// message rather than blocking the ledger.
pub struct RedisPublisher {
    connection: Arc<RedisConnection>,
    async_sender: Option<mpsc::Sender<StreamMessage>>,
}

impl RedisPublisher {
    pub fn new(connection: Arc<RedisConnection>) -> Self {
        let config = connection.config();
        let async_sender = if config.async_mode {
            let (sender, receiver) = mpsc::channel(config.queue_capacity);
            let batch_size = config.batch_size;

            info!(
                queue_capacity = config.queue_capacity,
                batch_size,
                "Redis async publisher initialized"
            );
            tokio::spawn(Self::async_publisher_loop(
                connection.clone(),
                receiver,
                batch_size,
            ));
            Some(sender)
        } else {
            None
        };

        Self {
            connection,
            async_sender,
        }
    }

    /// Publish a message to a channel (goes to the stream)
    pub async fn publish<T: Serialize>(&self, channel: String, data: T) -> Result<()> {
        let message = StreamMessage::new(channel, data)?;

        if let Some(sender) = &self.async_sender {
            if sender.try_send(message).is_err() {
                warn!("Redis publish queue full, dropping message");
            }
            Ok(())
        } else {
            self.publish_sync(message).await
        }
    }

    /// Publish directly (blocking)
    async fn publish_sync(&self, message: StreamMessage) -> Result<()> {
        let mut conn = self.connection.handle();
        let config = self.connection.config();

        redis::cmd("XADD")
            .arg(&config.stream_key)
            .arg("MAXLEN")
            .arg("~")
            .arg(config.max_len)
            .arg("*")
            .arg("channel")
            .arg(&message.channel)
            .arg("data")
            .arg(&message.data)
            .arg("source")
            .arg(&message.source)
            .arg("timestamp")
            .arg(message.timestamp)
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| NotifyError::Publish(e.to_string()))?;

        debug!(channel = %message.channel, "Published message to Redis");
        Ok(())
    }

    /// Background publisher loop for async mode with pipelined batches
    async fn async_publisher_loop(
        connection: Arc<RedisConnection>,
        mut receiver: mpsc::Receiver<StreamMessage>,
        batch_size: usize,
    ) {
        let stream_key = connection.config().stream_key.clone();
        let max_len = connection.config().max_len;
        let mut batch: Vec<StreamMessage> = Vec::with_capacity(batch_size);

        loop {
            batch.clear();
            match receiver.recv().await {
                Some(msg) => batch.push(msg),
                None => break, // channel closed
            }
            while batch.len() < batch_size {
                match receiver.try_recv() {
                    Ok(msg) => batch.push(msg),
                    Err(_) => break,
                }
            }

            let mut conn = connection.handle();
            let mut pipe = redis::pipe();
            for message in &batch {
                pipe.cmd("XADD")
                    .arg(&stream_key)
                    .arg("MAXLEN")
                    .arg("~")
                    .arg(max_len)
                    .arg("*")
                    .arg("channel")
                    .arg(&message.channel)
                    .arg("data")
                    .arg(&message.data)
                    .arg("source")
                    .arg(&message.source)
                    .arg("timestamp")
                    .arg(message.timestamp)
                    .ignore();
            }

            let result: std::result::Result<(), redis::RedisError> =
                pipe.query_async(&mut conn).await;
            match result {
                Ok(()) => debug!(batch_size = batch.len(), "Published batch to Redis"),
                Err(e) => {
                    error!(error = %e, batch_size = batch.len(), "Failed to publish batch to Redis");
                }
            }
        }
    }
}

impl Clone for RedisPublisher {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            async_sender: self.async_sender.clone(),
        }
    }
}

/// [`BalanceNotifier`] backed by the stream publisher. Delivery failures are
/// logged and swallowed, per the trait contract.
#[derive(Clone)]
pub struct RedisNotifier {
    publisher: RedisPublisher,
}

impl RedisNotifier {
    pub fn new(publisher: RedisPublisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl BalanceNotifier for RedisNotifier {
    async fn balance_changed(&self, event: BalanceChangedEvent) {
        let channel = user_balance_channel(&event.user_id);
        let message = BalanceMessage::from(&event);
        if let Err(err) = self.publisher.publish(channel, &message).await {
            warn!(user = %event.user_id, error = %err, "balance notification dropped");
        }
    }
}
