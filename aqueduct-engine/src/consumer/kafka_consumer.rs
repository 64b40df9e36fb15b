//! Kafka consumer implementation for the engine.
//!
//! Consumes change notifications and delayed updates. Change notifications
//! are batched and committed once the orchestrator acknowledges them; a
//! rejected batch rewinds its partitions so it is consumed again. Delayed
//! updates are committed as soon as they are held and released to the
//! orchestrator when their delivery time passes.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer as _, StreamConsumer},
    message::{BorrowedMessage, Headers, Message as KafkaMessage},
    Offset, TopicPartitionList,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

use aqueduct_kafka::{
    HEADER_CE_SOURCE, HEADER_CE_SUBJECT, HEADER_CE_TIME, TOPIC_TWIN_CHANGES, TOPIC_TWIN_UPDATES,
};

use crate::consumer::hold_queue::HoldQueue;
use crate::consumer::messages::{
    decode_change, decode_delayed, ChangeHeaders, InboundEvent, StreamMessage,
};
use crate::consumer::offsets::{MessageOffset, OffsetTracker};
use crate::errors::EngineError;
use crate::orchestrator::Consumer;

/// Default batch size for Kafka message batching.
const DEFAULT_BATCH_SIZE: usize = 50;

/// Default batch timeout in milliseconds.
const DEFAULT_BATCH_TIMEOUT_MS: u64 = 1000;

/// How often held delayed updates are checked for release.
const HOLD_RELEASE_INTERVAL_MS: u64 = 250;

/// Timeout for rewinding a partition after a rejected batch.
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// What a single Kafka message turned into.
enum Parsed {
    /// Change notification waiting in the batch.
    Change(InboundEvent),
    /// Delayed update moved to the hold queue.
    Held,
    /// Nothing to handle.
    Nothing,
}

/// Kafka consumer for twin changes and delayed updates.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    topics: Vec<String>,
    batch_size: usize,
    batch_timeout: Duration,
}

impl KafkaConsumer {
    /// Create a new Kafka consumer.
    ///
    /// # Arguments
    ///
    /// * `brokers` - Kafka broker addresses (comma-separated)
    /// * `group_id` - Consumer group ID
    pub fn new(brokers: &str, group_id: &str) -> Result<Self, EngineError> {
        Self::with_batch_config(
            brokers,
            group_id,
            DEFAULT_BATCH_SIZE,
            DEFAULT_BATCH_TIMEOUT_MS,
        )
    }

    pub fn with_batch_config(
        brokers: &str,
        group_id: &str,
        batch_size: usize,
        batch_timeout_ms: u64,
    ) -> Result<Self, EngineError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()?;

        info!(
            brokers = %brokers,
            group_id = %group_id,
            batch_size = batch_size,
            batch_timeout_ms = batch_timeout_ms,
            "Created Kafka consumer with batching"
        );

        Ok(Self {
            consumer,
            topics: vec![
                TOPIC_TWIN_CHANGES.to_string(),
                TOPIC_TWIN_UPDATES.to_string(),
            ],
            batch_size,
            batch_timeout: Duration::from_millis(batch_timeout_ms),
        })
    }

    async fn flush_batch(
        &self,
        batch: &mut Vec<InboundEvent>,
        offsets: &mut Vec<MessageOffset>,
        sender: &mpsc::Sender<StreamMessage>,
    ) -> Result<(), EngineError> {
        if batch.is_empty() && offsets.is_empty() {
            return Ok(());
        }

        debug!(
            event_count = batch.len(),
            offset_count = offsets.len(),
            "Sending batch of changes to orchestrator"
        );
        sender
            .send(StreamMessage::Events {
                events: std::mem::take(batch),
                offsets: std::mem::take(offsets),
            })
            .await
            .map_err(|e| EngineError::channel(e.to_string()))
    }

    async fn release_due(
        &self,
        held: &mut HoldQueue,
        sender: &mpsc::Sender<StreamMessage>,
    ) -> Result<(), EngineError> {
        let due = held.pop_due(Utc::now());
        if due.is_empty() {
            return Ok(());
        }

        debug!(count = due.len(), still_held = held.len(), "Releasing delayed updates");
        sender
            .send(StreamMessage::Events {
                events: due.into_iter().map(InboundEvent::Delayed).collect(),
                offsets: Vec::new(),
            })
            .await
            .map_err(|e| EngineError::channel(e.to_string()))
    }

    /// Commit offsets for a batch of messages.
    fn commit_offsets(&self, offsets: &[MessageOffset]) -> Result<(), EngineError> {
        if offsets.is_empty() {
            return Ok(());
        }

        let mut tpl = TopicPartitionList::new();
        for (topic, partition, offset) in offsets {
            tpl.add_partition_offset(topic, *partition, Offset::Offset(offset + 1))?;
        }

        self.consumer.commit(&tpl, CommitMode::Async)?;
        Ok(())
    }

    /// Rewind partitions of a rejected batch to their first failed offset.
    fn rewind(&self, positions: &[MessageOffset]) {
        for (topic, partition, offset) in positions {
            match self
                .consumer
                .seek(topic, *partition, Offset::Offset(*offset), SEEK_TIMEOUT)
            {
                Ok(()) => info!(topic = %topic, partition, offset, "Rewound partition for redelivery"),
                Err(e) => error!(topic = %topic, partition, offset, error = %e, "Failed to rewind partition"),
            }
        }
    }

    /// Settle a message that produced no event.
    ///
    /// Change offsets ride with the batch so they are never committed ahead of
    /// earlier messages still being processed. The updates topic has no
    /// batched offsets and is committed right away.
    fn skip_message(
        &self,
        position: MessageOffset,
        pending_offsets: &mut Vec<MessageOffset>,
    ) -> Result<(), EngineError> {
        if position.0 == TOPIC_TWIN_UPDATES {
            self.commit_offsets(&[position])
        } else {
            pending_offsets.push(position);
            Ok(())
        }
    }

    fn parse_message(
        &self,
        msg: &BorrowedMessage<'_>,
        held: &mut HoldQueue,
    ) -> Result<Parsed, EngineError> {
        let Some(payload) = msg.payload() else {
            debug!("Received message with empty payload");
            return Ok(Parsed::Nothing);
        };

        match msg.topic() {
            TOPIC_TWIN_CHANGES => {
                let change = decode_change(&change_headers(msg), payload)?;
                Ok(Parsed::Change(InboundEvent::Change(change)))
            }
            TOPIC_TWIN_UPDATES => {
                held.push(decode_delayed(payload)?);
                Ok(Parsed::Held)
            }
            topic => {
                warn!(topic = %topic, "Unknown topic");
                Ok(Parsed::Nothing)
            }
        }
    }
}

#[async_trait]
impl Consumer for KafkaConsumer {
    fn subscribe(&self) -> Result<(), EngineError> {
        let topics: Vec<&str> = self.topics.iter().map(|s| s.as_str()).collect();
        self.consumer.subscribe(&topics)?;

        info!(topics = ?self.topics, "Subscribed to Kafka topics");
        Ok(())
    }

    #[instrument(skip(self, sender, ack_receiver, shutdown))]
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        mut ack_receiver: mpsc::Receiver<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), EngineError> {
        use futures::StreamExt;

        let mut message_stream = self.consumer.stream();
        let mut batch: Vec<InboundEvent> = Vec::with_capacity(self.batch_size);
        let mut pending_offsets: Vec<MessageOffset> = Vec::new();
        let mut held = HoldQueue::new();
        let mut tracker = OffsetTracker::new();

        let mut flush_timer = tokio::time::interval(self.batch_timeout);
        flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        flush_timer.tick().await;

        let mut release_timer =
            tokio::time::interval(Duration::from_millis(HOLD_RELEASE_INTERVAL_MS));
        release_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(held = held.len(), "Consumer received shutdown signal");
                    // Uncommitted changes are re-read from the last committed offset on restart
                    let _ = sender.send(StreamMessage::End).await;
                    break;
                }
                ack_msg = ack_receiver.recv() => {
                    match ack_msg {
                        Some(StreamMessage::Acknowledgment { offsets, success, error }) => {
                            if success {
                                let committable = tracker.acknowledged(&offsets);
                                if let Err(e) = self.commit_offsets(&committable) {
                                    error!(error = %e, "Failed to commit offsets after acknowledgment");
                                }
                            } else {
                                error!(
                                    offset_count = offsets.len(),
                                    error = error.as_deref().unwrap_or("Unknown error"),
                                    "Not committing offsets due to processing failure"
                                );
                                self.rewind(&tracker.rejected(&offsets));
                            }
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Acknowledgment channel closed");
                            break;
                        }
                        _ => {}
                    }
                }
                message = message_stream.next() => {
                    match message {
                        Some(Ok(msg)) => {
                            let position = (msg.topic().to_string(), msg.partition(), msg.offset());
                            match self.parse_message(&msg, &mut held) {
                                Ok(Parsed::Change(event)) => {
                                    batch.push(event);
                                    pending_offsets.push(position);
                                    if batch.len() >= self.batch_size {
                                        self.flush_batch(&mut batch, &mut pending_offsets, &sender).await?;
                                    }
                                }
                                Ok(Parsed::Held) => self.commit_offsets(&[position])?,
                                Ok(Parsed::Nothing) => self.skip_message(position, &mut pending_offsets)?,
                                Err(e) => {
                                    // Malformed input is never going to parse; skip past it
                                    warn!(
                                        topic = %msg.topic(),
                                        partition = msg.partition(),
                                        offset = msg.offset(),
                                        error = %e,
                                        "Skipping malformed message"
                                    );
                                    self.skip_message(position, &mut pending_offsets)?;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Kafka error");
                            let _ = sender.send(StreamMessage::Error(e.to_string())).await;
                        }
                        None => {
                            info!("Kafka stream ended");
                            self.flush_batch(&mut batch, &mut pending_offsets, &sender).await?;
                            let _ = sender.send(StreamMessage::End).await;
                            break;
                        }
                    }
                }
                _ = flush_timer.tick() => {
                    if !batch.is_empty() || !pending_offsets.is_empty() {
                        debug!(count = batch.len(), "Flushing batch due to timeout");
                        self.flush_batch(&mut batch, &mut pending_offsets, &sender).await?;
                    }
                }
                _ = release_timer.tick() => {
                    self.release_due(&mut held, &sender).await?;
                }
            }
        }

        if !held.is_empty() {
            warn!(
                held = held.len(),
                next_due = ?held.next_due(),
                "Delayed updates still held at shutdown are lost"
            );
        }
        Ok(())
    }
}

/// Read the CloudEvents attributes of a change message.
fn change_headers(msg: &BorrowedMessage<'_>) -> ChangeHeaders {
    let mut attributes = ChangeHeaders::default();
    let Some(headers) = msg.headers() else {
        return attributes;
    };

    for header in headers.iter() {
        let value = header
            .value
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .map(str::to_string);
        match header.key {
            HEADER_CE_SOURCE => attributes.source = value,
            HEADER_CE_SUBJECT => attributes.subject = value,
            HEADER_CE_TIME => attributes.time = value,
            _ => {}
        }
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_BATCH_SIZE, 50);
        assert_eq!(DEFAULT_BATCH_TIMEOUT_MS, 1000);
        assert!(HOLD_RELEASE_INTERVAL_MS < DEFAULT_BATCH_TIMEOUT_MS);
    }
}
