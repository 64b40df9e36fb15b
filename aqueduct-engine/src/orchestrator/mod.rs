//! Orchestrator module for the engine ingest.
//!
//! Coordinates the consumer and the cascade: every batch of inbound events is
//! handled in order, then acknowledged on success or left uncommitted on
//! failure so the transport redelivers it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, instrument, warn};

use crate::cascade::Cascade;
use crate::consumer::{InboundEvent, StreamMessage};
use crate::errors::EngineError;

/// Source of inbound events.
///
/// Implemented by the Kafka consumer and by test doubles.
#[async_trait]
pub trait Consumer: Send + Sync {
    fn subscribe(&self) -> Result<(), EngineError>;

    /// Send batches on `sender` until the stream ends or `shutdown` fires,
    /// committing what the orchestrator acknowledges on `ack_receiver`.
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        ack_receiver: mpsc::Receiver<StreamMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), EngineError>;
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the message channel buffer.
    pub channel_buffer_size: usize,
    /// Interval between progress log lines.
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            progress_interval: Duration::from_secs(10),
        }
    }
}

pub struct Orchestrator {
    consumer: Arc<dyn Consumer>,
    cascade: Cascade,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
    /// Inbound events handled since startup.
    total_events: Arc<AtomicU64>,
    /// Notifications routed since startup, cascaded ones included.
    total_routed: Arc<AtomicU64>,
    total_dropped: Arc<AtomicU64>,
}

impl Orchestrator {
    pub fn new(consumer: Arc<dyn Consumer>, cascade: Cascade) -> Self {
        Self::with_config(consumer, cascade, OrchestratorConfig::default())
    }

    pub fn with_config(
        consumer: Arc<dyn Consumer>,
        cascade: Cascade,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            consumer,
            cascade,
            config,
            shutdown_tx,
            total_events: Arc::new(AtomicU64::new(0)),
            total_routed: Arc::new(AtomicU64::new(0)),
            total_dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run until the consumer ends, ctrl-c, or [`shutdown`](Self::shutdown).
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> Result<(), EngineError> {
        info!("Starting aqueduct engine orchestrator");

        self.consumer.subscribe()?;

        let (event_transmitter, mut event_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);
        let (ack_transmitter, ack_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);

        let consumer = self.consumer.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let consumer_handle = tokio::spawn(async move {
            if let Err(e) = consumer
                .run(event_transmitter, ack_receiver, shutdown_rx)
                .await
            {
                error!(error = %e, "Consumer error");
            }
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut progress_timer = interval(self.config.progress_interval);
        progress_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut prev_events: u64 = 0;
        let mut prev_time = std::time::Instant::now();

        loop {
            tokio::select! {
                msg = event_receiver.recv() => {
                    match msg {
                        Some(StreamMessage::Events { events, offsets }) => {
                            debug!(
                                event_count = events.len(),
                                offset_count = offsets.len(),
                                "Received events from consumer"
                            );
                            let ack = match self.process_events(events).await {
                                Ok(()) => StreamMessage::Acknowledgment {
                                    offsets,
                                    success: true,
                                    error: None,
                                },
                                Err(e) => {
                                    error!(error = %e, "Failed to process events. Sending NACK to broker");
                                    StreamMessage::Acknowledgment {
                                        offsets,
                                        success: false,
                                        error: Some(e.to_string()),
                                    }
                                }
                            };
                            let _ = ack_transmitter.send(ack).await;
                        }
                        Some(StreamMessage::Error(e)) => {
                            error!(error = %e, "Received error from consumer");
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Consumer stream ended");
                            break;
                        }
                        Some(StreamMessage::Acknowledgment { .. }) => {
                            warn!("Received acknowledgment on event channel (should be on ack channel)");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Orchestrator shutdown requested");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                _ = progress_timer.tick() => {
                    let events = self.total_events.load(Ordering::Relaxed);
                    let now = std::time::Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();
                    let events_per_sec = if elapsed_secs > 0.0 {
                        (events.saturating_sub(prev_events) as f64) / elapsed_secs
                    } else {
                        0.0
                    };

                    info!(
                        events_handled = events,
                        notifications_routed = self.total_routed.load(Ordering::Relaxed),
                        dropped_by_hop_guard = self.total_dropped.load(Ordering::Relaxed),
                        events_per_sec = format!("{:.2}", events_per_sec),
                        "Processing progress"
                    );

                    prev_events = events;
                    prev_time = now;
                }
            }
        }

        drop(ack_transmitter);
        let _ = consumer_handle.await;

        info!(
            total_events = self.total_events.load(Ordering::Relaxed),
            total_routed = self.total_routed.load(Ordering::Relaxed),
            total_dropped = self.total_dropped.load(Ordering::Relaxed),
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    /// Handle a batch in order. The first failure aborts the batch so that
    /// none of it is acknowledged.
    async fn process_events(&self, events: Vec<InboundEvent>) -> Result<(), EngineError> {
        for event in events {
            let twin_id = event.twin_id().to_string();
            let report = self.cascade.handle(event).await.map_err(|e| {
                error!(twin_id = %twin_id, error = %e, "Failed to handle event");
                e
            })?;

            self.total_events.fetch_add(1, Ordering::Relaxed);
            self.total_routed
                .fetch_add(report.routed as u64, Ordering::Relaxed);
            self.total_dropped
                .fetch_add(report.dropped as u64, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Sender that triggers shutdown from another task while `run` holds the
    /// orchestrator.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub fn events_handled(&self) -> u64 {
        self.total_events.load(Ordering::Relaxed)
    }
}
