//! Consumer module for the engine ingest.
//!
//! Receives change notifications and delayed updates from Kafka.

mod hold_queue;
mod kafka_consumer;
mod messages;
mod offsets;

pub use hold_queue::HoldQueue;
pub use kafka_consumer::KafkaConsumer;
pub use messages::{
    decode_change, decode_delayed, ChangeHeaders, InboundEvent, StreamMessage,
};
pub use offsets::{MessageOffset, OffsetTracker};
