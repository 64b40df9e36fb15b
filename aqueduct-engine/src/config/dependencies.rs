//! Dependency initialization and wiring for the engine.

use std::env;
use std::fs;
use std::sync::Arc;

use tracing::info;

use aqueduct_kafka::{
    JsonProducer, KafkaHistorySink, KafkaUpdateScheduler, ProducerConfig, TOPIC_TWIN_HISTORY,
    TOPIC_TWIN_UPDATES,
};
use aqueduct_repository::{MemoryGraph, Topology};

use crate::cascade::{Cascade, DEFAULT_MAX_HOPS};
use crate::consumer::KafkaConsumer;
use crate::orchestrator::Orchestrator;
use crate::router::EventRouter;
use crate::ServiceError;

/// Default Kafka broker address.
const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";

/// Default Kafka consumer group ID.
const DEFAULT_KAFKA_GROUP_ID: &str = "aqueduct-engine";

/// Default graph instance name stamped on scheduled updates.
const DEFAULT_GRAPH_INSTANCE: &str = "aqueduct.local";

/// Settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub kafka_broker: String,
    pub kafka_group_id: String,
    pub topology_path: String,
    pub graph_instance: String,
    pub max_hops: u32,
    pub history_enabled: bool,
}

impl EngineSettings {
    /// Read settings through `lookup`, which returns a variable's value.
    ///
    /// # Environment Variables
    ///
    /// - `KAFKA_BROKER`: Kafka broker address (default: localhost:9092)
    /// - `KAFKA_GROUP_ID`: Consumer group ID (default: aqueduct-engine)
    /// - `TOPOLOGY_PATH`: JSON seed of twins and relationships (required)
    /// - `GRAPH_INSTANCE`: Graph instance name (default: aqueduct.local)
    /// - `MAX_PROPAGATION_HOPS`: Cascade depth limit (default: 64)
    /// - `HISTORY_ENABLED`: Publish notification history (default: true)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServiceError> {
        let topology_path = lookup("TOPOLOGY_PATH")
            .ok_or_else(|| ServiceError::config("TOPOLOGY_PATH is not set"))?;
        let max_hops = match lookup("MAX_PROPAGATION_HOPS") {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                ServiceError::config(format!("Invalid MAX_PROPAGATION_HOPS '{}': {}", raw, e))
            })?,
            None => DEFAULT_MAX_HOPS,
        };
        let history_enabled = lookup("HISTORY_ENABLED")
            .map(|raw| !matches!(raw.to_lowercase().as_str(), "false" | "0" | "no" | "off"))
            .unwrap_or(true);

        Ok(Self {
            kafka_broker: lookup("KAFKA_BROKER").unwrap_or_else(|| DEFAULT_KAFKA_BROKER.to_string()),
            kafka_group_id: lookup("KAFKA_GROUP_ID")
                .unwrap_or_else(|| DEFAULT_KAFKA_GROUP_ID.to_string()),
            topology_path,
            graph_instance: lookup("GRAPH_INSTANCE")
                .unwrap_or_else(|| DEFAULT_GRAPH_INSTANCE.to_string()),
            max_hops,
            history_enabled,
        })
    }

    pub fn from_env() -> Result<Self, ServiceError> {
        Self::from_lookup(|key| env::var(key).ok())
    }
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    pub async fn new() -> Result<Self, ServiceError> {
        let settings = EngineSettings::from_env()?;

        info!(
            kafka_broker = %settings.kafka_broker,
            kafka_group_id = %settings.kafka_group_id,
            topology_path = %settings.topology_path,
            graph_instance = %settings.graph_instance,
            max_hops = settings.max_hops,
            history_enabled = settings.history_enabled,
            "Initializing dependencies"
        );

        let seed = fs::read_to_string(&settings.topology_path).map_err(|e| {
            ServiceError::config(format!(
                "Failed to read topology '{}': {}",
                settings.topology_path, e
            ))
        })?;
        let topology = Topology::from_json_str(&seed)
            .map_err(|e| ServiceError::config(format!("Failed to decode topology: {}", e)))?;
        let graph = Arc::new(
            MemoryGraph::from_topology(settings.graph_instance.clone(), &topology)
                .map_err(|e| ServiceError::config(format!("Failed to load topology: {}", e)))?,
        );
        info!(twins = graph.twin_count(), "Twin graph loaded");

        let producer_config = ProducerConfig::from_env(&settings.kafka_broker, "aqueduct-engine");
        let updates = JsonProducer::new(&producer_config, TOPIC_TWIN_UPDATES).map_err(|e| {
            ServiceError::config(format!("Failed to create update producer: {}", e))
        })?;

        let mut router = EventRouter::new(graph.clone(), Arc::new(KafkaUpdateScheduler::new(updates)));
        if settings.history_enabled {
            let history = JsonProducer::new(&producer_config, TOPIC_TWIN_HISTORY).map_err(|e| {
                ServiceError::config(format!("Failed to create history producer: {}", e))
            })?;
            router = router.with_history(Arc::new(KafkaHistorySink::new(history)));
        }

        let cascade = Cascade::new(router, graph).with_max_hops(settings.max_hops);

        let consumer = KafkaConsumer::new(&settings.kafka_broker, &settings.kafka_group_id)
            .map_err(|e| ServiceError::config(format!("Failed to create Kafka consumer: {}", e)))?;
        info!("Kafka consumer created");

        let orchestrator = Orchestrator::new(Arc::new(consumer), cascade);

        Ok(Self { orchestrator })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings =
            EngineSettings::from_lookup(lookup(&[("TOPOLOGY_PATH", "net.json")])).unwrap();
        assert_eq!(settings.kafka_broker, "localhost:9092");
        assert_eq!(settings.kafka_group_id, "aqueduct-engine");
        assert_eq!(settings.graph_instance, "aqueduct.local");
        assert_eq!(settings.max_hops, 64);
        assert!(settings.history_enabled);
    }

    #[test]
    fn test_topology_path_is_required() {
        assert!(matches!(
            EngineSettings::from_lookup(lookup(&[])),
            Err(ServiceError::ConfigError(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let settings = EngineSettings::from_lookup(lookup(&[
            ("TOPOLOGY_PATH", "net.json"),
            ("MAX_PROPAGATION_HOPS", "8"),
            ("HISTORY_ENABLED", "false"),
        ]))
        .unwrap();
        assert_eq!(settings.max_hops, 8);
        assert!(!settings.history_enabled);

        assert!(EngineSettings::from_lookup(lookup(&[
            ("TOPOLOGY_PATH", "net.json"),
            ("MAX_PROPAGATION_HOPS", "many"),
        ]))
        .is_err());
    }
}
