//! Metric discovery: what series exist for a service, and range queries
//! over the error-budget series drift analysis consumes.

mod prometheus;

pub use prometheus::PrometheusDiscovery;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{BudgetSeries, Technology};
use crate::error::MetricDiscoveryError;

/// Access to a PromQL-compatible metrics backend.
#[async_trait]
pub trait MetricDiscovery: Send + Sync {
    /// All metric names with series carrying this service's label. Cached by
    /// implementations.
    async fn discover_for_service(
        &self,
        service: &str,
    ) -> Result<BTreeSet<String>, MetricDiscoveryError>;

    /// All values of a label across the backend.
    async fn label_values(&self, label: &str) -> Result<BTreeSet<String>, MetricDiscoveryError>;

    /// Evaluate a range query and return the first series as a budget series.
    async fn range_query(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_seconds: u64,
    ) -> Result<BudgetSeries, MetricDiscoveryError>;
}

/// Classify a metric family by name. Deterministic: the same name always
/// lands in the same bucket; unknown names land in `Other`.
pub fn classify_metric(name: &str) -> Technology {
    const PREFIXES: &[(&str, Technology)] = &[
        ("redis_", Technology::Redis),
        ("pg_", Technology::Postgres),
        ("postgres_", Technology::Postgres),
        ("postgresql_", Technology::Postgres),
        ("mysql_", Technology::Mysql),
        ("kafka_", Technology::Kafka),
        ("rabbitmq_", Technology::Rabbitmq),
        ("jvm_", Technology::Jvm),
        ("go_", Technology::Go),
        ("nodejs_", Technology::Node),
        ("grpc_", Technology::Grpc),
        ("http_", Technology::Http),
    ];
    for (prefix, technology) in PREFIXES {
        if name.starts_with(prefix) {
            return *technology;
        }
    }
    Technology::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        assert_eq!(classify_metric("redis_connected_clients"), Technology::Redis);
        assert_eq!(classify_metric("pg_stat_activity_count"), Technology::Postgres);
        assert_eq!(classify_metric("kafka_consumergroup_lag"), Technology::Kafka);
        assert_eq!(classify_metric("jvm_memory_used_bytes"), Technology::Jvm);
        assert_eq!(classify_metric("http_requests_total"), Technology::Http);
        assert_eq!(classify_metric("grpc_server_handled_total"), Technology::Grpc);
    }

    #[test]
    fn test_unknown_metrics_fall_into_other() {
        assert_eq!(classify_metric("custom_business_total"), Technology::Other);
        assert_eq!(classify_metric(""), Technology::Other);
    }

    #[test]
    fn test_classification_is_prefix_ordered() {
        // "go_" must not swallow names like "gossip_..".
        assert_eq!(classify_metric("gossip_rounds_total"), Technology::Other);
    }
}
