//! Static intent catalog: per technology, the panels a dashboard should
//! show and the metric families that can back them.
//!
//! Candidate order within an intent is the fallback chain; the first family
//! present in the discovered set wins. Exporter guidance is rendered when
//! nothing in the chain exists.

use crate::domain::{
    Intent, MetricCandidate, MetricType, PanelKind, PanelSpec, ServiceSpec, ServiceType,
    Technology,
};

fn intent(
    name: &str,
    technology: Technology,
    metric_type: MetricType,
    candidates: Vec<MetricCandidate>,
    guidance: &str,
) -> Intent {
    Intent {
        name: name.to_string(),
        technology,
        metric_type,
        candidates,
        guidance: guidance.to_string(),
    }
}

fn spec(title: &str, kind: PanelKind, unit: &str) -> PanelSpec {
    PanelSpec {
        title: title.to_string(),
        kind,
        unit: unit.to_string(),
    }
}

/// Ordered panel/intent pairs for one technology.
pub fn intents_for(technology: Technology) -> Vec<(PanelSpec, Intent)> {
    match technology {
        Technology::Http => vec![
            (
                spec("Request rate", PanelKind::Graph, "ops"),
                intent(
                    "http_request_rate",
                    Technology::Http,
                    MetricType::Counter,
                    vec![
                        MetricCandidate::new(
                            "http_requests_total",
                            "sum(rate($metric{service=\"$service\"}[$window]))",
                        ),
                        MetricCandidate::new(
                            "http_server_requests_seconds_count",
                            "sum(rate($metric{service=\"$service\"}[$window]))",
                        ),
                    ],
                    "No HTTP request metrics found. Instrument the service with a \
                     client library exposing http_requests_total, or front it with \
                     an ingress that exports per-service request counts.",
                ),
            ),
            (
                spec("Error ratio", PanelKind::Graph, "percentunit"),
                intent(
                    "http_error_ratio",
                    Technology::Http,
                    MetricType::Counter,
                    vec![MetricCandidate::new(
                        "http_requests_total",
                        "sum(rate($metric{service=\"$service\",code=~\"5..\"}[$window])) \
                         / sum(rate($metric{service=\"$service\"}[$window]))",
                    )],
                    "No HTTP request metrics found, so an error ratio cannot be \
                     derived. Export http_requests_total with a status-code label.",
                ),
            ),
            (
                spec("Latency p95", PanelKind::Graph, "seconds"),
                intent(
                    "http_latency_p95",
                    Technology::Http,
                    MetricType::Histogram,
                    vec![
                        MetricCandidate::new(
                            "http_request_duration_seconds_bucket",
                            "histogram_quantile(0.95, sum by (le) \
                             (rate($metric{service=\"$service\"}[$window])))",
                        ),
                        MetricCandidate::new(
                            "http_server_requests_seconds_bucket",
                            "histogram_quantile(0.95, sum by (le) \
                             (rate($metric{service=\"$service\"}[$window])))",
                        ),
                    ],
                    "No HTTP latency histogram found. Export \
                     http_request_duration_seconds as a histogram to unlock \
                     quantile panels.",
                ),
            ),
        ],
        Technology::Grpc => vec![
            (
                spec("gRPC call rate", PanelKind::Graph, "ops"),
                intent(
                    "grpc_call_rate",
                    Technology::Grpc,
                    MetricType::Counter,
                    vec![MetricCandidate::new(
                        "grpc_server_handled_total",
                        "sum(rate($metric{service=\"$service\"}[$window]))",
                    )],
                    "No gRPC server metrics found. Enable the grpc-prometheus \
                     interceptor to export grpc_server_handled_total.",
                ),
            ),
            (
                spec("gRPC error ratio", PanelKind::Graph, "percentunit"),
                intent(
                    "grpc_error_ratio",
                    Technology::Grpc,
                    MetricType::Counter,
                    vec![MetricCandidate::new(
                        "grpc_server_handled_total",
                        "sum(rate($metric{service=\"$service\",grpc_code!=\"OK\"}[$window])) \
                         / sum(rate($metric{service=\"$service\"}[$window]))",
                    )],
                    "No gRPC server metrics found, so an error ratio cannot be \
                     derived. Enable the grpc-prometheus interceptor.",
                ),
            ),
        ],
        Technology::Postgres => vec![
            (
                spec("Connection pool utilization", PanelKind::Graph, "percentunit"),
                intent(
                    "postgres_pool_utilization",
                    Technology::Postgres,
                    MetricType::Gauge,
                    vec![
                        MetricCandidate::new(
                            "pg_stat_activity_count",
                            "sum($metric{service=\"$service\"}) / \
                             sum(pg_settings_max_connections{service=\"$service\"})",
                        ),
                        MetricCandidate::new(
                            "pg_stat_database_numbackends",
                            "sum($metric{service=\"$service\"}) / \
                             sum(pg_settings_max_connections{service=\"$service\"})",
                        ),
                    ],
                    "No PostgreSQL metrics found. Deploy postgres_exporter \
                     (prometheus-community/postgres_exporter) with DATA_SOURCE_NAME \
                     pointing at the instance and relabel it with this service.",
                ),
            ),
            (
                spec("Transaction rate", PanelKind::Graph, "ops"),
                intent(
                    "postgres_txn_rate",
                    Technology::Postgres,
                    MetricType::Counter,
                    vec![MetricCandidate::new(
                        "pg_stat_database_xact_commit",
                        "sum(rate($metric{service=\"$service\"}[$window]))",
                    )],
                    "No PostgreSQL metrics found. Deploy postgres_exporter to \
                     expose pg_stat_database_* counters.",
                ),
            ),
        ],
        Technology::Mysql => vec![
            (
                spec("Connections", PanelKind::Graph, "short"),
                intent(
                    "mysql_connections",
                    Technology::Mysql,
                    MetricType::Gauge,
                    vec![MetricCandidate::new(
                        "mysql_global_status_threads_connected",
                        "sum($metric{service=\"$service\"})",
                    )],
                    "No MySQL metrics found. Deploy mysqld_exporter \
                     (prometheus/mysqld_exporter) against the instance.",
                ),
            ),
            (
                spec("Slow queries", PanelKind::Graph, "ops"),
                intent(
                    "mysql_slow_queries",
                    Technology::Mysql,
                    MetricType::Counter,
                    vec![MetricCandidate::new(
                        "mysql_global_status_slow_queries",
                        "sum(rate($metric{service=\"$service\"}[$window]))",
                    )],
                    "No MySQL metrics found. Deploy mysqld_exporter to expose \
                     mysql_global_status_* counters.",
                ),
            ),
        ],
        Technology::Redis => vec![
            (
                spec("Cache hit rate", PanelKind::Graph, "percentunit"),
                intent(
                    "redis_hit_rate",
                    Technology::Redis,
                    MetricType::Counter,
                    vec![MetricCandidate::new(
                        "redis_keyspace_hits_total",
                        "sum(rate($metric{service=\"$service\"}[$window])) / \
                         (sum(rate($metric{service=\"$service\"}[$window])) + \
                         sum(rate(redis_keyspace_misses_total{service=\"$service\"}[$window])))",
                    )],
                    "No Redis metrics found. Deploy redis_exporter \
                     (oliver006/redis_exporter) with REDIS_ADDR pointing at the \
                     instance, then label its series with this service.",
                ),
            ),
            (
                spec("Memory used", PanelKind::Graph, "bytes"),
                intent(
                    "redis_memory",
                    Technology::Redis,
                    MetricType::Gauge,
                    vec![MetricCandidate::new(
                        "redis_memory_used_bytes",
                        "sum($metric{service=\"$service\"})",
                    )],
                    "No Redis metrics found. Deploy redis_exporter to expose \
                     redis_memory_used_bytes.",
                ),
            ),
            (
                spec("Connected clients", PanelKind::Graph, "short"),
                intent(
                    "redis_connections",
                    Technology::Redis,
                    MetricType::Gauge,
                    vec![MetricCandidate::new(
                        "redis_connected_clients",
                        "sum($metric{service=\"$service\"})",
                    )],
                    "No Redis metrics found. Deploy redis_exporter to expose \
                     redis_connected_clients.",
                ),
            ),
        ],
        Technology::Kafka => vec![
            (
                spec("Consumer lag", PanelKind::Graph, "short"),
                intent(
                    "kafka_consumer_lag",
                    Technology::Kafka,
                    MetricType::Gauge,
                    vec![
                        MetricCandidate::new(
                            "kafka_consumergroup_lag",
                            "sum($metric{service=\"$service\"})",
                        ),
                        MetricCandidate::new(
                            "kafka_consumer_lag_sum",
                            "sum($metric{service=\"$service\"})",
                        ),
                    ],
                    "No Kafka consumer metrics found. Deploy kafka_exporter \
                     (danielqsj/kafka_exporter) or kafka-lag-exporter against \
                     the cluster.",
                ),
            ),
            (
                spec("Messages in", PanelKind::Graph, "ops"),
                intent(
                    "kafka_messages_in",
                    Technology::Kafka,
                    MetricType::Counter,
                    vec![MetricCandidate::new(
                        "kafka_topic_partition_current_offset",
                        "sum(rate($metric{service=\"$service\"}[$window]))",
                    )],
                    "No Kafka broker metrics found. Deploy kafka_exporter to \
                     expose per-topic offsets.",
                ),
            ),
        ],
        Technology::Rabbitmq => vec![
            (
                spec("Queue depth", PanelKind::Graph, "short"),
                intent(
                    "rabbitmq_queue_depth",
                    Technology::Rabbitmq,
                    MetricType::Gauge,
                    vec![MetricCandidate::new(
                        "rabbitmq_queue_messages",
                        "sum($metric{service=\"$service\"})",
                    )],
                    "No RabbitMQ metrics found. Enable the built-in \
                     rabbitmq_prometheus plugin on the broker.",
                ),
            ),
        ],
        Technology::Jvm => vec![
            (
                spec("Heap used", PanelKind::Graph, "bytes"),
                intent(
                    "jvm_heap_used",
                    Technology::Jvm,
                    MetricType::Gauge,
                    vec![MetricCandidate::new(
                        "jvm_memory_used_bytes",
                        "sum($metric{service=\"$service\",area=\"heap\"})",
                    )],
                    "No JVM metrics found. Attach the Prometheus JMX exporter or \
                     enable Micrometer's Prometheus registry.",
                ),
            ),
            (
                spec("GC pause p95", PanelKind::Graph, "seconds"),
                intent(
                    "jvm_gc_pause",
                    Technology::Jvm,
                    MetricType::Histogram,
                    vec![MetricCandidate::new(
                        "jvm_gc_pause_seconds_bucket",
                        "histogram_quantile(0.95, sum by (le) \
                         (rate($metric{service=\"$service\"}[$window])))",
                    )],
                    "No JVM GC histogram found. Enable Micrometer's Prometheus \
                     registry to export jvm_gc_pause_seconds.",
                ),
            ),
        ],
        Technology::Go => vec![
            (
                spec("Goroutines", PanelKind::Graph, "short"),
                intent(
                    "go_goroutines",
                    Technology::Go,
                    MetricType::Gauge,
                    vec![MetricCandidate::new(
                        "go_goroutines",
                        "sum($metric{service=\"$service\"})",
                    )],
                    "No Go runtime metrics found. Register \
                     prometheus.NewGoCollector() in the service.",
                ),
            ),
        ],
        Technology::Node => vec![
            (
                spec("Event loop lag", PanelKind::Graph, "seconds"),
                intent(
                    "node_event_loop_lag",
                    Technology::Node,
                    MetricType::Gauge,
                    vec![MetricCandidate::new(
                        "nodejs_eventloop_lag_seconds",
                        "avg($metric{service=\"$service\"})",
                    )],
                    "No Node.js runtime metrics found. Register prom-client's \
                     collectDefaultMetrics() in the service.",
                ),
            ),
        ],
        Technology::Other => Vec::new(),
    }
}

/// Full ordered panel list for a spec: the service's own serving technology
/// first, then each declared dependency technology in sorted order.
pub fn panel_specs_for_spec(spec: &ServiceSpec) -> Vec<(PanelSpec, Intent)> {
    let mut ordered = Vec::new();

    let serving = match spec.service_type {
        ServiceType::Api | ServiceType::Frontend => Some(Technology::Http),
        ServiceType::Worker | ServiceType::Stream | ServiceType::Cron => None,
    };
    if let Some(technology) = serving {
        ordered.extend(intents_for(technology));
    }

    let mut families: Vec<Technology> = spec
        .dependencies
        .iter()
        .filter_map(|dep| dep.technology.as_deref().map(Technology::from_label))
        .filter(|t| *t != Technology::Other && Some(*t) != serving)
        .collect();
    families.sort();
    families.dedup();
    for technology in families {
        ordered.extend(intents_for(technology));
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DependencySpec;

    #[test]
    fn test_catalog_order_is_stable() {
        let a = intents_for(Technology::Redis);
        let b = intents_for(Technology::Redis);
        let names_a: Vec<&str> = a.iter().map(|(_, i)| i.name.as_str()).collect();
        let names_b: Vec<&str> = b.iter().map(|(_, i)| i.name.as_str()).collect();
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn test_histogram_intents_use_quantile_pattern() {
        for technology in [Technology::Http, Technology::Jvm] {
            for (_, intent) in intents_for(technology) {
                if intent.metric_type == MetricType::Histogram {
                    for candidate in &intent.candidates {
                        assert!(
                            candidate.expr_template.contains("histogram_quantile"),
                            "{} lacks quantile query",
                            intent.name
                        );
                        assert!(candidate.expr_template.contains("sum by (le)"));
                    }
                }
            }
        }
    }

    #[test]
    fn test_spec_panels_cover_dependencies() {
        let spec = ServiceSpec::new("checkout").with_dependency(DependencySpec {
            name: "session-cache".to_string(),
            technology: Some("redis".to_string()),
            critical: true,
        });
        let panels = panel_specs_for_spec(&spec);
        assert!(panels.iter().any(|(_, i)| i.technology == Technology::Http));
        assert!(panels.iter().any(|(_, i)| i.technology == Technology::Redis));
    }

    #[test]
    fn test_duplicate_dependency_families_collapse() {
        let spec = ServiceSpec::new("checkout")
            .with_dependency(DependencySpec {
                name: "cache-a".to_string(),
                technology: Some("redis".to_string()),
                critical: false,
            })
            .with_dependency(DependencySpec {
                name: "cache-b".to_string(),
                technology: Some("redis".to_string()),
                critical: false,
            });
        let panels = panel_specs_for_spec(&spec);
        let redis_hit_panels = panels
            .iter()
            .filter(|(_, i)| i.name == "redis_hit_rate")
            .count();
        assert_eq!(redis_hit_panels, 1);
    }
}
