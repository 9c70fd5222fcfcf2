//! Monitoring intents and the artifacts resolving them produces.
//!
//! An intent names a monitoring concern ("connection pool utilization")
//! bound to a technology and an expected metric type. At generation time the
//! resolver walks a fallback chain of candidate metric families and emits
//! either a concrete panel or a guidance card.

use serde::{Deserialize, Serialize};

/// Technology family a metric or intent belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Technology {
    Http,
    Grpc,
    Postgres,
    Mysql,
    Redis,
    Kafka,
    Rabbitmq,
    Jvm,
    Go,
    Node,
    /// Anything the classifier does not recognize.
    Other,
}

impl Technology {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::Http => "http",
            Technology::Grpc => "grpc",
            Technology::Postgres => "postgres",
            Technology::Mysql => "mysql",
            Technology::Redis => "redis",
            Technology::Kafka => "kafka",
            Technology::Rabbitmq => "rabbitmq",
            Technology::Jvm => "jvm",
            Technology::Go => "go",
            Technology::Node => "node",
            Technology::Other => "other",
        }
    }

    /// Map a declared dependency technology string to a family.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "http" => Technology::Http,
            "grpc" => Technology::Grpc,
            "postgres" | "postgresql" => Technology::Postgres,
            "mysql" | "mariadb" => Technology::Mysql,
            "redis" => Technology::Redis,
            "kafka" => Technology::Kafka,
            "rabbitmq" | "amqp" => Technology::Rabbitmq,
            "jvm" | "java" => Technology::Jvm,
            "go" | "golang" => Technology::Go,
            "node" | "nodejs" => Technology::Node,
            _ => Technology::Other,
        }
    }
}

/// Expected Prometheus metric type of an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

/// One candidate metric family in a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricCandidate {
    /// Metric name to look for in the discovered set.
    pub metric: String,
    /// Query template. `$metric`, `$service` and `$window` are substituted.
    pub expr_template: String,
}

impl MetricCandidate {
    /// Shorthand constructor.
    pub fn new(metric: impl Into<String>, expr_template: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            expr_template: expr_template.into(),
        }
    }
}

/// An abstract dashboard building block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Stable intent name, e.g. "redis_hit_rate".
    pub name: String,
    /// Technology this intent monitors.
    pub technology: Technology,
    /// Expected metric type; histograms render as quantile queries.
    pub metric_type: MetricType,
    /// Ordered fallback chain. The first candidate whose metric exists wins.
    pub candidates: Vec<MetricCandidate>,
    /// Shown when nothing in the chain resolves: how to install the exporter.
    pub guidance: String,
}

/// Outcome status of resolving one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    /// First candidate (or operator override) matched.
    Resolved,
    /// A later candidate in the chain matched.
    Fallback,
    /// Nothing matched; render guidance.
    Unresolved,
}

/// Outcome of resolving one intent against discovered metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Resolution status.
    pub status: ResolutionStatus,
    /// Concrete query expression, when resolved.
    pub expr: Option<String>,
    /// The metric family that matched, when resolved via discovery.
    pub metric: Option<String>,
    /// Where the expression came from: "override", the metric name, or "none".
    pub provenance: String,
    /// Exporter guidance, when unresolved.
    pub guidance: Option<String>,
}

impl ResolutionResult {
    /// An unresolved result carrying the intent's guidance.
    pub fn unresolved(guidance: impl Into<String>) -> Self {
        Self {
            status: ResolutionStatus::Unresolved,
            expr: None,
            metric: None,
            provenance: "none".to_string(),
            guidance: Some(guidance.into()),
        }
    }
}

/// Visualization hint for a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelKind {
    /// Time-series graph.
    Graph,
    /// Single-stat readout.
    Stat,
    /// Markdown guidance card.
    Text,
}

/// Declarative panel request paired with an intent at catalog load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSpec {
    /// Panel title.
    pub title: String,
    /// Visualization hint.
    pub kind: PanelKind,
    /// Y-axis unit hint, e.g. "ops", "percent", "seconds".
    pub unit: String,
}

/// A generated panel: either a concrete target or a guidance card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    /// Deterministic panel id (position within the dashboard).
    pub id: u32,
    /// Panel title.
    pub title: String,
    /// Visualization hint.
    pub kind: PanelKind,
    /// Query expression; None for guidance cards.
    pub expr: Option<String>,
    /// Unit hint.
    pub unit: String,
    /// Markdown body for guidance cards.
    pub text: Option<String>,
}

/// A generated dashboard artifact, serialized to JSON for the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    /// Dashboard title.
    pub title: String,
    /// Canonical service name.
    pub service: String,
    /// Panels in stable catalog order.
    pub panels: Vec<Panel>,
    /// Tags for the dashboard browser, sorted.
    pub tags: Vec<String>,
}
