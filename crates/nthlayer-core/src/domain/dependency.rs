//! Dependency edges and the merged service graph.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::ServiceIdentity;

/// Kind of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepType {
    /// Another first-party service.
    Service,
    /// Database or cache.
    Datastore,
    /// Message queue or stream.
    Queue,
    /// Third-party API.
    External,
    /// Shared infrastructure (DNS, LB, ...).
    Infra,
}

impl DepType {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DepType::Service => "service",
            DepType::Datastore => "datastore",
            DepType::Queue => "queue",
            DepType::External => "external",
            DepType::Infra => "infra",
        }
    }
}

/// A raw edge as reported by a single provider, before identity resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredDependency {
    /// Raw source service name, in the provider's vocabulary.
    pub source_service: String,
    /// Raw target service name, in the provider's vocabulary.
    pub target_service: String,
    /// Name of the reporting provider.
    pub provider: String,
    /// Edge kind.
    pub dep_type: DepType,
    /// Provider-assigned confidence in [0, 1].
    pub confidence: f64,
    /// Provider-specific metadata (rates, policy names, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl DiscoveredDependency {
    /// Create an edge with empty metadata. Confidence is clamped to [0, 1].
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        provider: impl Into<String>,
        dep_type: DepType,
        confidence: f64,
    ) -> Self {
        Self {
            source_service: source.into(),
            target_service: target.into(),
            provider: provider.into(),
            dep_type,
            confidence: confidence.clamp(0.0, 1.0),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A canonical merged edge between two resolved identities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDependency {
    /// Canonical name of the source service.
    pub source: String,
    /// Canonical name of the target service.
    pub target: String,
    /// Edge kind.
    pub dep_type: DepType,
    /// Aggregated confidence: max over providers plus a confirmation bonus,
    /// clamped to 1.0. Non-decreasing as providers confirm the edge.
    pub confidence: f64,
    /// Providers that reported this edge, sorted.
    pub providers: BTreeSet<String>,
    /// Merged metadata. Providers are merged in name order, later wins.
    pub metadata: BTreeMap<String, String>,
}

/// Snapshot of the merged dependency graph.
///
/// Both maps are ordered, so iteration is deterministic and artifact
/// generation downstream is byte-stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// All identities referenced by edges, keyed by canonical name.
    pub identities: BTreeMap<String, ServiceIdentity>,
    /// Merged edges, sorted by (source, target, dep_type).
    pub edges: Vec<ResolvedDependency>,
    /// When the snapshot was assembled.
    pub built_at: DateTime<Utc>,
    /// Names of providers that contributed, sorted.
    pub providers_used: BTreeSet<String>,
}

impl DependencyGraph {
    /// An empty graph.
    pub fn empty() -> Self {
        Self {
            identities: BTreeMap::new(),
            edges: Vec::new(),
            built_at: Utc::now(),
            providers_used: BTreeSet::new(),
        }
    }

    /// Edges where `service` is the source.
    pub fn outbound<'a>(&'a self, service: &'a str) -> impl Iterator<Item = &'a ResolvedDependency> + 'a {
        self.edges.iter().filter(move |e| e.source == service)
    }

    /// Edges where `service` is the target.
    pub fn inbound<'a>(&'a self, service: &'a str) -> impl Iterator<Item = &'a ResolvedDependency> + 'a {
        self.edges.iter().filter(move |e| e.target == service)
    }
}

/// Health probe result for a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Whether the last probe succeeded.
    pub healthy: bool,
    /// Human-readable status.
    pub message: String,
    /// Probe round-trip, when measured.
    pub latency_ms: Option<u64>,
}

impl ProviderHealth {
    /// A healthy result.
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            healthy: true,
            message: message.into(),
            latency_ms: None,
        }
    }

    /// An unhealthy result.
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
            latency_ms: None,
        }
    }

    /// Attach the probe latency.
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}
