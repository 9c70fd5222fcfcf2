//! Canonical service identity across heterogeneous providers.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an identity came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    /// Declared in a ServiceSpec.
    Declared,
    /// First seen through a discovery provider.
    Discovered,
}

/// Canonical identity for a service, merged across provider sightings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    /// Canonical name: lowercase, `-`-separated, environment/version
    /// suffixes stripped.
    pub canonical_name: String,

    /// Alternative names this identity is known by (raw provider names,
    /// normalization variants).
    pub aliases: BTreeSet<String>,

    /// Raw identifier per provider, keyed by provider name.
    pub external_ids: BTreeMap<String, String>,

    /// Correlation attributes (repository, owner, team, chat channel, ...).
    pub attributes: BTreeMap<String, String>,

    /// Confidence that this identity is a real, distinct service.
    pub confidence: f64,

    /// Declared or discovered.
    pub source: IdentitySource,

    /// First sighting.
    pub first_seen: DateTime<Utc>,

    /// Most recent sighting or merge.
    pub last_seen: DateTime<Utc>,
}

impl ServiceIdentity {
    /// Create a declared identity at full confidence.
    pub fn declared(canonical_name: impl Into<String>) -> Self {
        Self::new(canonical_name, IdentitySource::Declared, 1.0)
    }

    /// Create a discovered identity at the standard discovery confidence.
    pub fn discovered(canonical_name: impl Into<String>) -> Self {
        Self::new(canonical_name, IdentitySource::Discovered, 0.7)
    }

    fn new(canonical_name: impl Into<String>, source: IdentitySource, confidence: f64) -> Self {
        let now = Utc::now();
        Self {
            canonical_name: canonical_name.into(),
            aliases: BTreeSet::new(),
            external_ids: BTreeMap::new(),
            attributes: BTreeMap::new(),
            confidence,
            source,
            first_seen: now,
            last_seen: now,
        }
    }

    /// Record the raw name this provider uses for the service.
    pub fn with_external_id(
        mut self,
        provider: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        let raw = raw.into();
        self.aliases.insert(raw.clone());
        self.external_ids.insert(provider.into(), raw);
        self
    }

    /// Add an alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    /// Add a correlation attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// How a resolution query matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Operator-supplied `raw@provider` mapping.
    Explicit,
    /// The provider's external id matched.
    ExternalId,
    /// Exact canonical-name match.
    Exact,
    /// Alias match.
    Alias,
    /// Match after name normalization.
    Normalized,
    /// Fuzzy similarity above threshold.
    Fuzzy,
    /// Attribute correlation (repository, owner, ...).
    Attribute,
    /// No match; `identity` is None and confidence 0.
    Unresolved,
}

/// Result of one resolution query. A value object; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityMatch {
    /// The raw query string.
    pub query: String,
    /// Provider context supplied with the query, if any.
    pub provider: Option<String>,
    /// The matched identity, or None when unresolved.
    pub identity: Option<ServiceIdentity>,
    /// How the match was made.
    pub match_type: MatchType,
    /// Confidence in the match, 0.0 when unresolved.
    pub confidence: f64,
    /// Near-miss candidates as (canonical_name, similarity) pairs, best first.
    pub alternatives: Vec<(String, f64)>,
}

impl IdentityMatch {
    /// An unresolved result for the given query.
    pub fn unresolved(query: impl Into<String>, provider: Option<&str>) -> Self {
        Self {
            query: query.into(),
            provider: provider.map(str::to_string),
            identity: None,
            match_type: MatchType::Unresolved,
            confidence: 0.0,
            alternatives: Vec::new(),
        }
    }

    /// Whether the query resolved to an identity.
    pub fn is_resolved(&self) -> bool {
        self.identity.is_some()
    }
}
