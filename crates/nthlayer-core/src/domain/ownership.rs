//! Ownership signals and aggregated attribution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Where an ownership signal came from. The weight table encodes how much
/// each source is trusted relative to the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipSource {
    /// Declared in the ServiceSpec.
    Declared,
    /// Primary on-call / incident escalation policy.
    IncidentEscalation,
    /// Secondary on-call rotation.
    SecondaryOnCall,
    /// Service portal / catalog entry.
    Portal,
    /// CODEOWNERS file in the repository.
    CodeOwners,
    /// Cloud resource tags.
    CloudTags,
    /// Orchestrator labels (Kubernetes).
    OrchestratorLabels,
    /// Chat channel naming convention.
    ChatConvention,
    /// Cost-center accounting records.
    CostCenter,
    /// Inferred from recent commit activity.
    GitActivity,
}

impl OwnershipSource {
    /// Trust weight applied to the signal's own confidence.
    pub fn weight(&self) -> f64 {
        match self {
            OwnershipSource::Declared => 1.00,
            OwnershipSource::IncidentEscalation => 0.95,
            OwnershipSource::SecondaryOnCall => 0.90,
            OwnershipSource::Portal => 0.90,
            OwnershipSource::CodeOwners => 0.85,
            OwnershipSource::CloudTags => 0.80,
            OwnershipSource::OrchestratorLabels => 0.75,
            OwnershipSource::CostCenter => 0.70,
            OwnershipSource::ChatConvention => 0.60,
            OwnershipSource::GitActivity => 0.40,
        }
    }

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnershipSource::Declared => "declared",
            OwnershipSource::IncidentEscalation => "incident_escalation",
            OwnershipSource::SecondaryOnCall => "secondary_on_call",
            OwnershipSource::Portal => "portal",
            OwnershipSource::CodeOwners => "code_owners",
            OwnershipSource::CloudTags => "cloud_tags",
            OwnershipSource::OrchestratorLabels => "orchestrator_labels",
            OwnershipSource::ChatConvention => "chat_convention",
            OwnershipSource::CostCenter => "cost_center",
            OwnershipSource::GitActivity => "git_activity",
        }
    }
}

/// Kind of owner named by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    /// A team handle.
    Team,
    /// An individual.
    User,
    /// Unknown or unparseable.
    Unknown,
}

/// One provider's opinion about who owns a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipSignal {
    /// Signal source.
    pub source: OwnershipSource,
    /// Owner handle as reported.
    pub owner: String,
    /// Team or individual.
    pub owner_type: OwnerType,
    /// Provider's own confidence in [0, 1], before weighting.
    pub confidence: f64,
    /// Contact hints and provenance (chat, email, escalation_policy, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl OwnershipSignal {
    /// Create a team-owner signal.
    pub fn team(source: OwnershipSource, owner: impl Into<String>, confidence: f64) -> Self {
        Self {
            source,
            owner: owner.into(),
            owner_type: OwnerType::Team,
            confidence: confidence.clamp(0.0, 1.0),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Weighted score: confidence x source weight.
    pub fn score(&self) -> f64 {
        (self.confidence * self.source.weight()).clamp(0.0, 1.0)
    }
}

/// Contact routes harvested from signal metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contacts {
    /// Chat channel, e.g. "#payments-oncall".
    pub chat: Option<String>,
    /// Team email.
    pub email: Option<String>,
    /// Pager escalation policy identifier.
    pub escalation: Option<String>,
}

impl Contacts {
    /// True when no contact route was found.
    pub fn is_empty(&self) -> bool {
        self.chat.is_none() && self.email.is_none() && self.escalation.is_none()
    }
}

/// Aggregated ownership resolution for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipAttribution {
    /// Canonical service name.
    pub service: String,
    /// Winning owner handle.
    pub owner: String,
    /// Team or individual.
    pub owner_type: OwnerType,
    /// Weighted score of the winning signal; 0.0 for the default fallback.
    pub confidence: f64,
    /// Source of the winning signal, None for the default fallback.
    pub source: Option<OwnershipSource>,
    /// Every signal considered, sorted by descending score.
    pub signals: Vec<OwnershipSignal>,
    /// Contact routes harvested across all signals.
    pub contacts: Contacts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_table_ordering() {
        // Declared beats everything; git activity trusts least.
        assert!(OwnershipSource::Declared.weight() > OwnershipSource::IncidentEscalation.weight());
        assert!(OwnershipSource::ChatConvention.weight() > OwnershipSource::GitActivity.weight());
    }

    #[test]
    fn test_score_is_clamped() {
        let mut signal = OwnershipSignal::team(OwnershipSource::Declared, "payments", 1.0);
        signal.confidence = 5.0_f64.clamp(0.0, 1.0);
        assert!(signal.score() <= 1.0);
    }
}
