//! Generated artifacts, plans, and apply outcomes.

use serde::{Deserialize, Serialize};

/// Kind of a generated artifact. Generation order follows the enum order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Prometheus recording rules for SLI/budget series.
    RecordingRules,
    /// Prometheus alert rules.
    AlertRules,
    /// Grafana-style dashboard JSON.
    Dashboard,
    /// SLO registry record.
    SloRecord,
    /// Service-directory entry (ownership, dependencies, tier).
    DirectoryEntry,
}

impl ArtifactKind {
    /// Stable snake_case name, used in plan output and filenames.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::RecordingRules => "recording_rules",
            ArtifactKind::AlertRules => "alert_rules",
            ArtifactKind::Dashboard => "dashboard",
            ArtifactKind::SloRecord => "slo_record",
            ArtifactKind::DirectoryEntry => "directory_entry",
        }
    }

    /// Deterministic filename within the service's artifact directory.
    pub fn filename(&self) -> &'static str {
        match self {
            ArtifactKind::RecordingRules => "recording-rules.yaml",
            ArtifactKind::AlertRules => "alert-rules.yaml",
            ArtifactKind::Dashboard => "dashboard.json",
            ArtifactKind::SloRecord => "slo.yaml",
            ArtifactKind::DirectoryEntry => "directory.json",
        }
    }
}

/// A fully rendered artifact, ready for a sink. Content is UTF-8 and ends
/// with a trailing newline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Canonical service name.
    pub service: String,
    /// Rendered content.
    pub content: String,
}

impl Artifact {
    /// sha256 of the content, hex-encoded.
    pub fn content_hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// How an artifact differs from its previously applied version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// No prior hash supplied.
    Create,
    /// Hash differs from the prior one.
    Update,
    /// Hash matches the prior one.
    Unchanged,
}

/// One line of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Canonical service name.
    pub service: String,
    /// sha256 of the rendered content.
    pub content_hash: String,
    /// Create / update / unchanged relative to the caller's baseline.
    pub change: ChangeKind,
    /// Human diff summary, e.g. "dashboard: 12 panels (3 guidance)".
    pub diff_summary: String,
}

/// Preview of a generation run. Entries are in generation order, so the
/// rendered plan is byte-stable for identical inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// One entry per generated artifact.
    pub entries: Vec<PlanEntry>,
}

impl Plan {
    /// Deterministic textual rendering: one section per artifact, prefixed
    /// by kind and service identity.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!(
                "[{}] {} ({}) {}\n  {}\n",
                entry.kind.as_str(),
                entry.service,
                match entry.change {
                    ChangeKind::Create => "create",
                    ChangeKind::Update => "update",
                    ChangeKind::Unchanged => "unchanged",
                },
                &entry.content_hash[..12.min(entry.content_hash.len())],
                entry.diff_summary,
            ));
        }
        out
    }

    /// True when nothing would change.
    pub fn is_noop(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.change == ChangeKind::Unchanged)
    }
}

/// Per-artifact outcome of an `apply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactStatus {
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Canonical service name.
    pub service: String,
    /// Whether the sink write succeeded.
    pub written: bool,
    /// Error message when the write failed or was skipped.
    pub message: Option<String>,
}

/// Result of an `apply` run. When `aborted` is set, artifacts ordered after
/// the failure were never written; earlier writes are listed and not rolled
/// back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppliedSet {
    /// Outcomes in generation order.
    pub statuses: Vec<ArtifactStatus>,
    /// Why the run stopped early, if it did.
    pub aborted: Option<String>,
}
