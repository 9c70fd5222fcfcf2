//! ServiceSpec - declarative description of a service.
//!
//! A spec is loaded by a collaborator (CLI, plugin) and is immutable for the
//! duration of an orchestration run. Validation happens once, up front.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SpecValidationError;

/// Criticality tier of a service. Drives default thresholds and horizons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Customer-facing, revenue-impacting.
    Critical,
    /// Default tier for most services.
    Standard,
    /// Batch/internal tooling.
    Low,
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Standard
    }
}

impl Tier {
    /// Stable lowercase name, used in artifact labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Critical => "critical",
            Tier::Standard => "standard",
            Tier::Low => "low",
        }
    }
}

/// Workload shape of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// Request/response HTTP or gRPC API.
    Api,
    /// Queue-consuming background worker.
    Worker,
    /// Stream processor (Kafka etc.).
    Stream,
    /// Scheduled job.
    Cron,
    /// Browser-facing frontend.
    Frontend,
}

impl Default for ServiceType {
    fn default() -> Self {
        ServiceType::Api
    }
}

/// A dependency declared in the spec (as opposed to one discovered at runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Name of the depended-on service or resource.
    pub name: String,
    /// Technology family, e.g. "postgres", "redis", "kafka". Drives panel
    /// and alert selection.
    #[serde(default)]
    pub technology: Option<String>,
    /// Whether an outage of this dependency takes the service down.
    #[serde(default)]
    pub critical: bool,
}

/// One SLO declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloSpec {
    /// SLO name, unique within the spec (e.g. "availability").
    pub name: String,
    /// Target success ratio in (0, 1), e.g. 0.999.
    pub objective: f64,
    /// Rolling window, e.g. "30d".
    pub window: String,
    /// Optional PromQL expression overriding the generated SLI.
    #[serde(default)]
    pub sli_expr: Option<String>,
}

/// Per-service drift analysis overrides. Unset fields fall back to
/// tier-derived defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Enable drift analysis for this service.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Analysis window, e.g. "30d".
    #[serde(default)]
    pub window: Option<String>,
    /// Warn when weekly slope falls at or below this value (negative).
    #[serde(default)]
    pub warn_threshold: Option<f64>,
    /// Critical when weekly slope falls at or below this value (negative).
    #[serde(default)]
    pub critical_threshold: Option<f64>,
    /// Warn when projected exhaustion is within this many days.
    #[serde(default)]
    pub exhaustion_warn_days: Option<f64>,
    /// Critical when projected exhaustion is within this many days.
    #[serde(default)]
    pub exhaustion_critical_days: Option<f64>,
}

/// Declarative description of a service. The single input to `plan`/`apply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Service name; normalized form becomes the canonical identity.
    pub name: String,

    /// Criticality tier.
    #[serde(default)]
    pub tier: Tier,

    /// Workload shape.
    #[serde(default, rename = "type")]
    pub service_type: ServiceType,

    /// Owning team, if declared. Feeds ownership resolution at weight 1.0.
    #[serde(default)]
    pub team: Option<String>,

    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,

    /// Source repository URL. A strong identity-correlation attribute.
    #[serde(default)]
    pub repository: Option<String>,

    /// Declared dependencies.
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,

    /// SLO declarations.
    #[serde(default)]
    pub slos: Vec<SloSpec>,

    /// Drift analysis overrides.
    #[serde(default)]
    pub drift: Option<DriftConfig>,

    /// Operator-pinned metric expressions, keyed by intent name. These win
    /// over discovery during intent resolution.
    #[serde(default)]
    pub metric_overrides: BTreeMap<String, String>,
}

impl ServiceSpec {
    /// Create a minimal spec with defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tier: Tier::default(),
            service_type: ServiceType::default(),
            team: None,
            description: None,
            repository: None,
            dependencies: Vec::new(),
            slos: Vec::new(),
            drift: None,
            metric_overrides: BTreeMap::new(),
        }
    }

    /// Set the tier.
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    /// Set the owning team.
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Add a declared dependency.
    pub fn with_dependency(mut self, dep: DependencySpec) -> Self {
        self.dependencies.push(dep);
        self
    }

    /// Add an SLO.
    pub fn with_slo(mut self, slo: SloSpec) -> Self {
        self.slos.push(slo);
        self
    }

    /// Validate the spec. Called once by the orchestrator before indexing.
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        if self.name.trim().is_empty() {
            return Err(SpecValidationError::MissingName);
        }
        let mut seen = std::collections::BTreeSet::new();
        for slo in &self.slos {
            if slo.name.trim().is_empty() {
                return Err(SpecValidationError::Invalid {
                    field: "slos.name".to_string(),
                    message: "SLO name must not be empty".to_string(),
                });
            }
            if !(slo.objective > 0.0 && slo.objective < 1.0) {
                return Err(SpecValidationError::Invalid {
                    field: format!("slos.{}.objective", slo.name),
                    message: format!("objective {} must be in (0, 1)", slo.objective),
                });
            }
            if crate::config::parse_duration_secs(&slo.window).is_err() {
                return Err(SpecValidationError::Invalid {
                    field: format!("slos.{}.window", slo.name),
                    message: format!("unparsable window {:?}", slo.window),
                });
            }
            if !seen.insert(slo.name.as_str()) {
                return Err(SpecValidationError::Invalid {
                    field: "slos".to_string(),
                    message: format!("duplicate SLO name {:?}", slo.name),
                });
            }
        }
        if let Some(drift) = &self.drift {
            if let Some(window) = &drift.window {
                if crate::config::parse_duration_secs(window).is_err() {
                    return Err(SpecValidationError::Invalid {
                        field: "drift.window".to_string(),
                        message: format!("unparsable window {:?}", window),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slo(name: &str, objective: f64) -> SloSpec {
        SloSpec {
            name: name.to_string(),
            objective,
            window: "30d".to_string(),
            sli_expr: None,
        }
    }

    #[test]
    fn test_valid_spec() {
        let spec = ServiceSpec::new("checkout")
            .with_tier(Tier::Critical)
            .with_slo(slo("availability", 0.999));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_name() {
        let spec = ServiceSpec::new("  ");
        assert!(matches!(
            spec.validate(),
            Err(SpecValidationError::MissingName)
        ));
    }

    #[test]
    fn test_rejects_objective_out_of_range() {
        let spec = ServiceSpec::new("checkout").with_slo(slo("availability", 1.0));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_slo_names() {
        let spec = ServiceSpec::new("checkout")
            .with_slo(slo("availability", 0.99))
            .with_slo(slo("availability", 0.999));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_window() {
        let mut spec = ServiceSpec::new("checkout").with_slo(slo("availability", 0.99));
        spec.slos[0].window = "next tuesday".to_string();
        assert!(spec.validate().is_err());
    }
}
