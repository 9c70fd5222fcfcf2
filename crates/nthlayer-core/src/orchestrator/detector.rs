//! Single-pass resource detection over a ServiceSpec.
//!
//! The detector walks the spec exactly once and produces a `ResourceIndex`
//! keyed by resource kind. Tier defaults are materialized during indexing,
//! and the auto-generation rules (SLO implies recording rules and a
//! directory entry, dependencies imply alert rules and dashboard panels)
//! are applied here, so generators only ever look at the index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::TierDefaults;
use crate::domain::{
    DependencySpec, DriftConfig, ServiceSpec, ServiceType, SloSpec, Technology, Tier,
};
use crate::error::SpecValidationError;

/// Kind of a declared or auto-generated resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A declared SLO.
    Slo,
    /// A declared dependency.
    Dependencies,
    /// A dashboard request (auto-generated from dependencies and type).
    Dashboard,
    /// An alert-rule request (auto-generated from SLOs and dependencies).
    AlertRules,
    /// A recording-rule request (auto-generated from SLOs).
    RecordingRules,
    /// A service-directory entry request (auto-generated from SLOs).
    DirectoryEntry,
}

/// One indexed resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    /// A declared SLO.
    Slo(SloSpec),
    /// A declared dependency.
    Dependency(DependencySpec),
    /// Request for a dashboard covering these technology families.
    DashboardRequest(Vec<Technology>),
    /// Request for alert rules covering these technology families.
    AlertRuleRequest(Vec<Technology>),
    /// Request for recording rules backing this SLO.
    RecordingRuleRequest(SloSpec),
    /// Request for a directory entry.
    DirectoryEntryRequest,
}

/// Index of everything a spec declares or implies, keyed by kind. Built
/// once per orchestration and discarded afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceIndex {
    /// Service name.
    pub service: String,
    /// Tier, as declared.
    pub tier: Tier,
    /// Workload shape.
    pub service_type: ServiceType,
    /// Declared team, if any.
    pub team: Option<String>,
    /// Repository URL, if declared.
    pub repository: Option<String>,
    /// Operator-pinned metric expressions by intent name.
    pub metric_overrides: BTreeMap<String, String>,
    /// Drift configuration with tier defaults materialized.
    pub drift: DriftConfig,
    resources: BTreeMap<ResourceKind, Vec<Resource>>,
}

impl ResourceIndex {
    /// Resources of one kind, in declaration order.
    pub fn get(&self, kind: ResourceKind) -> &[Resource] {
        self.resources.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any resource of this kind was indexed.
    pub fn has(&self, kind: ResourceKind) -> bool {
        !self.get(kind).is_empty()
    }

    /// Declared SLOs, in declaration order.
    pub fn slos(&self) -> Vec<&SloSpec> {
        self.get(ResourceKind::Slo)
            .iter()
            .filter_map(|r| match r {
                Resource::Slo(slo) => Some(slo),
                _ => None,
            })
            .collect()
    }

    /// Declared dependencies, in declaration order.
    pub fn dependencies(&self) -> Vec<&DependencySpec> {
        self.get(ResourceKind::Dependencies)
            .iter()
            .filter_map(|r| match r {
                Resource::Dependency(dep) => Some(dep),
                _ => None,
            })
            .collect()
    }
}

/// Builds a `ResourceIndex` from a spec in a single traversal.
pub struct ResourceDetector;

impl ResourceDetector {
    /// Validate and index the spec.
    pub fn index(spec: &ServiceSpec) -> Result<ResourceIndex, SpecValidationError> {
        spec.validate()?;

        let mut resources: BTreeMap<ResourceKind, Vec<Resource>> = BTreeMap::new();

        for slo in &spec.slos {
            resources
                .entry(ResourceKind::Slo)
                .or_default()
                .push(Resource::Slo(slo.clone()));
            // SLO present implies recording rules and a directory entry.
            resources
                .entry(ResourceKind::RecordingRules)
                .or_default()
                .push(Resource::RecordingRuleRequest(slo.clone()));
        }
        if !spec.slos.is_empty() {
            resources
                .entry(ResourceKind::DirectoryEntry)
                .or_default()
                .push(Resource::DirectoryEntryRequest);
        }

        let mut families: Vec<Technology> = Vec::new();
        for dep in &spec.dependencies {
            resources
                .entry(ResourceKind::Dependencies)
                .or_default()
                .push(Resource::Dependency(dep.clone()));
            if let Some(technology) = dep.technology.as_deref().map(Technology::from_label) {
                if technology != Technology::Other && !families.contains(&technology) {
                    families.push(technology);
                }
            }
        }
        families.sort();

        // Dependencies present imply alert rules and dashboard panels for
        // the declared technology families.
        if !spec.dependencies.is_empty() || !spec.slos.is_empty() {
            resources
                .entry(ResourceKind::Dashboard)
                .or_default()
                .push(Resource::DashboardRequest(families.clone()));
        }
        if !spec.dependencies.is_empty() || !spec.slos.is_empty() {
            resources
                .entry(ResourceKind::AlertRules)
                .or_default()
                .push(Resource::AlertRuleRequest(families));
        }

        Ok(ResourceIndex {
            service: spec.name.clone(),
            tier: spec.tier,
            service_type: spec.service_type,
            team: spec.team.clone(),
            repository: spec.repository.clone(),
            metric_overrides: spec.metric_overrides.clone(),
            drift: materialize_drift(spec),
            resources,
        })
    }
}

/// Fill unset drift fields from tier defaults so generators and analyzers
/// downstream see a fully realized configuration.
fn materialize_drift(spec: &ServiceSpec) -> DriftConfig {
    let defaults = TierDefaults::for_tier(spec.tier);
    let declared = spec.drift.clone().unwrap_or_default();
    DriftConfig {
        enabled: declared.enabled.or(Some(true)),
        window: declared.window.or_else(|| Some("30d".to_string())),
        warn_threshold: declared.warn_threshold.or(Some(defaults.warn_threshold)),
        critical_threshold: declared
            .critical_threshold
            .or(Some(defaults.critical_threshold)),
        exhaustion_warn_days: declared
            .exhaustion_warn_days
            .or(Some(defaults.exhaustion_warn_days)),
        exhaustion_critical_days: declared
            .exhaustion_critical_days
            .or(Some(defaults.exhaustion_critical_days)),
    }
}
