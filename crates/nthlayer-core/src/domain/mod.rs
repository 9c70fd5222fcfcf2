//! Core entities shared across NthLayer subsystems.

pub mod artifact;
pub mod dependency;
pub mod deployment;
pub mod drift;
pub mod identity;
pub mod intent;
pub mod ownership;
pub mod spec;

pub use artifact::{AppliedSet, Artifact, ArtifactKind, ArtifactStatus, ChangeKind, Plan, PlanEntry};
pub use dependency::{
    DepType, DependencyGraph, DiscoveredDependency, ProviderHealth, ResolvedDependency,
};
pub use deployment::{DeploymentEvent, WebhookOutcome};
pub use drift::{
    BudgetPoint, BudgetSeries, DriftMetrics, DriftPattern, DriftProjection, DriftResult, Severity,
};
pub use identity::{IdentityMatch, IdentitySource, MatchType, ServiceIdentity};
pub use intent::{
    Dashboard, Intent, MetricCandidate, MetricType, Panel, PanelKind, PanelSpec, ResolutionResult,
    ResolutionStatus, Technology,
};
pub use ownership::{Contacts, OwnershipAttribution, OwnershipSignal, OwnershipSource, OwnerType};
pub use spec::{DependencySpec, DriftConfig, ServiceSpec, ServiceType, SloSpec, Tier};
