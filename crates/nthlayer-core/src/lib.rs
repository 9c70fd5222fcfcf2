//! # NthLayer Core
//!
//! The reliability intelligence core: domain model, identity resolution,
//! dependency discovery, ownership resolution, drift analysis, intent-based
//! dashboard generation, and plan/apply orchestration.
//!
//! ## Modules
//!
//! - `domain` - Core entities (specs, identities, edges, drift, intents)
//! - `config` - Configuration surface and tier defaults
//! - `error` - Error taxonomy shared across subsystems
//! - `identity` - Canonical-name resolution ladder and store
//! - `metrics` - Metric discovery client and technology classifier
//! - `discovery` - Provider fan-out, edge merging, graph assembly
//! - `ownership` - Weighted ownership signal aggregation
//! - `drift` - Error-budget trend analysis
//! - `dashboard` - Intent catalog, resolution waterfall, dashboard assembly
//! - `orchestrator` - Resource detection and plan/apply
//! - `correlate` - Deployment/burn-window correlation
//! - `repository` - Persistence traits
//! - `webhook` - Webhook provider contract

pub mod config;
pub mod correlate;
pub mod dashboard;
pub mod discovery;
pub mod domain;
pub mod drift;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod orchestrator;
pub mod ownership;
pub mod repository;
pub mod webhook;

// Re-export commonly used types
pub use config::NthLayerConfig;
pub use correlate::{BurnWindow, CorrelatedDeployment, DeploymentCorrelator};
pub use dashboard::{DashboardGenerator, IntentResolver};
pub use discovery::{DiscoveryOrchestrator, DiscoveryProvider};
pub use domain::*;
pub use drift::{DriftAnalyzer, DriftThresholds};
pub use error::{
    DriftAnalysisError, GeneratorError, MetricDiscoveryError, ProviderError, SinkError,
    SpecValidationError, WebhookError,
};
pub use identity::IdentityResolver;
pub use metrics::{classify_metric, MetricDiscovery, PrometheusDiscovery};
pub use orchestrator::{
    ArtifactSink, FileSystemSink, GenerationContext, ResourceDetector, ResourceIndex,
    ResourceKind, ServiceOrchestrator,
};
pub use ownership::{OwnershipProvider, OwnershipResolver};
pub use repository::{DeploymentEventRepository, InsertOutcome, RepoResult};
pub use webhook::{WebhookHeaders, WebhookProvider};
