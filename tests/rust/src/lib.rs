//! Shared fixtures and mocks for NthLayer integration tests.

pub mod mocks;

use nthlayer_core::domain::{DependencySpec, ServiceSpec, SloSpec, Tier};

/// A representative critical-tier API spec with one SLO and a Redis
/// dependency, used across test suites.
pub fn checkout_spec() -> ServiceSpec {
    ServiceSpec::new("checkout")
        .with_tier(Tier::Critical)
        .with_team("payments")
        .with_slo(SloSpec {
            name: "availability".to_string(),
            objective: 0.999,
            window: "30d".to_string(),
            sli_expr: None,
        })
        .with_dependency(DependencySpec {
            name: "session-cache".to_string(),
            technology: Some("redis".to_string()),
            critical: true,
        })
}
