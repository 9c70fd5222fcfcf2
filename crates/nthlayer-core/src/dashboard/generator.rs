//! Dashboard assembly from resolved intents.

use std::collections::BTreeSet;

use tracing::debug;

use crate::domain::{
    Dashboard, Panel, PanelKind, ResolutionStatus, ServiceSpec,
};

use super::catalog::panel_specs_for_spec;
use super::resolver::IntentResolver;

/// Builds a dashboard for a spec from the metrics discovered for it.
pub struct DashboardGenerator;

impl DashboardGenerator {
    /// Generate the dashboard. Panel order follows the catalog, panel ids
    /// are positional, and every unresolved intent renders as a guidance
    /// card, so output is byte-stable for identical inputs.
    pub fn generate(spec: &ServiceSpec, discovered: &BTreeSet<String>) -> Dashboard {
        let resolver = IntentResolver::new(
            spec.name.clone(),
            discovered.clone(),
            spec.metric_overrides.clone(),
        );

        let mut panels = Vec::new();
        for (index, (panel_spec, intent)) in panel_specs_for_spec(spec).into_iter().enumerate() {
            let resolution = resolver.resolve(&intent);
            let panel = match resolution.status {
                ResolutionStatus::Resolved | ResolutionStatus::Fallback => Panel {
                    id: index as u32 + 1,
                    title: panel_spec.title,
                    kind: panel_spec.kind,
                    expr: resolution.expr,
                    unit: panel_spec.unit,
                    text: None,
                },
                ResolutionStatus::Unresolved => Panel {
                    id: index as u32 + 1,
                    title: format!("{} (setup required)", panel_spec.title),
                    kind: PanelKind::Text,
                    expr: None,
                    unit: panel_spec.unit,
                    text: resolution.guidance,
                },
            };
            panels.push(panel);
        }

        let guidance = panels.iter().filter(|p| p.expr.is_none()).count();
        debug!(
            "[Dashboard] {} panels for {} ({} guidance)",
            panels.len(),
            spec.name,
            guidance
        );

        let mut tags: Vec<String> = vec![
            "nthlayer".to_string(),
            format!("tier:{}", spec.tier.as_str()),
        ];
        if let Some(team) = &spec.team {
            tags.push(format!("team:{team}"));
        }
        tags.sort();

        Dashboard {
            title: format!("{} service overview", spec.name),
            service: spec.name.clone(),
            panels,
            tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DependencySpec, Tier};

    fn redis_spec() -> ServiceSpec {
        ServiceSpec::new("checkout")
            .with_tier(Tier::Critical)
            .with_dependency(DependencySpec {
                name: "session-cache".to_string(),
                technology: Some("redis".to_string()),
                critical: true,
            })
    }

    #[test]
    fn test_missing_redis_metrics_yield_guidance_panels() {
        let discovered: BTreeSet<String> =
            ["http_requests_total".to_string()].into_iter().collect();
        let dashboard = DashboardGenerator::generate(&redis_spec(), &discovered);

        let redis_panels: Vec<&Panel> = dashboard
            .panels
            .iter()
            .filter(|p| p.title.to_lowercase().contains("cache") || p.title.contains("Redis"))
            .collect();
        assert!(!redis_panels.is_empty());
        for panel in redis_panels {
            assert_eq!(panel.kind, PanelKind::Text);
            assert!(panel.expr.is_none());
            assert!(panel.text.as_deref().unwrap_or("").contains("redis_exporter"));
        }
    }

    #[test]
    fn test_no_panel_references_undiscovered_metric() {
        let discovered: BTreeSet<String> = ["redis_memory_used_bytes".to_string()]
            .into_iter()
            .collect();
        let dashboard = DashboardGenerator::generate(&redis_spec(), &discovered);
        for panel in &dashboard.panels {
            if let Some(expr) = &panel.expr {
                // Only the discovered family may appear as a data source.
                assert!(
                    expr.contains("redis_memory_used_bytes"),
                    "unexpected expr {expr}"
                );
            }
        }
    }

    #[test]
    fn test_generation_is_byte_stable() {
        let discovered: BTreeSet<String> = [
            "http_requests_total".to_string(),
            "redis_memory_used_bytes".to_string(),
        ]
        .into_iter()
        .collect();
        let spec = redis_spec();
        let first = serde_json::to_string(&DashboardGenerator::generate(&spec, &discovered)).unwrap();
        for _ in 0..10 {
            let next =
                serde_json::to_string(&DashboardGenerator::generate(&spec, &discovered)).unwrap();
            assert_eq!(first, next);
        }
    }

    #[test]
    fn test_panel_ids_are_positional() {
        let dashboard = DashboardGenerator::generate(&redis_spec(), &BTreeSet::new());
        for (index, panel) in dashboard.panels.iter().enumerate() {
            assert_eq!(panel.id, index as u32 + 1);
        }
    }
}
