//! Intent resolution waterfall: operator override, primary discovery,
//! fallback chain, guidance.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{Intent, ResolutionResult, ResolutionStatus};

/// Default rate window substituted into query templates.
const DEFAULT_WINDOW: &str = "5m";

/// Resolves intents for one service against its discovered metric set.
pub struct IntentResolver {
    service: String,
    discovered: BTreeSet<String>,
    overrides: BTreeMap<String, String>,
    window: String,
}

impl IntentResolver {
    /// Create a resolver for `service` over the metrics discovery found for
    /// it. `overrides` maps intent names to operator-pinned expressions.
    pub fn new(
        service: impl Into<String>,
        discovered: BTreeSet<String>,
        overrides: BTreeMap<String, String>,
    ) -> Self {
        Self {
            service: service.into(),
            discovered,
            overrides,
            window: DEFAULT_WINDOW.to_string(),
        }
    }

    /// Use a different rate window in substituted templates.
    pub fn with_window(mut self, window: impl Into<String>) -> Self {
        self.window = window.into();
        self
    }

    /// Walk the waterfall for one intent. Deterministic: the same inputs
    /// always produce the same result, and growing the discovered set can
    /// only upgrade the outcome.
    pub fn resolve(&self, intent: &Intent) -> ResolutionResult {
        // 1. Operator override wins unconditionally.
        if let Some(expr) = self.overrides.get(&intent.name) {
            return ResolutionResult {
                status: ResolutionStatus::Resolved,
                expr: Some(self.substitute(expr, None)),
                metric: None,
                provenance: "override".to_string(),
                guidance: None,
            };
        }

        // 2/3. Primary candidate, then the fallback chain.
        for (position, candidate) in intent.candidates.iter().enumerate() {
            if self.discovered.contains(&candidate.metric) {
                return ResolutionResult {
                    status: if position == 0 {
                        ResolutionStatus::Resolved
                    } else {
                        ResolutionStatus::Fallback
                    },
                    expr: Some(self.substitute(&candidate.expr_template, Some(&candidate.metric))),
                    metric: Some(candidate.metric.clone()),
                    provenance: candidate.metric.clone(),
                    guidance: None,
                };
            }
        }

        // 4. Nothing exists; hand back guidance.
        ResolutionResult::unresolved(intent.guidance.clone())
    }

    fn substitute(&self, template: &str, metric: Option<&str>) -> String {
        let mut expr = template.replace("$service", &self.service);
        expr = expr.replace("$window", &self.window);
        if let Some(metric) = metric {
            expr = expr.replace("$metric", metric);
        }
        expr
    }
}
