//! Drift analysis scenarios from budget series to severity.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use nthlayer_core::config::DriftSettings;
use nthlayer_core::domain::{DriftPattern, Severity};
use nthlayer_core::drift::DriftAnalyzer;

use tests::checkout_spec;
use tests::mocks::{daily_series, ScriptedMetrics};

#[tokio::test]
async fn gradual_decline_classifies_critical_by_slope() {
    // 30 daily samples from 0.95 falling 0.01/day: about -7%/week against
    // a -1%/week critical threshold.
    let values: Vec<f64> = (0..30).map(|d| 0.95 - 0.01 * d as f64).collect();
    let metrics = Arc::new(ScriptedMetrics::new(&[], daily_series(&values)));
    let analyzer = DriftAnalyzer::new(DriftSettings::default(), metrics.clone());

    let result = analyzer
        .analyze(&checkout_spec(), Some("30d"), None)
        .await
        .unwrap();

    assert_eq!(result.pattern, DriftPattern::GradualDecline);
    assert!((result.metrics.slope_per_week + 0.07).abs() < 0.002);
    assert_eq!(result.severity, Severity::Critical);
    assert_eq!(result.exit_code(), 2);

    // The analyzer asked for the SLO's budget series.
    let queries = metrics.queries.lock().unwrap();
    assert!(queries[0].contains("slo:error_budget_remaining:ratio"));
    assert!(queries[0].contains("service=\"checkout\""));
    assert!(queries[0].contains("slo=\"availability\""));
}

#[tokio::test]
async fn step_change_forces_critical_with_null_exhaustion() {
    let mut values = vec![0.90; 20];
    values.extend(vec![0.80; 10]);
    let metrics = Arc::new(ScriptedMetrics::new(&[], daily_series(&values)));
    let analyzer = DriftAnalyzer::new(DriftSettings::default(), metrics);

    let result = analyzer
        .analyze(&checkout_spec(), Some("30d"), None)
        .await
        .unwrap();

    assert_eq!(result.pattern, DriftPattern::StepChangeDown);
    assert_eq!(result.severity, Severity::Critical);
    // The post-drop trend is flat, so no exhaustion date is projected.
    assert_eq!(result.projection.days_until_exhaustion, None);
}

#[tokio::test]
async fn drift_results_are_deterministic() {
    let values: Vec<f64> = (0..30).map(|d| 0.95 - 0.004 * d as f64).collect();
    let metrics = Arc::new(ScriptedMetrics::new(&[], daily_series(&values)));
    let analyzer = DriftAnalyzer::new(DriftSettings::default(), metrics);

    let first = analyzer
        .analyze(&checkout_spec(), Some("30d"), None)
        .await
        .unwrap();
    for _ in 0..5 {
        let next = analyzer
            .analyze(&checkout_spec(), Some("30d"), None)
            .await
            .unwrap();
        assert_eq!(next, first);
    }
}

#[tokio::test]
async fn insufficient_data_is_an_error() {
    let metrics = Arc::new(ScriptedMetrics::new(&[], daily_series(&[0.9])));
    let analyzer = DriftAnalyzer::new(DriftSettings::default(), metrics);

    assert!(analyzer
        .analyze(&checkout_spec(), Some("30d"), None)
        .await
        .is_err());
}

#[tokio::test]
async fn improving_budget_projects_no_exhaustion() {
    let values: Vec<f64> = (0..30).map(|d| 0.5 + 0.005 * d as f64).collect();
    let metrics = Arc::new(ScriptedMetrics::new(&[], daily_series(&values)));
    let analyzer = DriftAnalyzer::new(DriftSettings::default(), metrics);

    let result = analyzer
        .analyze(&checkout_spec(), Some("30d"), None)
        .await
        .unwrap();
    assert_eq!(result.pattern, DriftPattern::GradualImprovement);
    assert_eq!(result.projection.days_until_exhaustion, None);
    assert_eq!(result.severity, Severity::None);
    assert_eq!(result.exit_code(), 0);
}
