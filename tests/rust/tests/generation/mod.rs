//! Artifact generation scenarios: guidance panels and plan stability.

use std::collections::BTreeSet;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use nthlayer_core::dashboard::DashboardGenerator;
use nthlayer_core::domain::{ArtifactKind, PanelKind};
use nthlayer_core::orchestrator::{FileSystemSink, GenerationContext, ServiceOrchestrator};

use tests::checkout_spec;

#[test]
fn missing_redis_metrics_render_guidance_not_queries() {
    // Metric discovery sees HTTP series but nothing from redis_exporter.
    let discovered: BTreeSet<String> = [
        "http_requests_total",
        "http_request_duration_seconds_bucket",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect();

    let dashboard = DashboardGenerator::generate(&checkout_spec(), &discovered);

    let (resolved, guidance): (Vec<_>, Vec<_>) = dashboard
        .panels
        .iter()
        .partition(|panel| panel.expr.is_some());

    // HTTP panels resolved; every Redis panel became a guidance card.
    assert!(!resolved.is_empty());
    assert!(!guidance.is_empty());
    for panel in &guidance {
        assert_eq!(panel.kind, PanelKind::Text);
        assert!(panel.text.is_some());
    }
    assert!(guidance
        .iter()
        .any(|p| p.text.as_deref().unwrap_or("").contains("redis_exporter")));

    // No panel queries a metric discovery never saw.
    for panel in &resolved {
        let expr = panel.expr.as_deref().unwrap();
        assert!(
            !expr.contains("redis_"),
            "panel {} queries missing redis metric: {}",
            panel.title,
            expr
        );
    }
}

#[test]
fn plan_bytes_are_identical_across_100_runs() {
    let sink = Arc::new(FileSystemSink::new("/tmp/nthlayer-unused"));
    let orchestrator = ServiceOrchestrator::new(sink);
    let spec = checkout_spec();
    let ctx = GenerationContext {
        discovered_metrics: ["http_requests_total", "redis_up"]
            .iter()
            .map(|m| m.to_string())
            .collect(),
        ..Default::default()
    };

    let baseline = orchestrator.plan(&spec, &ctx).unwrap().render();
    assert!(!baseline.is_empty());
    for _ in 0..100 {
        assert_eq!(orchestrator.plan(&spec, &ctx).unwrap().render(), baseline);
    }
}

#[test]
fn plan_against_its_own_hashes_is_a_noop() {
    let sink = Arc::new(FileSystemSink::new("/tmp/nthlayer-unused"));
    let orchestrator = ServiceOrchestrator::new(sink);
    let spec = checkout_spec();

    let first = orchestrator.plan(&spec, &GenerationContext::default()).unwrap();
    let ctx = GenerationContext {
        baseline_hashes: first
            .entries
            .iter()
            .map(|entry| (entry.kind, entry.content_hash.clone()))
            .collect(),
        ..Default::default()
    };

    let second = orchestrator.plan(&spec, &ctx).unwrap();
    assert!(second.is_noop());
}

#[tokio::test]
async fn apply_writes_the_stable_file_layout() {
    let dir = tempfile::TempDir::new().unwrap();
    let sink = Arc::new(FileSystemSink::new(dir.path()));
    let orchestrator = ServiceOrchestrator::new(sink);

    let applied = orchestrator
        .apply(
            &checkout_spec(),
            &GenerationContext::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(applied.aborted.is_none());

    let service_dir = dir.path().join("checkout");
    for kind in [
        ArtifactKind::RecordingRules,
        ArtifactKind::AlertRules,
        ArtifactKind::Dashboard,
        ArtifactKind::SloRecord,
        ArtifactKind::DirectoryEntry,
    ] {
        let path = service_dir.join(kind.filename());
        let content = std::fs::read_to_string(&path)
            .unwrap_or_else(|_| panic!("missing artifact {}", path.display()));
        assert!(content.ends_with('\n'), "{} lacks trailing newline", path.display());
    }

    // Rule artifacts parse as YAML; JSON artifacts parse as JSON.
    let rules = std::fs::read_to_string(service_dir.join("recording-rules.yaml")).unwrap();
    let parsed: serde_yaml::Value = serde_yaml::from_str(&rules).unwrap();
    assert!(parsed.get("groups").is_some());
    let dashboard = std::fs::read_to_string(service_dir.join("dashboard.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&dashboard).unwrap();
    assert_eq!(parsed["service"], "checkout");
}

#[tokio::test]
async fn apply_and_plan_agree_on_content_hashes() {
    let dir = tempfile::TempDir::new().unwrap();
    let sink = Arc::new(FileSystemSink::new(dir.path()));
    let orchestrator = ServiceOrchestrator::new(sink.clone());
    let spec = checkout_spec();
    let ctx = GenerationContext::default();

    let plan = orchestrator.plan(&spec, &ctx).unwrap();
    orchestrator
        .apply(&spec, &ctx, &CancellationToken::new())
        .await
        .unwrap();

    for entry in &plan.entries {
        let path = dir.path().join("checkout").join(entry.kind.filename());
        let content = std::fs::read_to_string(path).unwrap();
        let artifact = nthlayer_core::domain::Artifact {
            kind: entry.kind,
            service: "checkout".to_string(),
            content,
        };
        assert_eq!(artifact.content_hash(), entry.content_hash);
    }
}
