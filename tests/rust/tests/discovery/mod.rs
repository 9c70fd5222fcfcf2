//! Discovery orchestration scenarios: merging, ordering, degradation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use nthlayer_core::config::{DiscoveryConfig, IdentityConfig};
use nthlayer_core::discovery::{downstream, upstream, DiscoveryOrchestrator, DiscoveryProvider};
use nthlayer_core::domain::{DepType, DiscoveredDependency};
use nthlayer_core::identity::IdentityResolver;

use tests::mocks::MockDiscoveryProvider;

fn edge(provider: &str, source: &str, target: &str, confidence: f64) -> DiscoveredDependency {
    DiscoveredDependency::new(source, target, provider, DepType::Service, confidence)
}

fn orchestrator(providers: Vec<Arc<dyn DiscoveryProvider>>) -> DiscoveryOrchestrator {
    let identity = Arc::new(IdentityResolver::new(
        IdentityConfig::default(),
        Duration::from_secs(300),
    ));
    DiscoveryOrchestrator::new(
        &DiscoveryConfig::default(),
        Duration::from_secs(300),
        providers,
        identity,
    )
}

#[tokio::test]
async fn three_confirming_providers_saturate_confidence() {
    let providers: Vec<Arc<dyn DiscoveryProvider>> = (0..3)
        .map(|i| {
            Arc::new(MockDiscoveryProvider::new(
                &format!("provider-{i}"),
                vec![edge(&format!("provider-{i}"), "checkout", "payment", 0.8)],
            )) as Arc<dyn DiscoveryProvider>
        })
        .collect();
    let orchestrator = orchestrator(providers);

    let deps = orchestrator
        .discover_for_service("checkout", false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(deps.len(), 1);
    // max(0.8) + min(0.1 x 2, 0.2) = 1.0
    assert_eq!(deps[0].confidence, 1.0);
    assert_eq!(deps[0].providers.len(), 3);
}

#[tokio::test]
async fn failing_provider_never_aborts_peers() {
    let mut bad = MockDiscoveryProvider::new(
        "bad",
        vec![edge("bad", "checkout", "inventory", 0.9)],
    );
    bad.fail = true;
    let providers: Vec<Arc<dyn DiscoveryProvider>> = vec![
        Arc::new(MockDiscoveryProvider::new(
            "good",
            vec![edge("good", "checkout", "payment", 0.8)],
        )),
        Arc::new(bad),
    ];
    let orchestrator = orchestrator(providers);

    let deps = orchestrator
        .discover_for_service("checkout", false, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].target, "payment");
}

#[tokio::test]
async fn full_graph_is_closed_and_sorted() {
    let providers: Vec<Arc<dyn DiscoveryProvider>> = vec![Arc::new(MockDiscoveryProvider::new(
        "catalog",
        vec![
            edge("catalog", "web", "checkout", 0.9),
            edge("catalog", "checkout", "payment", 0.9),
            edge("catalog", "checkout", "inventory", 0.9),
            edge("catalog", "payment", "ledger", 0.9),
        ],
    ))];
    let orchestrator = orchestrator(providers);

    let graph = orchestrator
        .build_full_graph(None, &CancellationToken::new())
        .await
        .unwrap();

    // Every edge endpoint appears in the identity map.
    for edge in &graph.edges {
        assert!(graph.identities.contains_key(&edge.source));
        assert!(graph.identities.contains_key(&edge.target));
    }

    // Edge iteration is sorted by (source, target, dep_type).
    let keys: Vec<_> = graph
        .edges
        .iter()
        .map(|e| (e.source.clone(), e.target.clone(), e.dep_type))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);

    // Traversals: blast radius of payment includes web via checkout.
    let radius = upstream(&graph, "payment", 10);
    assert!(radius.contains("checkout"));
    assert!(radius.contains("web"));
    let deps = downstream(&graph, "checkout", 10);
    assert!(deps.contains("ledger"));
}

#[tokio::test]
async fn metadata_merge_is_deterministic_across_provider_order() {
    let make_providers = |flip: bool| -> Vec<Arc<dyn DiscoveryProvider>> {
        let a = Arc::new(MockDiscoveryProvider::new(
            "aaa",
            vec![edge("aaa", "checkout", "payment", 0.8)
                .with_metadata("shared", "from-aaa")],
        )) as Arc<dyn DiscoveryProvider>;
        let b = Arc::new(MockDiscoveryProvider::new(
            "zzz",
            vec![edge("zzz", "checkout", "payment", 0.7)
                .with_metadata("shared", "from-zzz")],
        )) as Arc<dyn DiscoveryProvider>;
        if flip {
            vec![b, a]
        } else {
            vec![a, b]
        }
    };

    let cancel = CancellationToken::new();
    let forward = orchestrator(make_providers(false))
        .discover_for_service("checkout", false, &cancel)
        .await
        .unwrap();
    let reversed = orchestrator(make_providers(true))
        .discover_for_service("checkout", false, &cancel)
        .await
        .unwrap();

    // Later-by-name wins regardless of registration or completion order.
    let expected: BTreeMap<String, String> =
        [("shared".to_string(), "from-zzz".to_string())]
            .into_iter()
            .collect();
    assert_eq!(forward[0].metadata, expected);
    assert_eq!(forward[0].metadata, reversed[0].metadata);
}

#[tokio::test]
async fn cancellation_yields_no_partial_graph() {
    let providers: Vec<Arc<dyn DiscoveryProvider>> = vec![Arc::new(MockDiscoveryProvider::new(
        "catalog",
        vec![edge("catalog", "a", "b", 0.9)],
    ))];
    let orchestrator = orchestrator(providers);

    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(orchestrator
        .build_full_graph(None, &cancel)
        .await
        .is_err());
}
