//! Cross-provider identity resolution scenarios.

use std::collections::BTreeMap;
use std::time::Duration;

use pretty_assertions::assert_eq;

use nthlayer_core::config::IdentityConfig;
use nthlayer_core::domain::MatchType;
use nthlayer_core::identity::{normalize, IdentityResolver};

fn resolver() -> IdentityResolver {
    IdentityResolver::new(IdentityConfig::default(), Duration::from_secs(300))
}

#[test]
fn cross_provider_registrations_unify_on_one_canonical_identity() {
    let resolver = resolver();
    let attrs: BTreeMap<String, String> =
        [("repository".to_string(), "git://example/pay".to_string())]
            .into_iter()
            .collect();

    resolver.register_from_discovery("PAY-API-PROD", "provider-a", Some(attrs.clone()));
    resolver.register_from_discovery("pay-api", "provider-b", Some(attrs));

    let from_a = resolver.resolve("PAY-API-PROD", Some("provider-a"), None);
    let from_b = resolver.resolve("pay-api", Some("provider-b"), None);

    assert_eq!(from_a.match_type, MatchType::ExternalId);
    assert_eq!(from_b.match_type, MatchType::ExternalId);

    let identity_a = from_a.identity.unwrap();
    let identity_b = from_b.identity.unwrap();
    assert_eq!(identity_a.canonical_name, "pay-api");
    assert_eq!(identity_a.canonical_name, identity_b.canonical_name);

    // One identity, carrying both providers' external ids.
    assert_eq!(resolver.all().len(), 1);
    let merged = resolver.get("pay-api").unwrap();
    assert_eq!(
        merged.external_ids.get("provider-a").map(String::as_str),
        Some("PAY-API-PROD")
    );
    assert_eq!(
        merged.external_ids.get("provider-b").map(String::as_str),
        Some("pay-api")
    );
}

#[test]
fn normalization_is_idempotent_over_representative_inputs() {
    for raw in [
        "PAY-API-PROD",
        "Payments_Service",
        "checkout-v2-staging",
        "com.example.orders.OrderService",
        "plain-name",
        "a",
    ] {
        let once = normalize(raw);
        assert_eq!(normalize(&once), once, "normalize unstable for {raw:?}");
    }
}

#[test]
fn repeated_resolution_is_stable() {
    let resolver = resolver();
    resolver.register_from_discovery("orders-service", "consul", None);

    let first = resolver.resolve("Orders_Service", None, None);
    for _ in 0..10 {
        assert_eq!(resolver.resolve("Orders_Service", None, None), first);
    }
}

#[test]
fn unresolved_queries_are_values_not_errors() {
    let resolver = resolver();
    let result = resolver.resolve("never-seen-before", Some("consul"), None);
    assert_eq!(result.match_type, MatchType::Unresolved);
    assert_eq!(result.confidence, 0.0);
    assert!(result.identity.is_none());
}
