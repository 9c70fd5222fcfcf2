//! The identity resolver: a process-wide store of canonical identities and
//! the resolution ladder that maps raw provider names onto them.
//!
//! The store lives behind a single handle passed around by the orchestrator.
//! Writes take a short exclusive lock; resolution takes a shared lock. The
//! resolver never fails: unknown input yields an unresolved match.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use tracing::debug;

use crate::config::IdentityConfig;
use crate::domain::{IdentityMatch, MatchType, ServiceIdentity};

use super::cache::TtlCache;
use super::normalize::{affix_variants, normalize};

/// Confidence assigned per ladder step.
const CONFIDENCE_EXPLICIT: f64 = 1.0;
const CONFIDENCE_EXTERNAL_ID: f64 = 0.95;
const CONFIDENCE_EXACT: f64 = 1.0;
const CONFIDENCE_ALIAS: f64 = 0.90;
const CONFIDENCE_NORMALIZED: f64 = 0.85;
const CONFIDENCE_ATTRIBUTE: f64 = 0.75;

/// Resolution cache capacity.
const CACHE_CAPACITY: usize = 4_096;

#[derive(Default)]
struct IdentityStore {
    /// Canonical name -> identity. BTreeMap so snapshots iterate sorted.
    identities: BTreeMap<String, ServiceIdentity>,
    /// Alias, exactly as stored -> canonical name.
    alias_index: BTreeMap<String, String>,
    /// Normalized alias/canonical variants -> canonical name.
    normalized_index: BTreeMap<String, String>,
    /// (provider, raw) -> canonical name. First registration wins.
    external_index: BTreeMap<(String, String), String>,
}

impl IdentityStore {
    fn index(&mut self, identity: &ServiceIdentity) {
        let canonical = identity.canonical_name.clone();
        for variant in affix_variants(&normalize(&canonical)) {
            self.normalized_index
                .entry(variant)
                .or_insert_with(|| canonical.clone());
        }
        for alias in &identity.aliases {
            self.alias_index
                .entry(alias.clone())
                .or_insert_with(|| canonical.clone());
            for variant in affix_variants(&normalize(alias)) {
                self.normalized_index
                    .entry(variant)
                    .or_insert_with(|| canonical.clone());
            }
        }
        for (provider, raw) in &identity.external_ids {
            // Conflicting registrations keep the earlier winner.
            self.external_index
                .entry((provider.clone(), raw.clone()))
                .or_insert_with(|| canonical.clone());
        }
    }
}

/// Maps heterogeneous raw service identifiers to canonical identities.
pub struct IdentityResolver {
    config: IdentityConfig,
    store: RwLock<IdentityStore>,
    cache: Mutex<TtlCache<(String, Option<String>), IdentityMatch>>,
}

impl IdentityResolver {
    /// Create a resolver with the given settings and cache TTL.
    pub fn new(config: IdentityConfig, cache_ttl: Duration) -> Self {
        Self {
            config,
            store: RwLock::new(IdentityStore::default()),
            cache: Mutex::new(TtlCache::new(CACHE_CAPACITY, cache_ttl)),
        }
    }

    /// Resolve a raw name through the strategy ladder. First hit wins.
    pub fn resolve(
        &self,
        raw: &str,
        provider: Option<&str>,
        attributes: Option<&BTreeMap<String, String>>,
    ) -> IdentityMatch {
        let query = raw.trim();
        if query.is_empty() {
            return IdentityMatch::unresolved(raw, provider);
        }

        let cache_key = (query.to_string(), provider.map(str::to_string));
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&cache_key) {
                return hit;
            }
        }

        let result = self.resolve_uncached(query, provider, attributes);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(cache_key, result.clone());
        }
        result
    }

    fn resolve_uncached(
        &self,
        query: &str,
        provider: Option<&str>,
        attributes: Option<&BTreeMap<String, String>>,
    ) -> IdentityMatch {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());

        // 1. Explicit operator mapping, absolute precedence.
        if let Some(provider) = provider {
            let key = format!("{query}@{provider}");
            if let Some(canonical) = self.config.explicit_mappings.get(&key) {
                let identity = store
                    .identities
                    .get(canonical)
                    .cloned()
                    .unwrap_or_else(|| ServiceIdentity::declared(canonical.clone()));
                return self.matched(query, Some(provider), identity, MatchType::Explicit, CONFIDENCE_EXPLICIT);
            }
        }

        // 2. External id for the supplied provider.
        if let Some(provider) = provider {
            if let Some(canonical) = store
                .external_index
                .get(&(provider.to_string(), query.to_string()))
            {
                if let Some(identity) = store.identities.get(canonical) {
                    return self.matched(
                        query,
                        Some(provider),
                        identity.clone(),
                        MatchType::ExternalId,
                        CONFIDENCE_EXTERNAL_ID,
                    );
                }
            }
        }

        // 3. Exact canonical name.
        if let Some(identity) = store.identities.get(query) {
            return self.matched(query, provider, identity.clone(), MatchType::Exact, CONFIDENCE_EXACT);
        }

        // 4. Alias, exactly as stored.
        if let Some(canonical) = store.alias_index.get(query) {
            if let Some(identity) = store.identities.get(canonical) {
                return self.matched(query, provider, identity.clone(), MatchType::Alias, CONFIDENCE_ALIAS);
            }
        }

        // 5. Normalized name and its affix variants.
        let normalized = normalize(query);
        if !normalized.is_empty() {
            for variant in affix_variants(&normalized) {
                let canonical = store
                    .identities
                    .get(&variant)
                    .map(|id| id.canonical_name.clone())
                    .or_else(|| store.normalized_index.get(&variant).cloned());
                if let Some(canonical) = canonical {
                    if let Some(identity) = store.identities.get(&canonical) {
                        return self.matched(
                            query,
                            provider,
                            identity.clone(),
                            MatchType::Normalized,
                            CONFIDENCE_NORMALIZED,
                        );
                    }
                }
            }
        }

        // 6. Fuzzy similarity against canonical names and normalized aliases.
        if let Some((canonical, similarity, alternatives)) =
            self.best_fuzzy(&store, &normalized)
        {
            if similarity >= self.config.fuzzy_threshold {
                if let Some(identity) = store.identities.get(&canonical) {
                    let mut result = self.matched(
                        query,
                        provider,
                        identity.clone(),
                        MatchType::Fuzzy,
                        similarity,
                    );
                    result.alternatives = alternatives;
                    return result;
                }
            }
        }

        // 7. Attribute correlation.
        if let Some(attrs) = attributes {
            if let Some(identity) = self.correlate(&store, attrs) {
                return self.matched(
                    query,
                    provider,
                    identity,
                    MatchType::Attribute,
                    CONFIDENCE_ATTRIBUTE,
                );
            }
        }

        IdentityMatch::unresolved(query, provider)
    }

    fn matched(
        &self,
        query: &str,
        provider: Option<&str>,
        identity: ServiceIdentity,
        match_type: MatchType,
        confidence: f64,
    ) -> IdentityMatch {
        IdentityMatch {
            query: query.to_string(),
            provider: provider.map(str::to_string),
            identity: Some(identity),
            match_type,
            confidence,
            alternatives: Vec::new(),
        }
    }

    /// Best fuzzy candidate plus up to three runners-up.
    fn best_fuzzy(
        &self,
        store: &IdentityStore,
        normalized: &str,
    ) -> Option<(String, f64, Vec<(String, f64)>)> {
        if normalized.is_empty() {
            return None;
        }
        let mut scored: Vec<(String, f64)> = store
            .identities
            .values()
            .map(|identity| {
                let mut best = strsim::sorensen_dice(normalized, &identity.canonical_name);
                for alias in &identity.aliases {
                    let sim = strsim::sorensen_dice(normalized, &normalize(alias));
                    if sim > best {
                        best = sim;
                    }
                }
                (identity.canonical_name.clone(), best)
            })
            .collect();
        // Ties break on name so resolution is stable.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        let (winner, similarity) = scored.first().cloned()?;
        let alternatives = scored
            .into_iter()
            .skip(1)
            .filter(|(_, sim)| *sim >= 0.5)
            .take(3)
            .collect();
        Some((winner, similarity, alternatives))
    }

    /// One strong attribute match, or several weak ones, identifies a service.
    fn correlate(
        &self,
        store: &IdentityStore,
        attrs: &BTreeMap<String, String>,
    ) -> Option<ServiceIdentity> {
        let correlation = &self.config.correlation;
        for identity in store.identities.values() {
            let strong = correlation
                .strong_attrs
                .iter()
                .filter(|key| attr_matches(attrs, &identity.attributes, key))
                .count();
            if strong >= correlation.strong_match_count {
                return Some(identity.clone());
            }
            let weak = correlation
                .weak_attrs
                .iter()
                .filter(|key| attr_matches(attrs, &identity.attributes, key))
                .count();
            if weak >= correlation.weak_match_count {
                return Some(identity.clone());
            }
        }
        None
    }

    /// Register a sighting from a discovery provider. Idempotent: repeated
    /// calls update `last_seen` and merge attributes into the same identity.
    pub fn register_from_discovery(
        &self,
        raw: &str,
        provider: &str,
        attributes: Option<BTreeMap<String, String>>,
    ) -> ServiceIdentity {
        let raw = raw.trim();
        let canonical = {
            let normalized = normalize(raw);
            if normalized.is_empty() {
                raw.to_ascii_lowercase()
            } else {
                normalized
            }
        };

        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());

        // A (provider, raw) pair that already resolved keeps resolving to
        // the same identity for the process lifetime.
        let target = store
            .external_index
            .get(&(provider.to_string(), raw.to_string()))
            .cloned()
            .unwrap_or(canonical);

        let updated = match store.identities.get_mut(&target) {
            Some(existing) => {
                existing.aliases.insert(raw.to_string());
                existing
                    .external_ids
                    .entry(provider.to_string())
                    .or_insert_with(|| raw.to_string());
                if let Some(attrs) = attributes {
                    for (key, value) in attrs {
                        existing.attributes.insert(key, value);
                    }
                }
                existing.last_seen = chrono::Utc::now();
                existing.clone()
            }
            None => {
                debug!("[Identity] new identity {} via {}", target, provider);
                let mut identity = ServiceIdentity::discovered(target.clone())
                    .with_external_id(provider, raw);
                if let Some(attrs) = attributes {
                    identity.attributes.extend(attrs);
                }
                store.identities.insert(target.clone(), identity.clone());
                identity
            }
        };

        store.index(&updated);
        self.clear_cache();
        updated
    }

    /// Insert or merge an identity. On merge the higher confidence wins,
    /// aliases and external ids union, and the earlier external-id mapping
    /// is kept per provider.
    pub fn register(&self, identity: ServiceIdentity, merge: bool) -> ServiceIdentity {
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        let canonical = identity.canonical_name.clone();

        let stored = match store.identities.get_mut(&canonical) {
            Some(existing) if merge => {
                existing.aliases.extend(identity.aliases);
                for (provider, raw) in identity.external_ids {
                    existing.external_ids.entry(provider).or_insert(raw);
                }
                for (key, value) in identity.attributes {
                    existing.attributes.entry(key).or_insert(value);
                }
                if identity.confidence > existing.confidence {
                    existing.confidence = identity.confidence;
                    existing.source = identity.source;
                }
                existing.first_seen = existing.first_seen.min(identity.first_seen);
                existing.last_seen = chrono::Utc::now();
                existing.clone()
            }
            _ => {
                store.identities.insert(canonical.clone(), identity.clone());
                identity
            }
        };

        store.index(&stored);
        self.clear_cache();
        stored
    }

    /// Look up an identity by canonical name.
    pub fn get(&self, canonical: &str) -> Option<ServiceIdentity> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store.identities.get(canonical).cloned()
    }

    /// Snapshot of all identities, sorted by canonical name.
    pub fn all(&self) -> Vec<ServiceIdentity> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store.identities.values().cloned().collect()
    }

    fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

fn attr_matches(
    query: &BTreeMap<String, String>,
    stored: &BTreeMap<String, String>,
    key: &str,
) -> bool {
    match (query.get(key), stored.get(key)) {
        (Some(a), Some(b)) => !a.is_empty() && a == b,
        _ => false,
    }
}
