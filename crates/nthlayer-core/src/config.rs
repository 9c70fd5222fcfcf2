//! Configuration surface for the reliability core.
//!
//! Config-file search and YAML loading belong to collaborators; these types
//! deserialize from any serde source. Durations accept `"30d"`-style strings
//! and are stored as integer seconds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::Tier;

/// Default TTL for resolver, discovery, and ownership caches.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default per-provider call deadline.
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 5_000;

/// Default deadline for metrics range queries.
pub const DEFAULT_RANGE_QUERY_TIMEOUT_MS: u64 = 30_000;

/// Parse a duration string like `30d`, `2h`, `45m`, `10s` into seconds.
/// A bare number is taken as seconds.
pub fn parse_duration_secs(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty duration".to_string());
    }
    let (digits, suffix) = match trimmed.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, ""),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration {trimmed:?}"))?;
    let multiplier = match suffix {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 604_800,
        other => return Err(format!("unknown duration unit {other:?}")),
    };
    Ok(value * multiplier)
}

/// Per-provider connection settings. Providers read what they need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Include this provider in orchestration.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Base URL of the provider's API.
    #[serde(default)]
    pub url: Option<String>,
    /// Bearer or API token.
    #[serde(default)]
    pub token: Option<String>,
    /// Datacenter / region selector.
    #[serde(default)]
    pub datacenter: Option<String>,
    /// Namespace scope.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Anything provider-specific beyond the common fields.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

/// Discovery orchestration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Provider configs keyed by provider name.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Per-provider call deadline in milliseconds.
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_ms: u64,
    /// Services per batch during full-graph builds.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_provider_timeout() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_MS
}

fn default_batch_size() -> usize {
    10
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            providers: BTreeMap::new(),
            provider_timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
            batch_size: 10,
        }
    }
}

/// Attribute-correlation tuning for identity resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Attributes where a single match suffices.
    #[serde(default = "default_strong_attrs")]
    pub strong_attrs: Vec<String>,
    /// Attributes that must match in combination.
    #[serde(default = "default_weak_attrs")]
    pub weak_attrs: Vec<String>,
    /// Strong matches required (default 1).
    #[serde(default = "default_strong_count")]
    pub strong_match_count: usize,
    /// Weak matches required (default 2).
    #[serde(default = "default_weak_count")]
    pub weak_match_count: usize,
}

fn default_strong_attrs() -> Vec<String> {
    vec!["repository".to_string()]
}

fn default_weak_attrs() -> Vec<String> {
    vec![
        "owner".to_string(),
        "team".to_string(),
        "chat".to_string(),
    ]
}

fn default_strong_count() -> usize {
    1
}

fn default_weak_count() -> usize {
    2
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            strong_attrs: default_strong_attrs(),
            weak_attrs: default_weak_attrs(),
            strong_match_count: 1,
            weak_match_count: 2,
        }
    }
}

/// Identity resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Minimum similarity for a fuzzy match.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    /// Attribute correlation tuning.
    #[serde(default)]
    pub correlation: CorrelationConfig,
    /// Operator overrides: `"raw@provider"` -> canonical name. Absolute
    /// precedence over every other resolution step.
    #[serde(default)]
    pub explicit_mappings: BTreeMap<String, String>,
}

fn default_fuzzy_threshold() -> f64 {
    0.85
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.85,
            correlation: CorrelationConfig::default(),
            explicit_mappings: BTreeMap::new(),
        }
    }
}

/// Ownership resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipConfig {
    /// Minimum weighted score for a signal to win.
    #[serde(default = "default_ownership_threshold")]
    pub confidence_threshold: f64,
    /// Fallback owner when no signal clears the threshold.
    #[serde(default)]
    pub default_owner: Option<String>,
    /// Provider configs keyed by provider name.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Per-provider call deadline in milliseconds.
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_ms: u64,
}

fn default_ownership_threshold() -> f64 {
    0.5
}

impl Default for OwnershipConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            default_owner: None,
            providers: BTreeMap::new(),
            provider_timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
        }
    }
}

/// Pattern-detection knobs for drift analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftPatternConfig {
    /// Scan for step changes.
    #[serde(default = "default_true")]
    pub detect_step_change: bool,
    /// Step size that counts as a step change, as a fraction of the budget
    /// scale [0, 1] (0.05 = five percentage points of budget).
    #[serde(default = "default_step_threshold")]
    pub step_change_threshold: f64,
    /// Step window: adjacent samples further apart than this never form a
    /// step. Seconds.
    #[serde(default = "default_step_window")]
    pub step_change_window_secs: u64,
    /// Scan for seasonal patterns.
    #[serde(default)]
    pub detect_seasonal: bool,
    /// Variance above which a poor fit is classified volatile.
    #[serde(default = "default_volatility_variance")]
    pub volatility_variance: f64,
}

fn default_step_threshold() -> f64 {
    0.05
}

fn default_step_window() -> u64 {
    36 * 3_600
}

fn default_volatility_variance() -> f64 {
    0.002
}

impl Default for DriftPatternConfig {
    fn default() -> Self {
        Self {
            detect_step_change: true,
            step_change_threshold: 0.05,
            step_change_window_secs: 36 * 3_600,
            detect_seasonal: false,
            volatility_variance: 0.002,
        }
    }
}

/// Drift analysis settings. Unset thresholds fall back to tier defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftSettings {
    /// Master switch.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Analysis window, e.g. "30d".
    #[serde(default = "default_drift_window")]
    pub window: String,
    /// Sampling step, e.g. "1h".
    #[serde(default = "default_drift_step")]
    pub step: String,
    /// Warn when weekly slope <= this (negative fraction of budget).
    #[serde(default)]
    pub warn_threshold: Option<f64>,
    /// Critical when weekly slope <= this.
    #[serde(default)]
    pub critical_threshold: Option<f64>,
    /// Warn when exhaustion is projected within this many days.
    #[serde(default)]
    pub exhaustion_warn_days: Option<f64>,
    /// Critical when exhaustion is projected within this many days.
    #[serde(default)]
    pub exhaustion_critical_days: Option<f64>,
    /// Pattern detection knobs.
    #[serde(default)]
    pub patterns: DriftPatternConfig,
}

fn default_drift_window() -> String {
    "30d".to_string()
}

fn default_drift_step() -> String {
    "1h".to_string()
}

impl Default for DriftSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            window: default_drift_window(),
            step: default_drift_step(),
            warn_threshold: None,
            critical_threshold: None,
            exhaustion_warn_days: None,
            exhaustion_critical_days: None,
            patterns: DriftPatternConfig::default(),
        }
    }
}

/// Thresholds and horizons derived from a service's tier, applied wherever
/// the spec and config are silent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierDefaults {
    /// Warn slope threshold, fraction of budget per week.
    pub warn_threshold: f64,
    /// Critical slope threshold, fraction of budget per week.
    pub critical_threshold: f64,
    /// Warn when exhaustion is within this many days.
    pub exhaustion_warn_days: f64,
    /// Critical when exhaustion is within this many days.
    pub exhaustion_critical_days: f64,
}

impl TierDefaults {
    /// Defaults for a tier.
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Critical => Self {
                warn_threshold: -0.005,
                critical_threshold: -0.01,
                exhaustion_warn_days: 45.0,
                exhaustion_critical_days: 14.0,
            },
            Tier::Standard => Self {
                warn_threshold: -0.005,
                critical_threshold: -0.01,
                exhaustion_warn_days: 30.0,
                exhaustion_critical_days: 7.0,
            },
            Tier::Low => Self {
                warn_threshold: -0.01,
                critical_threshold: -0.02,
                exhaustion_warn_days: 21.0,
                exhaustion_critical_days: 3.0,
            },
        }
    }
}

/// Metrics backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Base URL of the PromQL-compatible backend.
    #[serde(default = "default_metrics_url")]
    pub url: String,
    /// Label that carries the service name on its series.
    #[serde(default = "default_service_label")]
    pub service_label: String,
    /// Range-query deadline in milliseconds.
    #[serde(default = "default_range_timeout")]
    pub range_query_timeout_ms: u64,
}

fn default_metrics_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_service_label() -> String {
    "service".to_string()
}

fn default_range_timeout() -> u64 {
    DEFAULT_RANGE_QUERY_TIMEOUT_MS
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            url: default_metrics_url(),
            service_label: default_service_label(),
            range_query_timeout_ms: DEFAULT_RANGE_QUERY_TIMEOUT_MS,
        }
    }
}

/// Per-provider webhook ingestion settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookProviderConfig {
    /// Mount this provider's endpoint.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Shared secret for signature or token verification.
    #[serde(default)]
    pub secret: String,
}

/// Top-level configuration for the reliability core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NthLayerConfig {
    /// Discovery orchestration.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Identity resolution.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Ownership resolution.
    #[serde(default)]
    pub ownership: OwnershipConfig,
    /// Drift analysis.
    #[serde(default)]
    pub drift: DriftSettings,
    /// Metrics backend.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Webhook ingestion, keyed by provider name.
    #[serde(default)]
    pub webhooks: BTreeMap<String, WebhookProviderConfig>,
    /// Cache TTL in seconds for resolver/discovery/ownership caches.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}
