//! Mock providers and backends with scriptable behavior.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

use nthlayer_core::domain::{
    BudgetPoint, BudgetSeries, DiscoveredDependency, OwnershipSignal, ProviderHealth,
};
use nthlayer_core::discovery::DiscoveryProvider;
use nthlayer_core::error::{MetricDiscoveryError, ProviderError};
use nthlayer_core::metrics::MetricDiscovery;
use nthlayer_core::ownership::OwnershipProvider;

/// Discovery provider returning a fixed edge set, optionally failing.
pub struct MockDiscoveryProvider {
    pub provider_name: String,
    pub edges: Vec<DiscoveredDependency>,
    pub attributes: BTreeMap<String, BTreeMap<String, String>>,
    pub fail: bool,
}

impl MockDiscoveryProvider {
    /// A healthy provider with the given edges.
    pub fn new(name: &str, edges: Vec<DiscoveredDependency>) -> Self {
        Self {
            provider_name: name.to_string(),
            edges,
            attributes: BTreeMap::new(),
            fail: false,
        }
    }

    /// Attach correlation attributes for a raw service name.
    pub fn with_attributes(mut self, service: &str, attrs: BTreeMap<String, String>) -> Self {
        self.attributes.insert(service.to_string(), attrs);
        self
    }
}

#[async_trait]
impl DiscoveryProvider for MockDiscoveryProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn discover(
        &self,
        service: &str,
    ) -> Result<Vec<DiscoveredDependency>, ProviderError> {
        if self.fail {
            return Err(ProviderError::Transient {
                provider: self.provider_name.clone(),
                message: "mock failure".to_string(),
            });
        }
        Ok(self
            .edges
            .iter()
            .filter(|e| e.source_service == service || e.target_service == service)
            .cloned()
            .collect())
    }

    async fn list_services(&self) -> Result<Vec<String>, ProviderError> {
        let mut names = BTreeSet::new();
        for edge in &self.edges {
            names.insert(edge.source_service.clone());
            names.insert(edge.target_service.clone());
        }
        Ok(names.into_iter().collect())
    }

    async fn health_check(&self) -> ProviderHealth {
        if self.fail {
            ProviderHealth::unhealthy("mock failure")
        } else {
            ProviderHealth::healthy("ok")
        }
    }

    async fn get_service_attributes(&self, service: &str) -> BTreeMap<String, String> {
        self.attributes.get(service).cloned().unwrap_or_default()
    }
}

/// Ownership provider returning one fixed signal.
pub struct MockOwnershipProvider {
    pub provider_name: String,
    pub signal: Option<OwnershipSignal>,
}

#[async_trait]
impl OwnershipProvider for MockOwnershipProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn signal(
        &self,
        _service: &str,
        _repository: Option<&str>,
    ) -> Result<Option<OwnershipSignal>, ProviderError> {
        Ok(self.signal.clone())
    }
}

/// Metrics backend with a scripted metric set and budget series. Records
/// the expressions it was asked to evaluate.
pub struct ScriptedMetrics {
    pub metrics: BTreeSet<String>,
    pub series: BudgetSeries,
    pub queries: Mutex<Vec<String>>,
}

impl ScriptedMetrics {
    /// Backend exposing `metrics` and answering every range query with
    /// `series`.
    pub fn new(metrics: &[&str], series: BudgetSeries) -> Self {
        Self {
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            series,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Backend with no metrics and an empty series.
    pub fn empty() -> Self {
        Self::new(&[], BudgetSeries::new(Vec::new(), 3_600))
    }
}

#[async_trait]
impl MetricDiscovery for ScriptedMetrics {
    async fn discover_for_service(
        &self,
        _service: &str,
    ) -> Result<BTreeSet<String>, MetricDiscoveryError> {
        Ok(self.metrics.clone())
    }

    async fn label_values(
        &self,
        _label: &str,
    ) -> Result<BTreeSet<String>, MetricDiscoveryError> {
        Ok(BTreeSet::new())
    }

    async fn range_query(
        &self,
        expr: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _step_seconds: u64,
    ) -> Result<BudgetSeries, MetricDiscoveryError> {
        self.queries.lock().unwrap().push(expr.to_string());
        Ok(self.series.clone())
    }
}

/// A budget series of daily samples starting 2025-01-01.
pub fn daily_series(values: &[f64]) -> BudgetSeries {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let points = values
        .iter()
        .enumerate()
        .map(|(day, value)| BudgetPoint {
            at: start + ChronoDuration::days(day as i64),
            value: *value,
        })
        .collect();
    BudgetSeries::new(points, 86_400)
}
