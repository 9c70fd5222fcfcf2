//! Prometheus-compatible implementation of [`MetricDiscovery`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::config::MetricsConfig;
use crate::domain::{BudgetPoint, BudgetSeries};
use crate::error::MetricDiscoveryError;
use crate::identity::TtlCache;

use super::MetricDiscovery;

/// Envelope every Prometheus API response shares.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: String,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

/// One row of `/api/v1/query_range` matrix data.
#[derive(Debug, Deserialize)]
struct MatrixSeries {
    #[allow(dead_code)]
    metric: BTreeMap<String, String>,
    values: Vec<(f64, String)>,
}

#[derive(Debug, Default, Deserialize)]
struct MatrixData {
    result: Vec<MatrixSeries>,
}

/// Client for a PromQL-compatible backend (Prometheus, Thanos, Mimir).
pub struct PrometheusDiscovery {
    base_url: String,
    service_label: String,
    timeout: Duration,
    client: reqwest::Client,
    series_cache: Mutex<TtlCache<String, BTreeSet<String>>>,
}

impl PrometheusDiscovery {
    /// Create a client from metrics configuration.
    pub fn new(config: &MetricsConfig, cache_ttl: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.range_query_timeout_ms))
            .user_agent("nthlayer/0.1")
            .build()
            .unwrap_or_default();
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            service_label: config.service_label.clone(),
            timeout: Duration::from_millis(config.range_query_timeout_ms),
            client,
            series_cache: Mutex::new(TtlCache::new(1_024, cache_ttl)),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned + std::default::Default>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, MetricDiscoveryError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| MetricDiscoveryError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MetricDiscoveryError::Backend(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| MetricDiscoveryError::Malformed(e.to_string()))?;

        if envelope.status != "success" {
            return Err(MetricDiscoveryError::Backend(
                envelope.error.unwrap_or_else(|| "query failed".to_string()),
            ));
        }
        envelope
            .data
            .ok_or_else(|| MetricDiscoveryError::Malformed("missing data field".to_string()))
    }
}

#[async_trait]
impl MetricDiscovery for PrometheusDiscovery {
    async fn discover_for_service(
        &self,
        service: &str,
    ) -> Result<BTreeSet<String>, MetricDiscoveryError> {
        if let Ok(mut cache) = self.series_cache.lock() {
            if let Some(hit) = cache.get(&service.to_string()) {
                return Ok(hit);
            }
        }

        let matcher = format!("{{{}={:?}}}", self.service_label, service);
        let series: Vec<BTreeMap<String, String>> = self
            .get_json("/api/v1/series", &[("match[]", matcher)])
            .await?;

        let names: BTreeSet<String> = series
            .into_iter()
            .filter_map(|mut labels| labels.remove("__name__"))
            .collect();
        debug!(
            "[Metrics] discovered {} metric families for {}",
            names.len(),
            service
        );

        if let Ok(mut cache) = self.series_cache.lock() {
            cache.insert(service.to_string(), names.clone());
        }
        Ok(names)
    }

    async fn label_values(&self, label: &str) -> Result<BTreeSet<String>, MetricDiscoveryError> {
        let values: Vec<String> = self
            .get_json(&format!("/api/v1/label/{label}/values"), &[])
            .await?;
        Ok(values.into_iter().collect())
    }

    async fn range_query(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_seconds: u64,
    ) -> Result<BudgetSeries, MetricDiscoveryError> {
        let data: MatrixData = self
            .get_json(
                "/api/v1/query_range",
                &[
                    ("query", expr.to_string()),
                    ("start", start.timestamp().to_string()),
                    ("end", end.timestamp().to_string()),
                    ("step", format!("{step_seconds}s")),
                ],
            )
            .await?;

        let mut points = Vec::new();
        if let Some(series) = data.result.into_iter().next() {
            for (ts, value) in series.values {
                let value: f64 = value
                    .parse()
                    .map_err(|_| MetricDiscoveryError::Malformed(format!("bad sample {value:?}")))?;
                let at = DateTime::<Utc>::from_timestamp(ts as i64, 0).ok_or_else(|| {
                    MetricDiscoveryError::Malformed(format!("bad timestamp {ts}"))
                })?;
                points.push(BudgetPoint { at, value });
            }
        }
        Ok(BudgetSeries::new(points, step_seconds))
    }
}
