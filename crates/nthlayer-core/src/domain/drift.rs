//! Error-budget drift: series, fitted metrics, projections, results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sample of error-budget-remaining ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetPoint {
    /// Sample timestamp.
    pub at: DateTime<Utc>,
    /// Budget remaining in [0, 1] (may dip below 0 when overspent).
    pub value: f64,
}

/// Time-indexed error-budget series returned by a range query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSeries {
    /// Samples in ascending time order.
    pub points: Vec<BudgetPoint>,
    /// Sampling step in seconds.
    pub step_seconds: u64,
}

impl BudgetSeries {
    /// Build a series from (timestamp, value) pairs.
    pub fn new(points: Vec<BudgetPoint>, step_seconds: u64) -> Self {
        Self {
            points,
            step_seconds,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the series has no samples.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Latest sample value, if any.
    pub fn current(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }
}

/// Numerics from the regression fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftMetrics {
    /// Budget change per day (negative = burning).
    pub slope_per_day: f64,
    /// Budget change per week.
    pub slope_per_week: f64,
    /// Goodness of fit in [0, 1].
    pub r_squared: f64,
    /// Latest budget value.
    pub current_budget: f64,
    /// Budget at the start of the window.
    pub window_start_budget: f64,
    /// Sample variance of the series.
    pub variance: f64,
    /// Number of samples fitted.
    pub data_points: usize,
}

/// Forward projection from the fitted trend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftProjection {
    /// Days until the budget hits zero at the current trend. None when the
    /// trend is flat/improving or the horizon exceeds a year; Some(0) when
    /// already exhausted.
    pub days_until_exhaustion: Option<f64>,
    /// Projected budget 30 days out.
    pub budget_in_30d: f64,
    /// Projected budget 60 days out.
    pub budget_in_60d: f64,
    /// Projected budget 90 days out.
    pub budget_in_90d: f64,
    /// Confidence in the projection (r² of the fit).
    pub confidence: f64,
}

/// Shape of the budget trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftPattern {
    /// No meaningful slope.
    Stable,
    /// Slow, consistent burn.
    GradualDecline,
    /// Slow, consistent recovery.
    GradualImprovement,
    /// Sudden drop between adjacent samples.
    StepChangeDown,
    /// Sudden recovery between adjacent samples.
    StepChangeUp,
    /// Recurring periodic swings.
    Seasonal,
    /// Noisy; fit explains little.
    Volatile,
}

impl DriftPattern {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftPattern::Stable => "stable",
            DriftPattern::GradualDecline => "gradual_decline",
            DriftPattern::GradualImprovement => "gradual_improvement",
            DriftPattern::StepChangeDown => "step_change_down",
            DriftPattern::StepChangeUp => "step_change_up",
            DriftPattern::Seasonal => "seasonal",
            DriftPattern::Volatile => "volatile",
        }
    }
}

/// Severity of a drift finding. Total order: None < Info < Warn < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Nothing notable.
    None,
    /// Negative trend, within thresholds.
    Info,
    /// Trend or projection crosses the warn threshold.
    Warn,
    /// Trend, projection, or pattern demands action.
    Critical,
}

impl Severity {
    /// Process exit code contract: 0 ok, 1 warnings, 2 critical.
    pub fn exit_code(&self) -> i32 {
        match self {
            Severity::None | Severity::Info => 0,
            Severity::Warn => 1,
            Severity::Critical => 2,
        }
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Critical => "critical",
        }
    }
}

/// Full drift analysis for one (service, SLO) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftResult {
    /// Canonical service name.
    pub service: String,
    /// Service tier, as analyzed.
    pub tier: String,
    /// SLO name the budget belongs to.
    pub slo: String,
    /// Analysis window in seconds.
    pub window_seconds: u64,
    /// Fitted numerics.
    pub metrics: DriftMetrics,
    /// Forward projection.
    pub projection: DriftProjection,
    /// Classified trend shape.
    pub pattern: DriftPattern,
    /// Classified severity.
    pub severity: Severity,
    /// One-line human summary.
    pub summary: String,
    /// Action recommendation keyed off pattern and severity.
    pub recommendation: String,
    /// Analysis annotations (e.g. reduced_confidence on sparse data).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl DriftResult {
    /// Exit code for CLI callers.
    pub fn exit_code(&self) -> i32 {
        self.severity.exit_code()
    }
}
