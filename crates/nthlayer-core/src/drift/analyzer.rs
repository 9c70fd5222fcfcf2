//! Trend fitting, pattern detection, projection, and severity for
//! error-budget series.
//!
//! The analysis itself is pure: given the same series, thresholds, and
//! configuration it produces an identical result. Wall-clock time only
//! enters when fetching the series; the reference timestamp for projections
//! is the last sample.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tracing::debug;

use crate::config::{parse_duration_secs, DriftSettings, TierDefaults};
use crate::domain::{
    BudgetPoint, BudgetSeries, DriftMetrics, DriftPattern, DriftProjection, DriftResult,
    ServiceSpec, Severity,
};
use crate::error::DriftAnalysisError;
use crate::metrics::MetricDiscovery;

/// Weekly slope magnitude below which the trend counts as flat.
const STABLE_SLOPE_PER_WEEK: f64 = 0.001;

/// r² below which a noisy series can be classified volatile.
const VOLATILE_R_SQUARED: f64 = 0.3;

/// Projections further out than this are reported as no exhaustion.
const MAX_PROJECTION_DAYS: f64 = 365.0;

/// Effective thresholds after layering spec overrides, global settings, and
/// tier defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftThresholds {
    /// Warn when weekly slope is at or below this (negative).
    pub warn_slope_per_week: f64,
    /// Critical when weekly slope is at or below this (negative).
    pub critical_slope_per_week: f64,
    /// Warn when exhaustion is projected within this many days.
    pub exhaustion_warn_days: f64,
    /// Critical when exhaustion is projected within this many days.
    pub exhaustion_critical_days: f64,
}

impl DriftThresholds {
    /// Layer spec > settings > tier defaults.
    pub fn resolve(spec: &ServiceSpec, settings: &DriftSettings) -> Self {
        let tier = TierDefaults::for_tier(spec.tier);
        let overrides = spec.drift.clone().unwrap_or_default();
        Self {
            warn_slope_per_week: overrides
                .warn_threshold
                .or(settings.warn_threshold)
                .unwrap_or(tier.warn_threshold),
            critical_slope_per_week: overrides
                .critical_threshold
                .or(settings.critical_threshold)
                .unwrap_or(tier.critical_threshold),
            exhaustion_warn_days: overrides
                .exhaustion_warn_days
                .or(settings.exhaustion_warn_days)
                .unwrap_or(tier.exhaustion_warn_days),
            exhaustion_critical_days: overrides
                .exhaustion_critical_days
                .or(settings.exhaustion_critical_days)
                .unwrap_or(tier.exhaustion_critical_days),
        }
    }
}

/// Detects gradual error-budget degradation and projects exhaustion.
pub struct DriftAnalyzer {
    settings: DriftSettings,
    metrics: Arc<dyn MetricDiscovery>,
}

impl DriftAnalyzer {
    /// Create an analyzer backed by a metrics discovery client.
    pub fn new(settings: DriftSettings, metrics: Arc<dyn MetricDiscovery>) -> Self {
        Self { settings, metrics }
    }

    /// Fetch the budget series for one of the spec's SLOs and analyze it.
    /// `window` overrides the configured analysis window; `slo` selects an
    /// SLO by name, defaulting to the spec's first.
    pub async fn analyze(
        &self,
        spec: &ServiceSpec,
        window: Option<&str>,
        slo: Option<&str>,
    ) -> Result<DriftResult, DriftAnalysisError> {
        let slo_name = match slo {
            Some(name) => spec
                .slos
                .iter()
                .find(|s| s.name == name)
                .map(|s| s.name.clone())
                .ok_or_else(|| DriftAnalysisError::UnknownSlo(name.to_string()))?,
            None => spec
                .slos
                .first()
                .map(|s| s.name.clone())
                .unwrap_or_else(|| "availability".to_string()),
        };

        let window_spec = window
            .map(str::to_string)
            .or_else(|| spec.drift.as_ref().and_then(|d| d.window.clone()))
            .unwrap_or_else(|| self.settings.window.clone());
        let window_secs = parse_duration_secs(&window_spec)
            .map_err(DriftAnalysisError::InvalidWindow)?;
        if window_secs == 0 {
            return Err(DriftAnalysisError::InvalidWindow(window_spec));
        }
        let step_secs = parse_duration_secs(&self.settings.step).unwrap_or(3_600);

        let expr = format!(
            "slo:error_budget_remaining:ratio{{service=\"{}\",slo=\"{}\"}}",
            spec.name, slo_name
        );
        let end = chrono::Utc::now();
        let start = end - ChronoDuration::seconds(window_secs as i64);
        debug!("[Drift] querying {} over {}", expr, window_spec);
        let series = self
            .metrics
            .range_query(&expr, start, end, step_secs)
            .await?;

        self.analyze_series(&spec.name, spec.tier.as_str(), &slo_name, window_secs, &series)
            .map(|mut result| {
                let thresholds = DriftThresholds::resolve(spec, &self.settings);
                apply_thresholds(&mut result, &thresholds);
                result
            })
    }

    /// Pure analysis over an already-fetched series, using the default
    /// thresholds of the `standard` tier. Callers wanting tier- or
    /// spec-derived thresholds re-apply them via [`DriftThresholds`].
    pub fn analyze_series(
        &self,
        service: &str,
        tier: &str,
        slo: &str,
        window_secs: u64,
        series: &BudgetSeries,
    ) -> Result<DriftResult, DriftAnalysisError> {
        if series.len() < 2 {
            return Err(DriftAnalysisError::InsufficientData {
                points: series.len(),
            });
        }

        let fit = fit_least_squares(&series.points);
        let current = series.current().unwrap_or(0.0);
        let metrics = DriftMetrics {
            slope_per_day: fit.slope_per_sec * 86_400.0,
            slope_per_week: fit.slope_per_sec * 604_800.0,
            r_squared: fit.r_squared,
            current_budget: current,
            window_start_budget: series.points.first().map(|p| p.value).unwrap_or(0.0),
            variance: fit.variance,
            data_points: series.len(),
        };

        let step = detect_step(&series.points, &self.settings.patterns);
        let seasonal = detect_seasonal(&series.points, series.step_seconds, &self.settings.patterns);
        let pattern = classify_pattern(&metrics, step.as_ref(), seasonal, &self.settings.patterns);

        // A step change resets the trend; project from the post-step
        // segment so the old regime does not distort exhaustion estimates.
        let projection_slope = match &step {
            Some(found) if series.points.len() - (found.index + 1) >= 2 => {
                fit_least_squares(&series.points[found.index + 1..]).slope_per_sec
            }
            Some(_) => 0.0,
            None => fit.slope_per_sec,
        };
        let projection = project(current, projection_slope, metrics.slope_per_day, fit.r_squared);

        let mut metadata = BTreeMap::new();
        let expected_points = (window_secs / series.step_seconds.max(1)) as usize;
        if expected_points > 0 && series.len() < expected_points / 2 {
            metadata.insert("reduced_confidence".to_string(), "true".to_string());
        }

        let mut result = DriftResult {
            service: service.to_string(),
            tier: tier.to_string(),
            slo: slo.to_string(),
            window_seconds: window_secs,
            metrics,
            projection,
            pattern,
            severity: Severity::None,
            summary: String::new(),
            recommendation: String::new(),
            metadata,
        };
        let defaults = TierDefaults::for_tier(crate::domain::Tier::Standard);
        apply_thresholds(
            &mut result,
            &DriftThresholds {
                warn_slope_per_week: defaults.warn_threshold,
                critical_slope_per_week: defaults.critical_threshold,
                exhaustion_warn_days: defaults.exhaustion_warn_days,
                exhaustion_critical_days: defaults.exhaustion_critical_days,
            },
        );
        Ok(result)
    }
}

/// Re-derive severity, summary, and recommendation under new thresholds.
fn apply_thresholds(result: &mut DriftResult, thresholds: &DriftThresholds) {
    result.severity = classify_severity(
        &result.metrics,
        &result.projection,
        result.pattern,
        thresholds,
    );
    result.summary = summarize(result);
    result.recommendation = recommend(result.pattern, result.severity);
}

struct Fit {
    slope_per_sec: f64,
    r_squared: f64,
    variance: f64,
}

/// Ordinary least squares over (seconds-from-start, value).
fn fit_least_squares(points: &[BudgetPoint]) -> Fit {
    let n = points.len() as f64;
    let t0 = points[0].at.timestamp();
    let xs: Vec<f64> = points.iter().map(|p| (p.at.timestamp() - t0) as f64).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.value).collect();

    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }

    let slope_per_sec = if var_x == 0.0 { 0.0 } else { cov / var_x };
    let r_squared = if var_x == 0.0 || var_y == 0.0 {
        // A perfectly flat series is perfectly explained by a flat line.
        1.0
    } else {
        (cov * cov) / (var_x * var_y)
    };

    Fit {
        slope_per_sec,
        r_squared: r_squared.clamp(0.0, 1.0),
        variance: var_y / n,
    }
}

struct StepChange {
    index: usize,
    delta: f64,
}

/// Largest adjacent-sample jump within the step window, above threshold.
fn detect_step(
    points: &[BudgetPoint],
    patterns: &crate::config::DriftPatternConfig,
) -> Option<StepChange> {
    if !patterns.detect_step_change {
        return None;
    }
    let mut best: Option<StepChange> = None;
    for (index, pair) in points.windows(2).enumerate() {
        let dt = (pair[1].at - pair[0].at).num_seconds();
        if dt < 0 || dt as u64 > patterns.step_change_window_secs {
            continue;
        }
        let delta = pair[1].value - pair[0].value;
        if delta.abs() > patterns.step_change_threshold {
            let replace = match &best {
                Some(existing) => delta.abs() > existing.delta.abs(),
                None => true,
            };
            if replace {
                best = Some(StepChange { index, delta });
            }
        }
    }
    best
}

/// Daily-period autocorrelation above this marks a seasonal series.
const SEASONAL_AUTOCORRELATION: f64 = 0.5;

/// Autocorrelation at a one-day lag. Only meaningful when the series spans
/// at least two periods.
fn detect_seasonal(
    points: &[BudgetPoint],
    step_seconds: u64,
    patterns: &crate::config::DriftPatternConfig,
) -> bool {
    if !patterns.detect_seasonal {
        return false;
    }
    let lag = (86_400 / step_seconds.max(1)) as usize;
    if lag == 0 || points.len() < lag * 2 {
        return false;
    }

    let n = points.len();
    let mean = points.iter().map(|p| p.value).sum::<f64>() / n as f64;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (index, point) in points.iter().enumerate() {
        let centered = point.value - mean;
        denominator += centered * centered;
        if index + lag < n {
            numerator += centered * (points[index + lag].value - mean);
        }
    }
    denominator > 0.0 && numerator / denominator > SEASONAL_AUTOCORRELATION
}

/// Classify the trend shape. Priority: step change, volatile, seasonal,
/// stable, gradual.
fn classify_pattern(
    metrics: &DriftMetrics,
    step: Option<&StepChange>,
    seasonal: bool,
    patterns: &crate::config::DriftPatternConfig,
) -> DriftPattern {
    if let Some(step) = step {
        return if step.delta < 0.0 {
            DriftPattern::StepChangeDown
        } else {
            DriftPattern::StepChangeUp
        };
    }
    if metrics.r_squared < VOLATILE_R_SQUARED && metrics.variance > patterns.volatility_variance {
        return DriftPattern::Volatile;
    }
    if seasonal {
        return DriftPattern::Seasonal;
    }
    if metrics.slope_per_week.abs() < STABLE_SLOPE_PER_WEEK {
        return DriftPattern::Stable;
    }
    if metrics.slope_per_week < 0.0 {
        DriftPattern::GradualDecline
    } else {
        DriftPattern::GradualImprovement
    }
}

/// Project exhaustion from the trend slope.
fn project(current: f64, slope_per_sec: f64, slope_per_day: f64, confidence: f64) -> DriftProjection {
    let days_until_exhaustion = if current <= 0.0 {
        Some(0.0)
    } else if slope_per_sec >= 0.0 {
        None
    } else {
        let days = current / slope_per_sec.abs() / 86_400.0;
        if days > MAX_PROJECTION_DAYS {
            None
        } else {
            Some(days)
        }
    };

    DriftProjection {
        days_until_exhaustion,
        budget_in_30d: (current + slope_per_day * 30.0).clamp(0.0, 1.0),
        budget_in_60d: (current + slope_per_day * 60.0).clamp(0.0, 1.0),
        budget_in_90d: (current + slope_per_day * 90.0).clamp(0.0, 1.0),
        confidence,
    }
}

/// Severity rules in priority order.
fn classify_severity(
    metrics: &DriftMetrics,
    projection: &DriftProjection,
    pattern: DriftPattern,
    thresholds: &DriftThresholds,
) -> Severity {
    if let Some(days) = projection.days_until_exhaustion {
        if days <= thresholds.exhaustion_critical_days {
            return Severity::Critical;
        }
    }
    if pattern == DriftPattern::StepChangeDown {
        return Severity::Critical;
    }
    if metrics.slope_per_week <= thresholds.critical_slope_per_week {
        return Severity::Critical;
    }
    if let Some(days) = projection.days_until_exhaustion {
        if days <= thresholds.exhaustion_warn_days {
            return Severity::Warn;
        }
    }
    if metrics.slope_per_week <= thresholds.warn_slope_per_week {
        return Severity::Warn;
    }
    if metrics.slope_per_week < 0.0 {
        return Severity::Info;
    }
    Severity::None
}

fn summarize(result: &DriftResult) -> String {
    let slope_pct = result.metrics.slope_per_week * 100.0;
    let base = format!(
        "{}/{}: budget {:.1}%, trend {:+.2}%/week, pattern {}",
        result.service,
        result.slo,
        result.metrics.current_budget * 100.0,
        slope_pct,
        result.pattern.as_str(),
    );
    match result.projection.days_until_exhaustion {
        Some(days) if days > 0.0 => format!("{base}, exhaustion in ~{days:.0}d"),
        Some(_) => format!("{base}, budget exhausted"),
        None => base,
    }
}

fn recommend(pattern: DriftPattern, severity: Severity) -> String {
    match (pattern, severity) {
        (DriftPattern::StepChangeDown, _) => {
            "Budget dropped sharply; correlate with recent deployments and consider a rollback."
        }
        (DriftPattern::GradualDecline, Severity::Critical) => {
            "Sustained burn will exhaust the budget; freeze risky changes and prioritize reliability work."
        }
        (DriftPattern::GradualDecline, Severity::Warn) => {
            "Budget is trending down; schedule reliability work before the trend forces it."
        }
        (DriftPattern::GradualDecline, _) => {
            "Slight downward trend; keep an eye on the next review cycle."
        }
        (DriftPattern::Volatile, _) => {
            "Budget is noisy; tighten SLI measurement or investigate intermittent failures."
        }
        (DriftPattern::Seasonal, _) => {
            "Budget swings follow a periodic cycle; align alert windows with the cycle."
        }
        (DriftPattern::StepChangeUp | DriftPattern::GradualImprovement, _) => {
            "Budget is recovering; no action needed."
        }
        (DriftPattern::Stable, _) => "Budget is stable; no action needed.",
    }
    .to_string()
}
