//! Correlation of deployment events with SLO burn windows.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DeploymentEvent;
use crate::identity::IdentityResolver;

/// Default lookback: a deployment up to this long before the burn started
/// can still be implicated.
pub const DEFAULT_CORRELATION_WINDOW_SECS: u64 = 2 * 3_600;

/// A period during which an SLO burned noticeably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnWindow {
    /// Canonical service name.
    pub service: String,
    /// SLO name.
    pub slo: String,
    /// When the burn began.
    pub started_at: DateTime<Utc>,
    /// When the burn ended (or the analysis time, if ongoing).
    pub ended_at: DateTime<Utc>,
}

/// A deployment implicated in a burn window, with an attribution score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedDeployment {
    /// The implicated event.
    pub event: DeploymentEvent,
    /// Attribution score in [0, 1]: 1.0 inside the window, decaying
    /// linearly with distance before it.
    pub score: f64,
}

/// Matches deployment events to burn windows by identity and timestamp
/// proximity.
pub struct DeploymentCorrelator {
    identity: Arc<IdentityResolver>,
    lookback_secs: u64,
}

impl DeploymentCorrelator {
    /// Create a correlator with the default lookback.
    pub fn new(identity: Arc<IdentityResolver>) -> Self {
        Self {
            identity,
            lookback_secs: DEFAULT_CORRELATION_WINDOW_SECS,
        }
    }

    /// Override the lookback window.
    pub fn with_lookback_secs(mut self, secs: u64) -> Self {
        self.lookback_secs = secs;
        self
    }

    /// Score every candidate event against the burn window. Events for
    /// other services score zero and are dropped; results are sorted by
    /// descending score, ties broken by recency then event id.
    pub fn correlate(
        &self,
        burn: &BurnWindow,
        events: &[DeploymentEvent],
    ) -> Vec<CorrelatedDeployment> {
        let mut matches: Vec<CorrelatedDeployment> = events
            .iter()
            .filter(|event| self.same_service(burn, event))
            .filter_map(|event| {
                let score = self.score(burn, event);
                (score > 0.0).then(|| CorrelatedDeployment {
                    event: event.clone(),
                    score,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.event.finished_at.cmp(&a.event.finished_at))
                .then_with(|| a.event.id.cmp(&b.event.id))
        });
        matches
    }

    /// The event's raw service name must resolve to the burn's canonical
    /// service.
    fn same_service(&self, burn: &BurnWindow, event: &DeploymentEvent) -> bool {
        let resolved = self
            .identity
            .resolve(&event.service, Some(&event.provider), None);
        match resolved.identity {
            Some(identity) => identity.canonical_name == burn.service,
            None => event.service == burn.service,
        }
    }

    fn score(&self, burn: &BurnWindow, event: &DeploymentEvent) -> f64 {
        let finished = event.finished_at;
        if finished >= burn.started_at && finished <= burn.ended_at {
            return 1.0;
        }
        if finished > burn.ended_at {
            // Deployed after the burn; cannot have caused it.
            return 0.0;
        }
        let lookback = ChronoDuration::seconds(self.lookback_secs as i64);
        let earliest = burn.started_at - lookback;
        if finished < earliest {
            return 0.0;
        }
        // Linear decay across the lookback window.
        let gap = (burn.started_at - finished).num_seconds() as f64;
        (1.0 - gap / self.lookback_secs as f64).clamp(0.0, 1.0)
    }
}
