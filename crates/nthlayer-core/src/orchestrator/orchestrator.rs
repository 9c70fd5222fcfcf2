//! Plan/apply entry points.
//!
//! `plan` is pure: it renders every artifact, hashes it, and diffs against
//! the caller's baseline without touching any sink. `apply` writes artifacts
//! in generation order and stops at the first failure; artifacts already
//! written stay written and are reported.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{
    AppliedSet, ArtifactStatus, ChangeKind, Plan, PlanEntry, ServiceSpec,
};
use crate::error::{SinkError, SpecValidationError};

use super::detector::ResourceDetector;
use super::generators::{generate_all, GenerationContext};
use super::sink::ArtifactSink;

/// Write attempts per artifact for transient sink failures.
const SINK_RETRIES: u32 = 3;

/// Base backoff between write attempts.
const SINK_BACKOFF: Duration = Duration::from_millis(100);

/// The public entry for `plan` and `apply` over one ServiceSpec.
///
/// Generators within a spec run sequentially so output ordering is
/// deterministic; callers orchestrate multiple specs in parallel if they
/// want latency.
pub struct ServiceOrchestrator {
    sink: Arc<dyn ArtifactSink>,
}

impl ServiceOrchestrator {
    /// Create an orchestrator writing to the given sink.
    pub fn new(sink: Arc<dyn ArtifactSink>) -> Self {
        Self { sink }
    }

    /// Preview generation: every artifact rendered, hashed, and diffed
    /// against `ctx.baseline_hashes`. Never writes. Generator failures are
    /// recorded per artifact and do not stop the preview.
    pub fn plan(
        &self,
        spec: &ServiceSpec,
        ctx: &GenerationContext,
    ) -> Result<Plan, SpecValidationError> {
        let index = ResourceDetector::index(spec)?;
        let mut entries = Vec::new();

        for (kind, outcome) in generate_all(&index, ctx) {
            match outcome {
                Ok((artifact, diff_summary)) => {
                    let content_hash = artifact.content_hash();
                    let change = match ctx.baseline_hashes.get(&kind) {
                        None => ChangeKind::Create,
                        Some(previous) if *previous == content_hash => ChangeKind::Unchanged,
                        Some(_) => ChangeKind::Update,
                    };
                    entries.push(PlanEntry {
                        kind,
                        service: spec.name.clone(),
                        content_hash,
                        change,
                        diff_summary,
                    });
                }
                Err(error) => {
                    warn!("[Orchestrator] plan: {} failed: {}", kind.as_str(), error);
                    entries.push(PlanEntry {
                        kind,
                        service: spec.name.clone(),
                        content_hash: String::new(),
                        change: ChangeKind::Create,
                        diff_summary: format!("generation failed: {error}"),
                    });
                }
            }
        }

        Ok(Plan { entries })
    }

    /// Realize the plan: write artifacts to the sink in generation order.
    /// A generator failure, a permanent sink failure, an exhausted retry
    /// budget, or cancellation stops the run before any later artifact is
    /// written. Earlier writes are not rolled back.
    pub async fn apply(
        &self,
        spec: &ServiceSpec,
        ctx: &GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<AppliedSet, SpecValidationError> {
        let index = ResourceDetector::index(spec)?;
        let mut applied = AppliedSet::default();

        for (kind, outcome) in generate_all(&index, ctx) {
            if cancel.is_cancelled() {
                applied.aborted = Some("cancelled".to_string());
                break;
            }

            let (artifact, _) = match outcome {
                Ok(rendered) => rendered,
                Err(error) => {
                    applied.statuses.push(ArtifactStatus {
                        kind,
                        service: spec.name.clone(),
                        written: false,
                        message: Some(error.to_string()),
                    });
                    applied.aborted = Some(format!("{} generation failed", kind.as_str()));
                    break;
                }
            };

            match self.write_with_retry(&artifact, cancel).await {
                Ok(()) => {
                    applied.statuses.push(ArtifactStatus {
                        kind,
                        service: spec.name.clone(),
                        written: true,
                        message: None,
                    });
                }
                Err(error) => {
                    applied.statuses.push(ArtifactStatus {
                        kind,
                        service: spec.name.clone(),
                        written: false,
                        message: Some(error.to_string()),
                    });
                    applied.aborted = Some(format!("{} write failed", kind.as_str()));
                    break;
                }
            }
        }

        info!(
            "[Orchestrator] apply {}: {} written, aborted={:?}",
            spec.name,
            applied.statuses.iter().filter(|s| s.written).count(),
            applied.aborted
        );
        Ok(applied)
    }

    /// Transient sink failures retry with exponential backoff; permanent
    /// failures and cancellation do not.
    async fn write_with_retry(
        &self,
        artifact: &crate::domain::Artifact,
        cancel: &CancellationToken,
    ) -> Result<(), SinkError> {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(SinkError::Permanent {
                    target: artifact.kind.filename().to_string(),
                    message: "cancelled".to_string(),
                });
            }
            match self.sink.write(artifact).await {
                Ok(()) => return Ok(()),
                Err(error @ SinkError::Permanent { .. }) => return Err(error),
                Err(error @ SinkError::Transient { .. }) => {
                    attempt += 1;
                    if attempt >= SINK_RETRIES {
                        return Err(error);
                    }
                    warn!(
                        "[Orchestrator] transient sink failure (attempt {}): {}",
                        attempt, error
                    );
                    tokio::time::sleep(SINK_BACKOFF * 2_u32.pow(attempt - 1)).await;
                }
            }
        }
    }
}
