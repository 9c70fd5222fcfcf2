//! Repository traits for persisted state.
//!
//! These define the storage interface without naming an implementation;
//! the SQLite-backed versions live in `nthlayer-storage`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::DeploymentEvent;

/// Result type for repository operations.
pub type RepoResult<T> = anyhow::Result<T>;

/// Whether an insert created a row or found an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was persisted.
    Inserted,
    /// A row with the same `(provider, external_event_id)` already existed.
    Duplicate,
}

/// Store of normalized deployment events.
#[async_trait]
pub trait DeploymentEventRepository: Send + Sync {
    /// Persist an event. Idempotent on `(provider, external_event_id)`:
    /// delivering the same event twice leaves exactly one row.
    async fn insert(&self, event: &DeploymentEvent) -> RepoResult<InsertOutcome>;

    /// Look up one event by its idempotency key.
    async fn get(
        &self,
        provider: &str,
        external_event_id: &str,
    ) -> RepoResult<Option<DeploymentEvent>>;

    /// Events for a service within a time range, newest first.
    async fn list_for_service(
        &self,
        service: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> RepoResult<Vec<DeploymentEvent>>;

    /// Most recent events across all services, newest first.
    async fn list_recent(&self, limit: usize) -> RepoResult<Vec<DeploymentEvent>>;

    /// Delete events older than the cutoff. Returns rows removed.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> RepoResult<usize>;
}
