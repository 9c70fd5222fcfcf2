//! SQLite implementation of DeploymentEventRepository.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nthlayer_core::domain::DeploymentEvent;
use nthlayer_core::repository::{DeploymentEventRepository, InsertOutcome, RepoResult};
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::Database;

/// SQLite-backed implementation of DeploymentEventRepository.
pub struct SqliteDeploymentEventRepository {
    db: Arc<Mutex<Database>>,
}

impl SqliteDeploymentEventRepository {
    /// Create a new SQLite deployment event repository.
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Parse a datetime string to DateTime<Utc>.
    fn parse_datetime(s: &str) -> DateTime<Utc> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return dt.with_timezone(&Utc);
        }
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return dt.and_utc();
        }
        Utc::now()
    }

    /// Standard column list for SELECT queries.
    const SELECT_COLUMNS: &'static str =
        "id, provider, external_event_id, service, environment, commit_sha,
         author, started_at, finished_at, raw_payload";

    /// Map a row to DeploymentEvent.
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<DeploymentEvent> {
        let id: String = row.get(0)?;
        let provider: String = row.get(1)?;
        let external_event_id: String = row.get(2)?;
        let service: String = row.get(3)?;
        let environment: String = row.get(4)?;
        let commit_sha: String = row.get(5)?;
        let author: Option<String> = row.get(6)?;
        let started_at: Option<String> = row.get(7)?;
        let finished_at: String = row.get(8)?;
        let raw_payload: String = row.get(9)?;

        Ok(DeploymentEvent {
            id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::new_v4()),
            provider,
            external_event_id,
            service,
            environment,
            commit_sha,
            author,
            started_at: started_at.as_deref().map(Self::parse_datetime),
            finished_at: Self::parse_datetime(&finished_at),
            raw_payload,
        })
    }
}

#[async_trait]
impl DeploymentEventRepository for SqliteDeploymentEventRepository {
    async fn insert(&self, event: &DeploymentEvent) -> RepoResult<InsertOutcome> {
        let db = self.db.lock().await;
        let changed = db.transaction(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO deployment_events
                 (id, provider, external_event_id, service, environment, commit_sha,
                  author, started_at, finished_at, raw_payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    event.id.to_string(),
                    event.provider,
                    event.external_event_id,
                    event.service,
                    event.environment,
                    event.commit_sha,
                    event.author,
                    event.started_at.map(|at| at.to_rfc3339()),
                    event.finished_at.to_rfc3339(),
                    event.raw_payload,
                ],
            )?;
            Ok(changed)
        })?;

        Ok(if changed > 0 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::Duplicate
        })
    }

    async fn get(
        &self,
        provider: &str,
        external_event_id: &str,
    ) -> RepoResult<Option<DeploymentEvent>> {
        let db = self.db.lock().await;
        let query = format!(
            "SELECT {} FROM deployment_events WHERE provider = ?1 AND external_event_id = ?2",
            Self::SELECT_COLUMNS
        );
        let event = db
            .connection()
            .query_row(&query, params![provider, external_event_id], Self::map_row)
            .optional()?;
        Ok(event)
    }

    async fn list_for_service(
        &self,
        service: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> RepoResult<Vec<DeploymentEvent>> {
        let db = self.db.lock().await;
        let query = format!(
            "SELECT {} FROM deployment_events
             WHERE service = ?1 AND finished_at >= ?2 AND finished_at <= ?3
             ORDER BY finished_at DESC",
            Self::SELECT_COLUMNS
        );
        let mut statement = db.connection().prepare(&query)?;
        let events: Result<Vec<DeploymentEvent>, rusqlite::Error> = statement
            .query_map(
                params![service, since.to_rfc3339(), until.to_rfc3339()],
                Self::map_row,
            )?
            .collect();
        Ok(events?)
    }

    async fn list_recent(&self, limit: usize) -> RepoResult<Vec<DeploymentEvent>> {
        let db = self.db.lock().await;
        let query = format!(
            "SELECT {} FROM deployment_events ORDER BY finished_at DESC LIMIT ?1",
            Self::SELECT_COLUMNS
        );
        let mut statement = db.connection().prepare(&query)?;
        let events: Result<Vec<DeploymentEvent>, rusqlite::Error> = statement
            .query_map(params![limit as i64], Self::map_row)?
            .collect();
        Ok(events?)
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> RepoResult<usize> {
        let db = self.db.lock().await;
        let removed = db.connection().execute(
            "DELETE FROM deployment_events WHERE finished_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn repository() -> SqliteDeploymentEventRepository {
        let db = Database::open_in_memory().unwrap();
        SqliteDeploymentEventRepository::new(Arc::new(Mutex::new(db)))
    }

    fn event(external_id: &str, finished: DateTime<Utc>) -> DeploymentEvent {
        DeploymentEvent::new(
            "github",
            external_id,
            "checkout",
            "production",
            "abc123",
            finished,
            "{}",
        )
        .with_author("alice")
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let repo = repository();
        let finished = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let outcome = repo.insert(&event("evt-1", finished)).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);

        let found = repo.get("github", "evt-1").await.unwrap().unwrap();
        assert_eq!(found.service, "checkout");
        assert_eq!(found.author.as_deref(), Some("alice"));
        assert_eq!(found.finished_at, finished);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_idempotent() {
        let repo = repository();
        let finished = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let first = event("evt-1", finished);
        assert_eq!(
            repo.insert(&first).await.unwrap(),
            InsertOutcome::Inserted
        );

        // A redelivery carries a different row id but the same external id.
        let redelivery = event("evt-1", finished);
        assert_eq!(
            repo.insert(&redelivery).await.unwrap(),
            InsertOutcome::Duplicate
        );

        let recent = repo.list_recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, first.id);
    }

    #[tokio::test]
    async fn test_list_for_service_filters_by_window() {
        let repo = repository();
        let inside = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let outside = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();
        repo.insert(&event("evt-in", inside)).await.unwrap();
        repo.insert(&event("evt-out", outside)).await.unwrap();

        let events = repo
            .list_for_service(
                "checkout",
                Utc.with_ymd_and_hms(2025, 5, 20, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 6, 20, 0, 0, 0).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].external_event_id, "evt-in");
    }

    #[tokio::test]
    async fn test_prune_removes_old_rows() {
        let repo = repository();
        let old = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        repo.insert(&event("evt-old", old)).await.unwrap();
        repo.insert(&event("evt-new", new)).await.unwrap();

        let removed = repo
            .prune_before(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(repo.list_recent(10).await.unwrap().len(), 1);
    }
}
