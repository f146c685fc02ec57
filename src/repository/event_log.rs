//! Event log: durable replay store for `LocalEvent` snapshots.
//!
//! `LocalEvent` itself is a contract produced by external collaborators, but a
//! `Delivery` may sit in `RETRYING` for hours and the worker must be able to
//! reload the event that produced it on every attempt, not just the first.
//! Intake persists the event once, keyed by `event_id`, before fanning out.

use crate::domain::LocalEvent;
use crate::error::Result;
use async_trait::async_trait;
use sqlx::MySqlPool;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait EventLogRepository: Send + Sync {
    /// Idempotent by `event_id`: a duplicate publish for the same event is a no-op.
    async fn record(&self, event: &LocalEvent) -> Result<()>;
    async fn find_by_id(&self, event_id: crate::domain::StringUuid) -> Result<Option<LocalEvent>>;
}

pub struct EventLogRepositoryImpl {
    pool: MySqlPool,
}

impl EventLogRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct LocalEventRow {
    event_id: crate::domain::StringUuid,
    tenant_id: crate::domain::StringUuid,
    resource_type: crate::domain::EventResourceType,
    resource_id: String,
    kind: crate::domain::EventKind,
    occurred_at: chrono::DateTime<chrono::Utc>,
    snapshot: sqlx::types::Json<serde_json::Value>,
}

impl From<LocalEventRow> for LocalEvent {
    fn from(row: LocalEventRow) -> Self {
        LocalEvent {
            event_id: row.event_id,
            tenant_id: row.tenant_id,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            kind: row.kind,
            occurred_at: row.occurred_at,
            snapshot: row.snapshot.0,
        }
    }
}

#[async_trait]
impl EventLogRepository for EventLogRepositoryImpl {
    async fn record(&self, event: &LocalEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT IGNORE INTO local_event
                (event_id, tenant_id, resource_type, resource_id, kind, occurred_at, snapshot)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.event_id)
        .bind(event.tenant_id)
        .bind(event.resource_type)
        .bind(&event.resource_id)
        .bind(event.kind)
        .bind(event.occurred_at)
        .bind(sqlx::types::Json(&event.snapshot))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, event_id: crate::domain::StringUuid) -> Result<Option<LocalEvent>> {
        let row = sqlx::query_as::<_, LocalEventRow>("SELECT * FROM local_event WHERE event_id = ?")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(LocalEvent::from))
    }
}
