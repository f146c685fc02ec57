//! Delivery repository: the durable state store behind `ClaimDue` and friends (§4.2).
//!
//! `claim_due` is the concurrency linchpin: it uses `SELECT ... FOR UPDATE SKIP LOCKED`
//! inside one transaction so at most one poller instance ever claims a given row, then
//! flips claimed rows to `IN_PROGRESS` before the transaction commits.

use crate::domain::{Delivery, DeliveryStatus, StringUuid};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait DeliveryRepository: Send + Sync {
    /// Idempotent by (event_id, destination_id): a duplicate call for the same
    /// pair returns the existing row rather than inserting a second one.
    async fn insert_pending(&self, event_id: StringUuid, destination_id: StringUuid) -> Result<Delivery>;

    /// Returns PENDING rows, or RETRYING rows whose `next_retry_at <= now`, ordered
    /// by `created_at` ascending, atomically flipped to IN_PROGRESS.
    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Delivery>>;

    async fn mark_success(
        &self,
        id: StringUuid,
        http_status: Option<i32>,
        scim_resource_id: Option<String>,
    ) -> Result<()>;

    async fn mark_retry(
        &self,
        id: StringUuid,
        http_status: Option<i32>,
        error: String,
        next_retry_at: DateTime<Utc>,
        new_retry_count: u32,
    ) -> Result<()>;

    async fn mark_failed(&self, id: StringUuid, http_status: Option<i32>, error: String) -> Result<()>;

    /// Flips `IN_PROGRESS` rows older than `threshold` back to a reclaimable state
    /// (PENDING, so the next `claim_due` picks them up). Returns the number reclaimed.
    async fn mark_reclaimable(&self, threshold: DateTime<Utc>) -> Result<u64>;

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Delivery>>;
    async fn list_by_destination(&self, destination_id: StringUuid, page: u32, page_size: u32) -> Result<Vec<Delivery>>;
    async fn list_by_event(&self, event_id: StringUuid) -> Result<Vec<Delivery>>;
}

pub struct DeliveryRepositoryImpl {
    pool: MySqlPool,
}

impl DeliveryRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    id: StringUuid,
    event_id: StringUuid,
    destination_id: StringUuid,
    status: DeliveryStatus,
    retry_count: i64,
    last_http_status: Option<i32>,
    last_error: Option<String>,
    scim_resource_id: Option<String>,
    next_retry_at: Option<DateTime<Utc>>,
    claimed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<DeliveryRow> for Delivery {
    fn from(row: DeliveryRow) -> Self {
        Delivery {
            id: row.id,
            event_id: row.event_id,
            destination_id: row.destination_id,
            status: row.status,
            retry_count: row.retry_count.max(0) as u32,
            last_http_status: row.last_http_status,
            last_error: row.last_error,
            scim_resource_id: row.scim_resource_id,
            next_retry_at: row.next_retry_at,
            claimed_at: row.claimed_at,
            created_at: row.created_at,
            completed_at: row.completed_at,
        }
    }
}

#[async_trait]
impl DeliveryRepository for DeliveryRepositoryImpl {
    async fn insert_pending(&self, event_id: StringUuid, destination_id: StringUuid) -> Result<Delivery> {
        let id = StringUuid::new_v4();
        sqlx::query(
            r#"
            INSERT IGNORE INTO delivery (id, event_id, destination_id, status, retry_count, created_at)
            VALUES (?, ?, ?, 'PENDING', 0, ?)
            "#,
        )
        .bind(id)
        .bind(event_id)
        .bind(destination_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, DeliveryRow>(
            "SELECT * FROM delivery WHERE event_id = ? AND destination_id = ?",
        )
        .bind(event_id)
        .bind(destination_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Delivery>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, DeliveryRow>(
            r#"
            SELECT * FROM delivery
            WHERE status = 'PENDING' OR (status = 'RETRYING' AND next_retry_at <= ?)
            ORDER BY created_at ASC
            LIMIT ?
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        let deliveries: Vec<Delivery> = rows.into_iter().map(Delivery::from).collect();

        let claimed_at = Utc::now();
        for d in &deliveries {
            sqlx::query("UPDATE delivery SET status = 'IN_PROGRESS', claimed_at = ? WHERE id = ?")
                .bind(claimed_at)
                .bind(d.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(deliveries
            .into_iter()
            .map(|mut d| {
                d.status = DeliveryStatus::InProgress;
                d.claimed_at = Some(claimed_at);
                d
            })
            .collect())
    }

    async fn mark_success(
        &self,
        id: StringUuid,
        http_status: Option<i32>,
        scim_resource_id: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE delivery
            SET status = 'SUCCESS', last_http_status = ?, scim_resource_id = COALESCE(?, scim_resource_id),
                next_retry_at = NULL, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(http_status)
        .bind(scim_resource_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_retry(
        &self,
        id: StringUuid,
        http_status: Option<i32>,
        error: String,
        next_retry_at: DateTime<Utc>,
        new_retry_count: u32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE delivery
            SET status = 'RETRYING', last_http_status = ?, last_error = ?,
                next_retry_at = ?, retry_count = ?
            WHERE id = ?
            "#,
        )
        .bind(http_status)
        .bind(error)
        .bind(next_retry_at)
        .bind(new_retry_count)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: StringUuid, http_status: Option<i32>, error: String) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE delivery
            SET status = 'FAILED', last_http_status = ?, last_error = ?,
                next_retry_at = NULL, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(http_status)
        .bind(error)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_reclaimable(&self, threshold: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE delivery SET status = 'PENDING', claimed_at = NULL WHERE status = 'IN_PROGRESS' AND claimed_at < ?",
        )
        .bind(threshold)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Delivery>> {
        let row = sqlx::query_as::<_, DeliveryRow>("SELECT * FROM delivery WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Delivery::from))
    }

    async fn list_by_destination(&self, destination_id: StringUuid, page: u32, page_size: u32) -> Result<Vec<Delivery>> {
        let offset = page.saturating_mul(page_size);
        let rows = sqlx::query_as::<_, DeliveryRow>(
            "SELECT * FROM delivery WHERE destination_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(destination_id)
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Delivery::from).collect())
    }

    async fn list_by_event(&self, event_id: StringUuid) -> Result<Vec<Delivery>> {
        let rows = sqlx::query_as::<_, DeliveryRow>(
            "SELECT * FROM delivery WHERE event_id = ? ORDER BY created_at ASC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Delivery::from).collect())
    }
}
