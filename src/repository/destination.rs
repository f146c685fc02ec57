//! Destination repository: typed CRUD over the `destination` table.

use crate::domain::{
    DeleteAction, Destination, OperationKind, RetryPolicy, StringUuid,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use std::collections::{BTreeMap, BTreeSet};

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait DestinationRepository: Send + Sync {
    async fn create(&self, destination: &Destination) -> Result<Destination>;
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Destination>>;
    async fn find_by_name(&self, tenant_id: StringUuid, name: &str) -> Result<Option<Destination>>;
    async fn list_enabled_for_tenant(&self, tenant_id: StringUuid) -> Result<Vec<Destination>>;
    async fn update(&self, destination: &Destination) -> Result<Destination>;
    async fn delete(&self, id: StringUuid) -> Result<()>;
}

pub struct DestinationRepositoryImpl {
    pool: MySqlPool,
}

impl DestinationRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DestinationRow {
    id: StringUuid,
    tenant_id: StringUuid,
    client_app_id: StringUuid,
    name: String,
    base_url: String,
    attribute_mapping: sqlx::types::Json<BTreeMap<String, String>>,
    enabled_operations: sqlx::types::Json<BTreeSet<OperationKind>>,
    delete_action: DeleteAction,
    retry_policy: sqlx::types::Json<RetryPolicy>,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DestinationRow> for Destination {
    fn from(row: DestinationRow) -> Self {
        Destination {
            id: row.id,
            tenant_id: row.tenant_id,
            client_app_id: row.client_app_id,
            name: row.name,
            base_url: row.base_url,
            attribute_mapping: row.attribute_mapping.0,
            enabled_operations: row.enabled_operations.0,
            delete_action: row.delete_action,
            retry_policy: row.retry_policy.0,
            enabled: row.enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl DestinationRepository for DestinationRepositoryImpl {
    async fn create(&self, destination: &Destination) -> Result<Destination> {
        sqlx::query(
            r#"
            INSERT INTO destination
                (id, tenant_id, client_app_id, name, base_url, attribute_mapping,
                 enabled_operations, delete_action, retry_policy, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(destination.id)
        .bind(destination.tenant_id)
        .bind(destination.client_app_id)
        .bind(&destination.name)
        .bind(&destination.base_url)
        .bind(sqlx::types::Json(&destination.attribute_mapping))
        .bind(sqlx::types::Json(&destination.enabled_operations))
        .bind(destination.delete_action)
        .bind(sqlx::types::Json(&destination.retry_policy))
        .bind(destination.enabled)
        .bind(destination.created_at)
        .bind(destination.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(destination.clone())
    }

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Destination>> {
        let row = sqlx::query_as::<_, DestinationRow>("SELECT * FROM destination WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Destination::from))
    }

    async fn find_by_name(&self, tenant_id: StringUuid, name: &str) -> Result<Option<Destination>> {
        let row = sqlx::query_as::<_, DestinationRow>(
            "SELECT * FROM destination WHERE tenant_id = ? AND name = ?",
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Destination::from))
    }

    async fn list_enabled_for_tenant(&self, tenant_id: StringUuid) -> Result<Vec<Destination>> {
        let rows = sqlx::query_as::<_, DestinationRow>(
            "SELECT * FROM destination WHERE tenant_id = ? AND enabled = TRUE",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Destination::from).collect())
    }

    async fn update(&self, destination: &Destination) -> Result<Destination> {
        let result = sqlx::query(
            r#"
            UPDATE destination
            SET name = ?, base_url = ?, attribute_mapping = ?, enabled_operations = ?,
                delete_action = ?, retry_policy = ?, enabled = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&destination.name)
        .bind(&destination.base_url)
        .bind(sqlx::types::Json(&destination.attribute_mapping))
        .bind(sqlx::types::Json(&destination.enabled_operations))
        .bind(destination.delete_action)
        .bind(sqlx::types::Json(&destination.retry_policy))
        .bind(destination.enabled)
        .bind(destination.updated_at)
        .bind(destination.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("destination {} not found", destination.id)));
        }
        Ok(destination.clone())
    }

    async fn delete(&self, id: StringUuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM destination WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("destination {id} not found")));
        }
        Ok(())
    }
}
