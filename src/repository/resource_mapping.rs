//! ResourceMapping repository: local-id <-> downstream-id bindings.

use crate::domain::{LocalResourceType, ResourceMapping, StringUuid};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ResourceMappingRepository: Send + Sync {
    async fn find(
        &self,
        destination_id: StringUuid,
        local_resource_type: LocalResourceType,
        local_resource_id: &str,
    ) -> Result<Option<ResourceMapping>>;

    /// Created on first successful CREATE; updates the scim id in place if the
    /// downstream server re-issues a different one for the same local resource.
    async fn upsert(
        &self,
        destination_id: StringUuid,
        local_resource_type: LocalResourceType,
        local_resource_id: &str,
        scim_resource_id: &str,
    ) -> Result<ResourceMapping>;

    async fn delete(
        &self,
        destination_id: StringUuid,
        local_resource_type: LocalResourceType,
        local_resource_id: &str,
    ) -> Result<()>;

    /// Removes every mapping owned by a destination, e.g. on destination deletion.
    async fn delete_all_for_destination(&self, destination_id: StringUuid) -> Result<u64>;
}

pub struct ResourceMappingRepositoryImpl {
    pool: MySqlPool,
}

impl ResourceMappingRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ResourceMappingRow {
    id: StringUuid,
    destination_id: StringUuid,
    local_resource_type: LocalResourceType,
    local_resource_id: String,
    scim_resource_id: String,
    created_at: DateTime<Utc>,
}

impl From<ResourceMappingRow> for ResourceMapping {
    fn from(row: ResourceMappingRow) -> Self {
        ResourceMapping {
            id: row.id,
            destination_id: row.destination_id,
            local_resource_type: row.local_resource_type,
            local_resource_id: row.local_resource_id,
            scim_resource_id: row.scim_resource_id,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ResourceMappingRepository for ResourceMappingRepositoryImpl {
    async fn find(
        &self,
        destination_id: StringUuid,
        local_resource_type: LocalResourceType,
        local_resource_id: &str,
    ) -> Result<Option<ResourceMapping>> {
        let row = sqlx::query_as::<_, ResourceMappingRow>(
            r#"
            SELECT * FROM resource_mapping
            WHERE destination_id = ? AND local_resource_type = ? AND local_resource_id = ?
            "#,
        )
        .bind(destination_id)
        .bind(local_resource_type)
        .bind(local_resource_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ResourceMapping::from))
    }

    async fn upsert(
        &self,
        destination_id: StringUuid,
        local_resource_type: LocalResourceType,
        local_resource_id: &str,
        scim_resource_id: &str,
    ) -> Result<ResourceMapping> {
        sqlx::query(
            r#"
            INSERT INTO resource_mapping
                (id, destination_id, local_resource_type, local_resource_id, scim_resource_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE scim_resource_id = VALUES(scim_resource_id)
            "#,
        )
        .bind(StringUuid::new_v4())
        .bind(destination_id)
        .bind(local_resource_type)
        .bind(local_resource_id)
        .bind(scim_resource_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, ResourceMappingRow>(
            r#"
            SELECT * FROM resource_mapping
            WHERE destination_id = ? AND local_resource_type = ? AND local_resource_id = ?
            "#,
        )
        .bind(destination_id)
        .bind(local_resource_type)
        .bind(local_resource_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn delete(
        &self,
        destination_id: StringUuid,
        local_resource_type: LocalResourceType,
        local_resource_id: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM resource_mapping
            WHERE destination_id = ? AND local_resource_type = ? AND local_resource_id = ?
            "#,
        )
        .bind(destination_id)
        .bind(local_resource_type)
        .bind(local_resource_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_all_for_destination(&self, destination_id: StringUuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM resource_mapping WHERE destination_id = ?")
            .bind(destination_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
