//! Client-application repository. Scope/Application CRUD is an external
//! collaborator's responsibility in the platform at large; the core only needs
//! to read an application's scopes and, when auto-provisioning, create one.

use crate::domain::{ClientApplication, ScimScope, StringUuid};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::MySqlPool;
use std::collections::BTreeSet;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ClientApplicationRepository: Send + Sync {
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<ClientApplication>>;

    /// Creates a client-application with exactly `scopes` and a freshly generated
    /// secret. Returns the application and the raw secret (never stored raw).
    async fn create_with_scopes(
        &self,
        tenant_id: StringUuid,
        name: &str,
        scopes: BTreeSet<ScimScope>,
    ) -> Result<(ClientApplication, String)>;
}

pub struct ClientApplicationRepositoryImpl {
    pool: MySqlPool,
}

impl ClientApplicationRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ClientApplicationRow {
    id: StringUuid,
    tenant_id: StringUuid,
    name: String,
    scopes: sqlx::types::Json<BTreeSet<ScimScope>>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<ClientApplicationRow> for ClientApplication {
    fn from(row: ClientApplicationRow) -> Self {
        ClientApplication {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            scopes: row.scopes.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn generate_client_secret() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = format!("scimclient_{}", hex::encode(bytes));
    let hash = hex::encode(Sha256::digest(raw.as_bytes()));
    (raw, hash)
}

#[async_trait]
impl ClientApplicationRepository for ClientApplicationRepositoryImpl {
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<ClientApplication>> {
        let row = sqlx::query_as::<_, ClientApplicationRow>(
            "SELECT id, tenant_id, name, scopes, created_at, updated_at FROM client_application WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ClientApplication::from))
    }

    async fn create_with_scopes(
        &self,
        tenant_id: StringUuid,
        name: &str,
        scopes: BTreeSet<ScimScope>,
    ) -> Result<(ClientApplication, String)> {
        let (raw_secret, secret_hash) = generate_client_secret();
        let app = ClientApplication {
            id: StringUuid::new_v4(),
            tenant_id,
            name: name.to_string(),
            scopes,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO client_application (id, tenant_id, name, scopes, secret_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(app.id)
        .bind(app.tenant_id)
        .bind(&app.name)
        .bind(sqlx::types::Json(&app.scopes))
        .bind(&secret_hash)
        .bind(app.created_at)
        .bind(app.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok((app, raw_secret))
    }
}
