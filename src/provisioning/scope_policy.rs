//! Scope policy (§4.9): decides whether a client-application carries the scopes
//! a set of operations requires, and ensures a tenant's SCIM scopes exist.

use crate::domain::{required_scopes, OperationKind, ScimScope, StringUuid};
use crate::error::{AppError, Result};
use crate::repository::{ClientApplicationRepository, ScopeStore};
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct ScopePolicy {
    applications: Arc<dyn ClientApplicationRepository>,
    scopes: Arc<dyn ScopeStore>,
}

impl ScopePolicy {
    pub fn new(applications: Arc<dyn ClientApplicationRepository>, scopes: Arc<dyn ScopeStore>) -> Self {
        Self { applications, scopes }
    }

    /// `RequiredScopes(ops) \ existing` must be empty; `existing` is the tenant's
    /// registered scopes intersected with what `client_app_id` actually carries.
    pub async fn validate_application(
        &self,
        client_app_id: StringUuid,
        operations: &BTreeSet<OperationKind>,
    ) -> Result<()> {
        let app = self
            .applications
            .find_by_id(client_app_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("client application {client_app_id} not found")))?;

        let required = required_scopes(operations.iter().copied());
        let missing: Vec<String> = required
            .difference(&app.scopes)
            .map(ScimScope::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingScopes(missing))
        }
    }

    /// Idempotently ensures every SCIM scope exists for `tenant_id`.
    pub async fn ensure_tenant_scopes_exist(&self, tenant_id: StringUuid) -> Result<()> {
        self.scopes.ensure_tenant_scopes(tenant_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClientApplication;
    use crate::repository::{MockClientApplicationRepository, MockScopeStore};
    use chrono::Utc;

    fn app_with_scopes(scopes: &[ScimScope]) -> ClientApplication {
        ClientApplication {
            id: StringUuid::new_v4(),
            tenant_id: StringUuid::new_v4(),
            name: "Workday Integration".into(),
            scopes: scopes.iter().copied().collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn validate_application_passes_when_scopes_are_sufficient() {
        let app = app_with_scopes(&[ScimScope::UsersWrite]);
        let app_id = app.id;
        let mut applications = MockClientApplicationRepository::new();
        applications.expect_find_by_id().returning(move |_| Ok(Some(app.clone())));
        let scopes = MockScopeStore::new();

        let policy = ScopePolicy::new(Arc::new(applications), Arc::new(scopes));
        let ops = BTreeSet::from([OperationKind::CreateUser]);

        assert!(policy.validate_application(app_id, &ops).await.is_ok());
    }

    #[tokio::test]
    async fn validate_application_fails_with_missing_scopes_listed() {
        let app = app_with_scopes(&[ScimScope::UsersRead]);
        let app_id = app.id;
        let mut applications = MockClientApplicationRepository::new();
        applications.expect_find_by_id().returning(move |_| Ok(Some(app.clone())));
        let scopes = MockScopeStore::new();

        let policy = ScopePolicy::new(Arc::new(applications), Arc::new(scopes));
        let ops = BTreeSet::from([OperationKind::CreateUser, OperationKind::CreateGroup]);

        let err = policy.validate_application(app_id, &ops).await.unwrap_err();
        match err {
            AppError::MissingScopes(missing) => {
                assert!(missing.contains(&"scim:users:write".to_string()));
                assert!(missing.contains(&"scim:groups:write".to_string()));
            }
            other => panic!("expected MissingScopes, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn validate_application_errors_not_found_for_unknown_app() {
        let mut applications = MockClientApplicationRepository::new();
        applications.expect_find_by_id().returning(|_| Ok(None));
        let scopes = MockScopeStore::new();

        let policy = ScopePolicy::new(Arc::new(applications), Arc::new(scopes));
        let ops = BTreeSet::from([OperationKind::CreateUser]);

        let err = policy.validate_application(StringUuid::new_v4(), &ops).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
