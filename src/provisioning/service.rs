//! Destination Service Facade (§4.10): the orchestration surface the admin API
//! calls. Validates input, ensures a tenant's SCIM scopes exist, and either
//! validates a caller-supplied client-application's scopes or auto-provisions
//! one scoped to exactly what the destination's enabled operations require.

use crate::domain::{
    required_scopes, CreateDestinationInput, Destination, DestinationWithSecret, UpdateDestinationInput,
};
use crate::error::{AppError, Result};
use crate::provisioning::scope_policy::ScopePolicy;
use crate::repository::{ClientApplicationRepository, DestinationRepository, ResourceMappingRepository};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

pub struct DestinationService {
    destinations: Arc<dyn DestinationRepository>,
    mappings: Arc<dyn ResourceMappingRepository>,
    applications: Arc<dyn ClientApplicationRepository>,
    scope_policy: Arc<ScopePolicy>,
}

impl DestinationService {
    pub fn new(
        destinations: Arc<dyn DestinationRepository>,
        mappings: Arc<dyn ResourceMappingRepository>,
        applications: Arc<dyn ClientApplicationRepository>,
        scope_policy: Arc<ScopePolicy>,
    ) -> Self {
        Self {
            destinations,
            mappings,
            applications,
            scope_policy,
        }
    }

    pub async fn create(&self, input: CreateDestinationInput) -> Result<DestinationWithSecret> {
        input.validate().map_err(AppError::from)?;

        self.scope_policy.ensure_tenant_scopes_exist(input.tenant_id).await?;

        let required = required_scopes(input.enabled_operations.iter().copied());

        let (client_app_id, client_secret) = match input.client_app_id {
            Some(app_id) => {
                self.scope_policy
                    .validate_application(app_id, &input.enabled_operations)
                    .await?;
                (app_id, None)
            }
            None => {
                let (app, secret) = self
                    .applications
                    .create_with_scopes(input.tenant_id, &format!("{} SCIM Client", input.name), required)
                    .await?;
                (app.id, Some(secret))
            }
        };

        let now = Utc::now();
        let destination = Destination {
            id: crate::domain::StringUuid::new_v4(),
            tenant_id: input.tenant_id,
            client_app_id,
            name: input.name,
            base_url: input.base_url,
            attribute_mapping: input.attribute_mapping,
            enabled_operations: input.enabled_operations,
            delete_action: input.delete_action,
            retry_policy: input.retry_policy.unwrap_or_default(),
            enabled: true,
            created_at: now,
            updated_at: now,
        };

        let created = self.destinations.create(&destination).await?;
        Ok(DestinationWithSecret {
            destination: created,
            client_secret,
        })
    }

    /// Re-validates the client-application's scopes whenever `enabled_operations`
    /// changes, so a destination can never be widened to an operation its
    /// application isn't authorized for.
    pub async fn update(&self, id: crate::domain::StringUuid, input: UpdateDestinationInput) -> Result<Destination> {
        input.validate().map_err(AppError::from)?;

        let mut destination = self
            .destinations
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("destination {id} not found")))?;

        if let Some(name) = input.name {
            destination.name = name;
        }
        if let Some(base_url) = input.base_url {
            destination.base_url = base_url;
        }
        if let Some(attribute_mapping) = input.attribute_mapping {
            destination.attribute_mapping = attribute_mapping;
        }
        if let Some(enabled_operations) = input.enabled_operations {
            if enabled_operations != destination.enabled_operations {
                self.scope_policy
                    .validate_application(destination.client_app_id, &enabled_operations)
                    .await?;
            }
            destination.enabled_operations = enabled_operations;
        }
        if let Some(delete_action) = input.delete_action {
            destination.delete_action = delete_action;
        }
        if let Some(retry_policy) = input.retry_policy {
            destination.retry_policy = retry_policy;
        }
        if let Some(enabled) = input.enabled {
            destination.enabled = enabled;
        }
        destination.updated_at = Utc::now();

        self.destinations.update(&destination).await
    }

    /// Deletes a destination and its resource mappings. Historical `Delivery`
    /// rows are intentionally left in place as an audit trail.
    pub async fn delete(&self, id: crate::domain::StringUuid) -> Result<()> {
        self.mappings.delete_all_for_destination(id).await?;
        self.destinations.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClientApplication, DeleteAction, OperationKind, RetryPolicy, ScimScope, StringUuid};
    use crate::repository::{
        MockClientApplicationRepository, MockDestinationRepository, MockResourceMappingRepository, MockScopeStore,
    };
    use std::collections::{BTreeMap, BTreeSet};

    fn facade(
        destinations: MockDestinationRepository,
        mappings: MockResourceMappingRepository,
        applications: MockClientApplicationRepository,
        scopes: MockScopeStore,
    ) -> DestinationService {
        let scope_policy = Arc::new(ScopePolicy::new(Arc::new(applications), Arc::new(scopes)));
        DestinationService::new(
            Arc::new(destinations),
            Arc::new(mappings),
            // scope_policy already owns an applications handle; service needs its own too.
            Arc::new(MockClientApplicationRepository::new()),
            scope_policy,
        )
    }

    fn create_input(client_app_id: Option<StringUuid>) -> CreateDestinationInput {
        CreateDestinationInput {
            tenant_id: StringUuid::new_v4(),
            name: "Workday".into(),
            base_url: "https://scim.workday.example.com/v2".into(),
            attribute_mapping: BTreeMap::new(),
            enabled_operations: BTreeSet::from([OperationKind::CreateUser]),
            delete_action: DeleteAction::Deactivate,
            retry_policy: None,
            client_app_id,
        }
    }

    #[tokio::test]
    async fn create_with_caller_supplied_app_validates_scopes_and_omits_secret() {
        let app = ClientApplication {
            id: StringUuid::new_v4(),
            tenant_id: StringUuid::new_v4(),
            name: "existing".into(),
            scopes: BTreeSet::from([ScimScope::UsersWrite]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let app_id = app.id;

        let mut scope_policy_apps = MockClientApplicationRepository::new();
        scope_policy_apps
            .expect_find_by_id()
            .returning(move |_| Ok(Some(app.clone())));

        let mut scopes = MockScopeStore::new();
        scopes.expect_ensure_tenant_scopes().returning(|_| Ok(BTreeSet::new()));

        let mut destinations = MockDestinationRepository::new();
        destinations.expect_create().returning(|d| Ok(d.clone()));

        let mappings = MockResourceMappingRepository::new();

        let service = facade(destinations, mappings, scope_policy_apps, scopes);
        let result = service.create(create_input(Some(app_id))).await.unwrap();

        assert!(result.client_secret.is_none());
        assert_eq!(result.destination.client_app_id, app_id);
    }

    #[tokio::test]
    async fn create_without_app_auto_provisions_with_required_scopes_and_returns_secret() {
        let mut scope_policy_apps = MockClientApplicationRepository::new();
        scope_policy_apps.expect_find_by_id().times(0);

        let mut scopes = MockScopeStore::new();
        scopes.expect_ensure_tenant_scopes().returning(|_| Ok(BTreeSet::new()));

        let mut destinations = MockDestinationRepository::new();
        destinations.expect_create().returning(|d| Ok(d.clone()));

        let mappings = MockResourceMappingRepository::new();

        // Build a service whose own `applications` handle provisions the app;
        // its `scope_policy` shares a separate mock that is never asked to
        // look one up (new apps skip `validate_application`).
        let scope_policy = Arc::new(ScopePolicy::new(Arc::new(scope_policy_apps), Arc::new(scopes)));

        let mut service_apps = MockClientApplicationRepository::new();
        service_apps
            .expect_create_with_scopes()
            .withf(|_, _, scopes| scopes.contains(&ScimScope::UsersWrite))
            .returning(|tenant_id, name, scopes| {
                Ok((
                    ClientApplication {
                        id: StringUuid::new_v4(),
                        tenant_id,
                        name: name.to_string(),
                        scopes,
                        created_at: Utc::now(),
                        updated_at: Utc::now(),
                    },
                    "raw-secret-value".to_string(),
                ))
            });

        let service = DestinationService::new(
            Arc::new(destinations),
            Arc::new(mappings),
            Arc::new(service_apps),
            scope_policy,
        );

        let result = service.create(create_input(None)).await.unwrap();
        assert_eq!(result.client_secret.as_deref(), Some("raw-secret-value"));
    }

    #[tokio::test]
    async fn delete_removes_mappings_before_the_destination_row() {
        let mut destinations = MockDestinationRepository::new();
        destinations.expect_delete().times(1).returning(|_| Ok(()));

        let mut mappings = MockResourceMappingRepository::new();
        mappings.expect_delete_all_for_destination().times(1).returning(|_| Ok(3));

        let applications = MockClientApplicationRepository::new();
        let scopes = MockScopeStore::new();

        let service = facade(destinations, mappings, applications, scopes);
        service.delete(StringUuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn update_that_widens_enabled_operations_revalidates_scopes() {
        let app = ClientApplication {
            id: StringUuid::new_v4(),
            tenant_id: StringUuid::new_v4(),
            name: "existing".into(),
            scopes: BTreeSet::from([ScimScope::UsersWrite]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let existing = Destination {
            id: StringUuid::new_v4(),
            tenant_id: app.tenant_id,
            client_app_id: app.id,
            name: "Workday".into(),
            base_url: "https://scim.example.com/v2".into(),
            attribute_mapping: BTreeMap::new(),
            enabled_operations: BTreeSet::from([OperationKind::CreateUser]),
            delete_action: DeleteAction::Deactivate,
            retry_policy: RetryPolicy::default(),
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let dest_id = existing.id;

        let mut destinations = MockDestinationRepository::new();
        destinations.expect_find_by_id().returning(move |_| Ok(Some(existing.clone())));
        destinations.expect_update().returning(|d| Ok(d.clone()));

        let mappings = MockResourceMappingRepository::new();

        let mut apps = MockClientApplicationRepository::new();
        apps.expect_find_by_id().returning(move |_| Ok(Some(app.clone())));
        let mut scopes = MockScopeStore::new();
        scopes.expect_ensure_tenant_scopes().returning(|_| Ok(BTreeSet::new()));

        let service = facade(destinations, mappings, apps, scopes);

        let widen = UpdateDestinationInput {
            enabled_operations: Some(BTreeSet::from([OperationKind::CreateGroup])),
            ..Default::default()
        };

        let err = service.update(dest_id, widen).await.unwrap_err();
        assert!(matches!(err, AppError::MissingScopes(_)));
    }
}
