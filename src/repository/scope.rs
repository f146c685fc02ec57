//! Scope store: the external collaborator that owns the authorization server's
//! named-scope registry. The provisioning core only needs to ensure the four
//! SCIM scopes exist for a tenant and otherwise treats this as opaque.

use crate::domain::{ScimScope, StringUuid};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Mutex;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ScopeStore: Send + Sync {
    /// Returns the scopes that already existed for `tenant_id` before this call.
    async fn existing_tenant_scopes(&self, tenant_id: StringUuid) -> Result<BTreeSet<ScimScope>>;

    /// Creates any of the four SCIM scopes missing for `tenant_id`. Idempotent:
    /// the first call creates up to four, every subsequent call creates zero.
    async fn ensure_tenant_scopes(&self, tenant_id: StringUuid) -> Result<BTreeSet<ScimScope>>;
}

/// In-memory scope store. A real deployment backs this with the authorization
/// server's own scope registry; this implementation gives the core something to
/// run against without depending on that external system's schema.
#[derive(Default)]
pub struct InMemoryScopeStore {
    by_tenant: Mutex<std::collections::BTreeMap<StringUuid, BTreeSet<ScimScope>>>,
}

impl InMemoryScopeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScopeStore for InMemoryScopeStore {
    async fn existing_tenant_scopes(&self, tenant_id: StringUuid) -> Result<BTreeSet<ScimScope>> {
        let guard = self.by_tenant.lock().unwrap();
        Ok(guard.get(&tenant_id).cloned().unwrap_or_default())
    }

    async fn ensure_tenant_scopes(&self, tenant_id: StringUuid) -> Result<BTreeSet<ScimScope>> {
        let mut guard = self.by_tenant.lock().unwrap();
        let entry = guard.entry(tenant_id).or_default();
        let missing: BTreeSet<ScimScope> = ScimScope::ALL
            .iter()
            .copied()
            .filter(|s| !entry.contains(s))
            .collect();
        entry.extend(missing.iter().copied());
        Ok(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_call_creates_all_four_second_call_creates_none() {
        let store = InMemoryScopeStore::new();
        let tenant = StringUuid::new_v4();

        let created_first = store.ensure_tenant_scopes(tenant).await.unwrap();
        assert_eq!(created_first.len(), 4);

        let created_second = store.ensure_tenant_scopes(tenant).await.unwrap();
        assert!(created_second.is_empty());

        let existing = store.existing_tenant_scopes(tenant).await.unwrap();
        assert_eq!(existing.len(), 4);
    }

    #[tokio::test]
    async fn scopes_are_isolated_per_tenant() {
        let store = InMemoryScopeStore::new();
        let a = StringUuid::new_v4();
        let b = StringUuid::new_v4();

        store.ensure_tenant_scopes(a).await.unwrap();
        let existing_b = store.existing_tenant_scopes(b).await.unwrap();
        assert!(existing_b.is_empty());
    }
}
