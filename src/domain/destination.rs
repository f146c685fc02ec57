//! Destination: a configured downstream SCIM service provider bound to one tenant.

use super::common::StringUuid;
use super::operation::OperationKind;
use super::retry_policy::RetryPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use validator::Validate;

/// What happens to the downstream resource when the local USER is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DeleteAction {
    Deactivate,
    HardDelete,
}

impl Default for DeleteAction {
    fn default() -> Self {
        Self::Deactivate
    }
}

/// A downstream SCIM service provider configured for a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub id: StringUuid,
    pub tenant_id: StringUuid,
    pub client_app_id: StringUuid,
    pub name: String,
    pub base_url: String,
    /// SCIM target path -> source expression. Empty means "use default mapping".
    pub attribute_mapping: BTreeMap<String, String>,
    pub enabled_operations: BTreeSet<OperationKind>,
    pub delete_action: DeleteAction,
    pub retry_policy: RetryPolicy,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Destination {
    /// `base_url` with exactly one trailing slash trimmed, regardless of how it was stored.
    pub fn base_url_trimmed(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Input accepted by the admin facade's create operation.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDestinationInput {
    pub tenant_id: StringUuid,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1), custom(function = "super::common::validate_destination_base_url"))]
    pub base_url: String,
    #[serde(default)]
    pub attribute_mapping: BTreeMap<String, String>,
    pub enabled_operations: BTreeSet<OperationKind>,
    #[serde(default)]
    pub delete_action: DeleteAction,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    /// Caller-supplied client-application id. If absent, one is auto-provisioned.
    pub client_app_id: Option<StringUuid>,
}

#[derive(Debug, Clone, Deserialize, Validate, Default)]
pub struct UpdateDestinationInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(custom(function = "super::common::validate_destination_base_url"))]
    pub base_url: Option<String>,
    pub attribute_mapping: Option<BTreeMap<String, String>>,
    pub enabled_operations: Option<BTreeSet<OperationKind>>,
    pub delete_action: Option<DeleteAction>,
    pub retry_policy: Option<RetryPolicy>,
    pub enabled: Option<bool>,
}

/// Response shape for a create that auto-provisioned a client-application: the raw
/// secret is returned exactly once and is never a persisted/re-readable field.
#[derive(Debug, Clone, Serialize)]
pub struct DestinationWithSecret {
    #[serde(flatten)]
    pub destination: Destination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Destination {
        Destination {
            id: StringUuid::new_v4(),
            tenant_id: StringUuid::new_v4(),
            client_app_id: StringUuid::new_v4(),
            name: "Workday".into(),
            base_url: "https://scim.workday.example.com/v2/".into(),
            attribute_mapping: BTreeMap::new(),
            enabled_operations: BTreeSet::new(),
            delete_action: DeleteAction::Deactivate,
            retry_policy: RetryPolicy::default(),
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn base_url_trimmed_removes_trailing_slash() {
        let d = sample();
        assert_eq!(d.base_url_trimmed(), "https://scim.workday.example.com/v2");
    }

    #[test]
    fn delete_action_defaults_to_deactivate() {
        assert_eq!(DeleteAction::default(), DeleteAction::Deactivate);
    }
}
