//! ResourceMapping: binding from a local resource to the opaque id a downstream
//! SCIM server assigned it.

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum LocalResourceType {
    User,
    Group,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMapping {
    pub id: StringUuid,
    pub destination_id: StringUuid,
    pub local_resource_type: LocalResourceType,
    pub local_resource_id: String,
    pub scim_resource_id: String,
    pub created_at: DateTime<Utc>,
}
