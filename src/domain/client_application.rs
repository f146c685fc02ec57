//! Client-application: the OAuth client a Destination authenticates as. CRUD for
//! this entity lives outside the provisioning core; the core only needs to read
//! its scope set and mint tokens `sub`/`client_id`'d to it.

use super::common::StringUuid;
use super::operation::ScimScope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientApplication {
    pub id: StringUuid,
    pub tenant_id: StringUuid,
    pub name: String,
    pub scopes: BTreeSet<ScimScope>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
