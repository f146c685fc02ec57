//! LocalEvent: the contract produced by external collaborators (user/group/membership
//! services) once their primary write has committed.

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A local event is only SCIM-relevant if its resource type is one of these three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPER_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventResourceType {
    User,
    Group,
    GroupMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

/// Structural dump of the entity at event time. Shape depends on `resource_type`:
/// USER -> `{user:{...}, profile:{...}}`; GROUP -> `{group:{...}}`;
/// GROUP_MEMBER -> `{groupMember:{groupId,userId}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalEvent {
    pub event_id: StringUuid,
    pub tenant_id: StringUuid,
    pub resource_type: EventResourceType,
    pub resource_id: String,
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    pub snapshot: Value,
}

impl LocalEvent {
    pub fn is_scim_relevant(&self) -> bool {
        matches!(
            self.resource_type,
            EventResourceType::User | EventResourceType::Group | EventResourceType::GroupMember
        )
    }

    /// For GROUP_MEMBER events, pulls `groupMember.groupId` / `groupMember.userId`
    /// out of the snapshot.
    pub fn group_member_ids(&self) -> Option<(String, String)> {
        let gm = self.snapshot.get("groupMember")?;
        let group_id = gm.get("groupId")?.as_str()?.to_string();
        let user_id = gm.get("userId")?.as_str()?.to_string();
        Some((group_id, user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn group_member_ids_extracted_from_snapshot() {
        let e = LocalEvent {
            event_id: StringUuid::new_v4(),
            tenant_id: StringUuid::new_v4(),
            resource_type: EventResourceType::GroupMember,
            resource_id: "gm-1".into(),
            kind: EventKind::Create,
            occurred_at: Utc::now(),
            snapshot: json!({"groupMember": {"groupId": "g1", "userId": "u1"}}),
        };
        assert_eq!(e.group_member_ids(), Some(("g1".to_string(), "u1".to_string())));
    }

    #[test]
    fn all_three_resource_types_are_scim_relevant() {
        for rt in [
            EventResourceType::User,
            EventResourceType::Group,
            EventResourceType::GroupMember,
        ] {
            let e = LocalEvent {
                event_id: StringUuid::new_v4(),
                tenant_id: StringUuid::new_v4(),
                resource_type: rt,
                resource_id: "x".into(),
                kind: EventKind::Create,
                occurred_at: Utc::now(),
                snapshot: json!({}),
            };
            assert!(e.is_scim_relevant());
        }
    }
}
