//! Operation kinds and the scopes they require.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One of the nine SCIM operations the core may emit against a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    CreateUser,
    UpdateUser,
    DeactivateUser,
    DeleteUser,
    CreateGroup,
    UpdateGroup,
    DeleteGroup,
    AddGroupMember,
    RemoveGroupMember,
}

impl OperationKind {
    pub const ALL: [OperationKind; 9] = [
        OperationKind::CreateUser,
        OperationKind::UpdateUser,
        OperationKind::DeactivateUser,
        OperationKind::DeleteUser,
        OperationKind::CreateGroup,
        OperationKind::UpdateGroup,
        OperationKind::DeleteGroup,
        OperationKind::AddGroupMember,
        OperationKind::RemoveGroupMember,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateUser => "CREATE_USER",
            OperationKind::UpdateUser => "UPDATE_USER",
            OperationKind::DeactivateUser => "DEACTIVATE_USER",
            OperationKind::DeleteUser => "DELETE_USER",
            OperationKind::CreateGroup => "CREATE_GROUP",
            OperationKind::UpdateGroup => "UPDATE_GROUP",
            OperationKind::DeleteGroup => "DELETE_GROUP",
            OperationKind::AddGroupMember => "ADD_GROUP_MEMBER",
            OperationKind::RemoveGroupMember => "REMOVE_GROUP_MEMBER",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope constant identifying a named SCIM permission on a tenant's client-application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScimScope {
    UsersRead,
    UsersWrite,
    GroupsRead,
    GroupsWrite,
}

impl ScimScope {
    pub const ALL: [ScimScope; 4] = [
        ScimScope::UsersRead,
        ScimScope::UsersWrite,
        ScimScope::GroupsRead,
        ScimScope::GroupsWrite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScimScope::UsersRead => "scim:users:read",
            ScimScope::UsersWrite => "scim:users:write",
            ScimScope::GroupsRead => "scim:groups:read",
            ScimScope::GroupsWrite => "scim:groups:write",
        }
    }
}

impl fmt::Display for ScimScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The scope an operation requires. All user mutations require `users:write`;
/// all group mutations and membership PATCH operations require `groups:write`.
pub fn scope_for_operation(op: OperationKind) -> ScimScope {
    match op {
        OperationKind::CreateUser
        | OperationKind::UpdateUser
        | OperationKind::DeactivateUser
        | OperationKind::DeleteUser => ScimScope::UsersWrite,
        OperationKind::CreateGroup
        | OperationKind::UpdateGroup
        | OperationKind::DeleteGroup
        | OperationKind::AddGroupMember
        | OperationKind::RemoveGroupMember => ScimScope::GroupsWrite,
    }
}

/// `RequiredScopes(ops) = { scope(op) : op in ops }`.
pub fn required_scopes(ops: impl IntoIterator<Item = OperationKind>) -> BTreeSet<ScimScope> {
    ops.into_iter().map(scope_for_operation).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_scopes_of_empty_set_is_empty() {
        assert!(required_scopes(std::iter::empty()).is_empty());
    }

    #[test]
    fn required_scopes_is_union_distributive() {
        let a = [OperationKind::CreateUser, OperationKind::UpdateUser];
        let b = [OperationKind::CreateGroup];
        let union_then_scopes = required_scopes(a.iter().copied().chain(b.iter().copied()));
        let mut scopes_then_union = required_scopes(a.iter().copied());
        scopes_then_union.extend(required_scopes(b.iter().copied()));
        assert_eq!(union_then_scopes, scopes_then_union);
    }

    #[test]
    fn user_write_operations_require_users_write() {
        for op in [
            OperationKind::CreateUser,
            OperationKind::UpdateUser,
            OperationKind::DeactivateUser,
            OperationKind::DeleteUser,
        ] {
            assert_eq!(scope_for_operation(op), ScimScope::UsersWrite);
        }
    }

    #[test]
    fn group_and_membership_operations_require_groups_write() {
        for op in [
            OperationKind::CreateGroup,
            OperationKind::UpdateGroup,
            OperationKind::DeleteGroup,
            OperationKind::AddGroupMember,
            OperationKind::RemoveGroupMember,
        ] {
            assert_eq!(scope_for_operation(op), ScimScope::GroupsWrite);
        }
    }

    #[test]
    fn scope_as_str_matches_wire_names() {
        assert_eq!(ScimScope::UsersWrite.as_str(), "scim:users:write");
        assert_eq!(ScimScope::GroupsRead.as_str(), "scim:groups:read");
    }
}
