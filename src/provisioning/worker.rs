//! Delivery Worker (§4.4): executes one attempt against one claimed `Delivery`.
//!
//! Loads the destination and source event, decides which `OperationKind` the
//! event maps to, resolves any `ResourceMapping` it needs, mints a token,
//! translates the event into a SCIM request, invokes the HTTP client, and
//! classifies the response into a terminal or retryable outcome.

use crate::domain::{
    scope_for_operation, DeleteAction, Delivery, Destination, EventKind, EventResourceType,
    LocalEvent, LocalResourceType, OperationKind, ResourceMapping,
};
use crate::error::Result;
use crate::provisioning::http_client::{ScimHttpClient, ScimResponse};
use crate::provisioning::token::TokenMinter;
use crate::provisioning::token::TokenSigner;
use crate::provisioning::translator;
use crate::repository::{DeliveryRepository, ResourceMappingRepository};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

/// What the worker decided to do with one delivery attempt, for logging/testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Skipped,
    Retrying,
    Failed,
}

/// Picks the `OperationKind` an event maps to, given the destination's configured
/// `delete_action`. Returns `None` for combinations that have no SCIM equivalent
/// (e.g. a GROUP_MEMBER UPDATE, which the source system never emits).
pub fn operation_for_event(event: &LocalEvent, delete_action: DeleteAction) -> Option<OperationKind> {
    use EventKind::*;
    use EventResourceType::*;
    match (event.resource_type, event.kind) {
        (User, Create) => Some(OperationKind::CreateUser),
        (User, Update) => Some(OperationKind::UpdateUser),
        (User, Delete) => Some(match delete_action {
            DeleteAction::Deactivate => OperationKind::DeactivateUser,
            DeleteAction::HardDelete => OperationKind::DeleteUser,
        }),
        (Group, Create) => Some(OperationKind::CreateGroup),
        (Group, Update) => Some(OperationKind::UpdateGroup),
        (Group, Delete) => Some(OperationKind::DeleteGroup),
        (GroupMember, Create) => Some(OperationKind::AddGroupMember),
        (GroupMember, Delete) => Some(OperationKind::RemoveGroupMember),
        (GroupMember, Update) => None,
    }
}

pub struct DeliveryWorker<H: ScimHttpClient, S: TokenSigner> {
    deliveries: Arc<dyn DeliveryRepository>,
    mappings: Arc<dyn ResourceMappingRepository>,
    http: Arc<H>,
    token_minter: Arc<TokenMinter<S>>,
}

impl<H: ScimHttpClient, S: TokenSigner> DeliveryWorker<H, S> {
    pub fn new(
        deliveries: Arc<dyn DeliveryRepository>,
        mappings: Arc<dyn ResourceMappingRepository>,
        http: Arc<H>,
        token_minter: Arc<TokenMinter<S>>,
    ) -> Self {
        Self {
            deliveries,
            mappings,
            http,
            token_minter,
        }
    }

    /// Run one attempt for `delivery` against `destination`/`event`. Persists the
    /// resulting state transition and returns the outcome for the caller to log.
    pub async fn attempt(
        &self,
        delivery: &Delivery,
        destination: &Destination,
        event: &LocalEvent,
    ) -> Result<Outcome> {
        if !destination.enabled {
            self.deliveries
                .mark_failed(
                    delivery.id,
                    None,
                    crate::domain::truncate_error("destination is disabled".to_string()),
                )
                .await?;
            return Ok(Outcome::Failed);
        }

        let Some(operation) = operation_for_event(event, destination.delete_action) else {
            self.deliveries
                .mark_success(delivery.id, None, None)
                .await?;
            return Ok(Outcome::Skipped);
        };

        if !destination.enabled_operations.contains(&operation) {
            self.deliveries
                .mark_success(delivery.id, None, None)
                .await?;
            return Ok(Outcome::Skipped);
        }

        match self
            .dispatch(delivery, destination, event, operation)
            .await?
        {
            DispatchResult::Synthetic => {
                self.deliveries
                    .mark_success(delivery.id, None, None)
                    .await?;
                Ok(Outcome::Skipped)
            }
            DispatchResult::PermanentFailure(msg) => {
                self.deliveries
                    .mark_failed(delivery.id, None, crate::domain::truncate_error(msg))
                    .await?;
                Ok(Outcome::Failed)
            }
            DispatchResult::Response(response, local_resource) => {
                let is_delete = matches!(
                    operation,
                    OperationKind::DeactivateUser | OperationKind::DeleteUser | OperationKind::DeleteGroup
                );
                self.classify(delivery, destination, &response, local_resource, is_delete)
                    .await
            }
        }
    }

    async fn dispatch(
        &self,
        delivery: &Delivery,
        destination: &Destination,
        event: &LocalEvent,
        operation: OperationKind,
    ) -> Result<DispatchResult> {
        let required = BTreeSet::from([scope_for_operation(operation)]);
        let token = self.token_minter.mint(destination, &required).await?;

        match operation {
            OperationKind::CreateUser => {
                let body = self.build_user_body(destination, event, None);
                let response = self.http.post(destination.base_url_trimmed(), "Users", &token, body).await;
                Ok(DispatchResult::Response(response, Some((LocalResourceType::User, event.resource_id.clone()))))
            }
            OperationKind::UpdateUser => {
                match self
                    .mappings
                    .find(destination.id, LocalResourceType::User, &event.resource_id)
                    .await?
                {
                    None => Ok(DispatchResult::PermanentFailure(
                        "cannot UPDATE_USER: no prior CREATE mapping exists for this local user".into(),
                    )),
                    Some(mapping) => {
                        let body = self.build_user_body(destination, event, Some(&mapping.scim_resource_id));
                        let path = format!("Users/{}", mapping.scim_resource_id);
                        let response = self.http.put(destination.base_url_trimmed(), &path, &token, body).await;
                        Ok(DispatchResult::Response(response, Some((LocalResourceType::User, event.resource_id.clone()))))
                    }
                }
            }
            OperationKind::DeactivateUser => {
                match self
                    .mappings
                    .find(destination.id, LocalResourceType::User, &event.resource_id)
                    .await?
                {
                    None => Ok(DispatchResult::Synthetic),
                    Some(mapping) => {
                        let path = format!("Users/{}", mapping.scim_resource_id);
                        let response = self
                            .http
                            .patch(destination.base_url_trimmed(), &path, &token, translator::deactivate_patch())
                            .await;
                        Ok(DispatchResult::Response(
                            response,
                            Some((LocalResourceType::User, event.resource_id.clone())),
                        ))
                    }
                }
            }
            OperationKind::DeleteUser => {
                match self
                    .mappings
                    .find(destination.id, LocalResourceType::User, &event.resource_id)
                    .await?
                {
                    None => Ok(DispatchResult::Synthetic),
                    Some(mapping) => {
                        let path = format!("Users/{}", mapping.scim_resource_id);
                        let response = self.http.delete(destination.base_url_trimmed(), &path, &token).await;
                        Ok(DispatchResult::Response(
                            response,
                            Some((LocalResourceType::User, event.resource_id.clone())),
                        ))
                    }
                }
            }
            OperationKind::CreateGroup => {
                let body = translator::default_group_body(&event.snapshot, None);
                let response = self.http.post(destination.base_url_trimmed(), "Groups", &token, body).await;
                Ok(DispatchResult::Response(response, Some((LocalResourceType::Group, event.resource_id.clone()))))
            }
            OperationKind::UpdateGroup => {
                match self
                    .mappings
                    .find(destination.id, LocalResourceType::Group, &event.resource_id)
                    .await?
                {
                    None => Ok(DispatchResult::PermanentFailure(
                        "cannot UPDATE_GROUP: no prior CREATE mapping exists for this local group".into(),
                    )),
                    Some(mapping) => {
                        let body = translator::default_group_body(&event.snapshot, Some(&mapping.scim_resource_id));
                        let path = format!("Groups/{}", mapping.scim_resource_id);
                        let response = self.http.put(destination.base_url_trimmed(), &path, &token, body).await;
                        Ok(DispatchResult::Response(response, Some((LocalResourceType::Group, event.resource_id.clone()))))
                    }
                }
            }
            OperationKind::DeleteGroup => {
                match self
                    .mappings
                    .find(destination.id, LocalResourceType::Group, &event.resource_id)
                    .await?
                {
                    None => Ok(DispatchResult::Synthetic),
                    Some(mapping) => {
                        let path = format!("Groups/{}", mapping.scim_resource_id);
                        let response = self.http.delete(destination.base_url_trimmed(), &path, &token).await;
                        Ok(DispatchResult::Response(
                            response,
                            Some((LocalResourceType::Group, event.resource_id.clone())),
                        ))
                    }
                }
            }
            OperationKind::AddGroupMember | OperationKind::RemoveGroupMember => {
                self.dispatch_membership(delivery, destination, event, operation, &token).await
            }
        }
    }

    async fn dispatch_membership(
        &self,
        _delivery: &Delivery,
        destination: &Destination,
        event: &LocalEvent,
        operation: OperationKind,
        token: &str,
    ) -> Result<DispatchResult> {
        let Some((group_id, user_id)) = event.group_member_ids() else {
            return Ok(DispatchResult::PermanentFailure(
                "membership event snapshot is missing groupId/userId".into(),
            ));
        };

        let group_mapping = self
            .mappings
            .find(destination.id, LocalResourceType::Group, &group_id)
            .await?;
        let user_mapping = self
            .mappings
            .find(destination.id, LocalResourceType::User, &user_id)
            .await?;

        let (Some(group_mapping), Some(user_mapping)) = (group_mapping, user_mapping) else {
            return Ok(DispatchResult::PermanentFailure(format!(
                "cannot {operation}: missing resource mapping for group {group_id} or user {user_id}"
            )));
        };

        let patch = match operation {
            OperationKind::AddGroupMember => translator::add_member_patch(&user_mapping.scim_resource_id),
            OperationKind::RemoveGroupMember => translator::remove_member_patch(&user_mapping.scim_resource_id),
            _ => unreachable!("dispatch_membership only called for membership operations"),
        };

        let path = format!("Groups/{}", group_mapping.scim_resource_id);
        let response = self.http.patch(destination.base_url_trimmed(), &path, token, patch).await;
        Ok(DispatchResult::Response(response, None))
    }

    fn build_user_body(&self, destination: &Destination, event: &LocalEvent, scim_id: Option<&str>) -> serde_json::Value {
        if destination.attribute_mapping.is_empty() {
            translator::default_user_body(&event.snapshot, scim_id)
        } else {
            let schemas = ["urn:ietf:params:scim:schemas:core:2.0:User"];
            let mut body = translator::apply_custom_mapping(&destination.attribute_mapping, &event.snapshot, &schemas);
            if let Some(id) = scim_id {
                body["id"] = serde_json::json!(id);
            }
            body
        }
    }

    async fn classify(
        &self,
        delivery: &Delivery,
        destination: &Destination,
        response: &ScimResponse,
        local_resource: Option<(LocalResourceType, String)>,
        is_delete: bool,
    ) -> Result<Outcome> {
        let status = response.status;

        if (200..300).contains(&status) {
            if let Some((resource_type, local_id)) = &local_resource {
                if is_delete {
                    self.mappings.delete(destination.id, *resource_type, local_id).await?;
                } else if let Some(scim_id) = &response.scim_resource_id {
                    self.mappings
                        .upsert(destination.id, *resource_type, local_id, scim_id)
                        .await?;
                }
            }
            self.deliveries
                .mark_success(delivery.id, Some(status as i32), response.scim_resource_id.clone())
                .await?;
            return Ok(Outcome::Success);
        }

        // 404 on DELETE is treated as already-absent: synthetic success, mapping removed.
        // 404 on anything else (e.g. UPDATE against a stale mapping) falls through below
        // and ends up a permanent failure, since it isn't in the retryable set.
        if status == 404 && is_delete {
            if let Some((resource_type, local_id)) = &local_resource {
                self.mappings.delete(destination.id, *resource_type, local_id).await?;
            }
            self.deliveries
                .mark_success(delivery.id, Some(status as i32), None)
                .await?;
            return Ok(Outcome::Success);
        }

        let retryable = response.is_transport_failure() || status == 429 || (500..600).contains(&status);
        let error = response
            .error_message
            .clone()
            .unwrap_or_else(|| format!("SCIM request failed with status {status}"));

        if retryable && !destination.retry_policy.is_exhausted(delivery.retry_count) {
            let backoff_ms = destination.retry_policy.backoff(delivery.retry_count);
            let next_retry_at = Utc::now() + chrono::Duration::milliseconds(backoff_ms as i64);
            self.deliveries
                .mark_retry(
                    delivery.id,
                    if status == 0 { None } else { Some(status as i32) },
                    crate::domain::truncate_error(error),
                    next_retry_at,
                    delivery.retry_count + 1,
                )
                .await?;
            Ok(Outcome::Retrying)
        } else {
            self.deliveries
                .mark_failed(
                    delivery.id,
                    if status == 0 { None } else { Some(status as i32) },
                    crate::domain::truncate_error(error),
                )
                .await?;
            Ok(Outcome::Failed)
        }
    }
}

enum DispatchResult {
    Response(ScimResponse, Option<(LocalResourceType, String)>),
    /// No network call was made; the operation is a synthetic success (e.g.
    /// deactivate/delete of a user that was never mapped downstream).
    Synthetic,
    PermanentFailure(String),
}
