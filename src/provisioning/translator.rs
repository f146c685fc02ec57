//! SCIM Translator (§4.5): maps a local entity snapshot to a SCIM JSON payload,
//! using either the default mapping or a destination's custom attribute mapping.
//! Stateless and deterministic: same inputs always produce the same tree (key
//! ordering aside).

use serde_json::{json, Value};
use std::collections::BTreeMap;

const USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
const GROUP_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
const PATCH_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

/// Build a default-mapped SCIM User body from a `{user, profile}` snapshot.
/// `scim_id`, when present, is included for an UPDATE PUT.
pub fn default_user_body(snapshot: &Value, scim_id: Option<&str>) -> Value {
    let user = snapshot.get("user");
    let profile = snapshot.get("profile");

    let mut body = json!({
        "schemas": [USER_SCHEMA],
        "userName": user.and_then(|u| u.get("username")).and_then(Value::as_str).unwrap_or(""),
        "externalId": user.and_then(|u| u.get("id")).and_then(Value::as_str).unwrap_or(""),
        "name": {
            "givenName": profile.and_then(|p| p.get("given_name")).and_then(Value::as_str).unwrap_or(""),
            "familyName": profile.and_then(|p| p.get("family_name")).and_then(Value::as_str).unwrap_or(""),
        },
        "emails": [{
            "value": user.and_then(|u| u.get("email")).and_then(Value::as_str).unwrap_or(""),
            "primary": true,
        }],
    });

    if let Some(id) = scim_id {
        body["id"] = json!(id);
    }
    body
}

/// Build a default-mapped SCIM Group body from a `{group}` snapshot.
pub fn default_group_body(snapshot: &Value, scim_id: Option<&str>) -> Value {
    let group = snapshot.get("group");
    let mut body = json!({
        "schemas": [GROUP_SCHEMA],
        "displayName": group.and_then(|g| g.get("displayName")).and_then(Value::as_str).unwrap_or(""),
        "externalId": group.and_then(|g| g.get("id")).and_then(Value::as_str).unwrap_or(""),
    });
    if let Some(id) = scim_id {
        body["id"] = json!(id);
    }
    body
}

/// One path segment: a plain key, or a key plus an array index (`emails[0]`).
enum Segment<'a> {
    Key(&'a str),
    Indexed(&'a str, usize),
}

fn parse_path(path: &str) -> Vec<Segment<'_>> {
    path.split('.')
        .map(|part| match part.split_once('[') {
            Some((key, rest)) => {
                let idx_str = rest.trim_end_matches(']');
                match idx_str.parse::<usize>() {
                    Ok(idx) => Segment::Indexed(key, idx),
                    Err(_) => Segment::Key(part),
                }
            }
            None => Segment::Key(part),
        })
        .collect()
}

/// Assign `value` at `path` in `target`, lazily constructing intermediate
/// objects and growing arrays so in-range indices never fail.
fn assign_path(target: &mut Value, path: &str, value: Value) {
    let segments = parse_path(path);
    let mut cursor = target;

    for (i, segment) in segments.iter().enumerate() {
        let is_last = i == segments.len() - 1;
        match segment {
            Segment::Key(key) => {
                if !cursor.is_object() {
                    *cursor = json!({});
                }
                let obj = cursor.as_object_mut().unwrap();
                if is_last {
                    obj.insert(key.to_string(), value);
                    return;
                }
                cursor = obj.entry(key.to_string()).or_insert_with(|| json!({}));
            }
            Segment::Indexed(key, idx) => {
                if !cursor.is_object() {
                    *cursor = json!({});
                }
                let obj = cursor.as_object_mut().unwrap();
                let arr = obj.entry(key.to_string()).or_insert_with(|| json!([]));
                if !arr.is_array() {
                    *arr = json!([]);
                }
                let vec = arr.as_array_mut().unwrap();
                while vec.len() <= *idx {
                    vec.push(json!({}));
                }
                if is_last {
                    vec[*idx] = value;
                    return;
                }
                cursor = &mut vec[*idx];
            }
        }
    }
}

/// Resolve a `$.`-prefixed source expression against `{user, profile, group}`.
/// Literal `"true"`/`"false"` coerce to booleans; anything else that isn't a
/// `$.` path is treated as absent.
fn resolve_source(expr: &str, view: &Value) -> Option<Value> {
    match expr {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        _ => {}
    }
    let path = expr.strip_prefix("$.")?;
    let mut cursor = view;
    for part in path.split('.') {
        cursor = cursor.get(part)?;
    }
    Some(cursor.clone())
}

/// Apply a destination's custom attribute mapping (`scim_target_path -> source_expression`)
/// against a `{user, profile, group}` view. Entries whose source doesn't resolve are
/// skipped; an empty result (no sources resolved) still carries `schemas`.
pub fn apply_custom_mapping(
    mapping: &BTreeMap<String, String>,
    view: &Value,
    schemas: &[&str],
) -> Value {
    let mut body = json!({ "schemas": schemas });
    for (target_path, source_expr) in mapping {
        if let Some(value) = resolve_source(source_expr, view) {
            assign_path(&mut body, target_path, value);
        }
    }
    body
}

/// `{schemas:[...PatchOp], Operations:[{op:"replace", path:"active", value:false}]}`.
pub fn deactivate_patch() -> Value {
    json!({
        "schemas": [PATCH_SCHEMA],
        "Operations": [{ "op": "replace", "path": "active", "value": false }],
    })
}

/// `{...PatchOp, Operations:[{op:"add", path:"members", value:[{value:<userScimId>}]}]}`.
pub fn add_member_patch(user_scim_id: &str) -> Value {
    json!({
        "schemas": [PATCH_SCHEMA],
        "Operations": [{
            "op": "add",
            "path": "members",
            "value": [{ "value": user_scim_id }],
        }],
    })
}

/// `{...PatchOp, Operations:[{op:"remove", path:"members[value eq \"<userScimId>\"]"}]}`.
pub fn remove_member_patch(user_scim_id: &str) -> Value {
    json!({
        "schemas": [PATCH_SCHEMA],
        "Operations": [{
            "op": "remove",
            "path": format!("members[value eq \"{}\"]", user_scim_id),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_snapshot() -> Value {
        json!({
            "user": {"id": "u-A", "username": "alice", "email": "a@x"},
            "profile": {"given_name": "Al", "family_name": "Ice"},
        })
    }

    #[test]
    fn default_user_body_matches_s1_scenario() {
        let body = default_user_body(&user_snapshot(), None);
        assert_eq!(body["userName"], "alice");
        assert_eq!(body["externalId"], "u-A");
        assert_eq!(body["emails"][0]["value"], "a@x");
        assert_eq!(body["emails"][0]["primary"], true);
        assert_eq!(body["name"]["givenName"], "Al");
        assert_eq!(body["name"]["familyName"], "Ice");
        assert_eq!(body["schemas"][0], USER_SCHEMA);
        assert!(body.get("id").is_none());
    }

    #[test]
    fn default_user_body_includes_id_for_update() {
        let body = default_user_body(&user_snapshot(), Some("dw-u-1"));
        assert_eq!(body["id"], "dw-u-1");
    }

    #[test]
    fn default_group_body_maps_display_name_and_external_id() {
        let snapshot = json!({"group": {"id": "g-1", "displayName": "Engineers"}});
        let body = default_group_body(&snapshot, None);
        assert_eq!(body["displayName"], "Engineers");
        assert_eq!(body["externalId"], "g-1");
        assert_eq!(body["schemas"][0], GROUP_SCHEMA);
    }

    #[test]
    fn deactivate_patch_matches_spec_shape() {
        let patch = deactivate_patch();
        assert_eq!(patch["schemas"][0], PATCH_SCHEMA);
        assert_eq!(patch["Operations"][0]["op"], "replace");
        assert_eq!(patch["Operations"][0]["path"], "active");
        assert_eq!(patch["Operations"][0]["value"], false);
    }

    #[test]
    fn add_member_patch_matches_s5_scenario() {
        let patch = add_member_patch("u1");
        assert_eq!(patch["Operations"][0]["op"], "add");
        assert_eq!(patch["Operations"][0]["path"], "members");
        assert_eq!(patch["Operations"][0]["value"][0]["value"], "u1");
    }

    #[test]
    fn remove_member_patch_embeds_filter_expression() {
        let patch = remove_member_patch("u1");
        assert_eq!(patch["Operations"][0]["op"], "remove");
        assert_eq!(patch["Operations"][0]["path"], "members[value eq \"u1\"]");
    }

    #[test]
    fn custom_mapping_resolves_dollar_paths_and_literals() {
        let mut mapping = BTreeMap::new();
        mapping.insert("userName".to_string(), "$.user.username".to_string());
        mapping.insert("active".to_string(), "true".to_string());
        mapping.insert("emails[0].value".to_string(), "$.user.email".to_string());
        mapping.insert("emails[0].primary".to_string(), "true".to_string());

        let body = apply_custom_mapping(&mapping, &user_snapshot(), &[USER_SCHEMA]);
        assert_eq!(body["userName"], "alice");
        assert_eq!(body["active"], true);
        assert_eq!(body["emails"][0]["value"], "a@x");
        assert_eq!(body["emails"][0]["primary"], true);
    }

    #[test]
    fn custom_mapping_with_no_resolvable_sources_is_minimal() {
        let mut mapping = BTreeMap::new();
        mapping.insert("userName".to_string(), "$.user.nonexistent".to_string());
        let body = apply_custom_mapping(&mapping, &user_snapshot(), &[USER_SCHEMA]);
        assert_eq!(body.as_object().unwrap().len(), 1);
        assert_eq!(body["schemas"][0], USER_SCHEMA);
    }

    #[test]
    fn custom_mapping_grows_arrays_for_in_range_indices() {
        let mut mapping = BTreeMap::new();
        mapping.insert("emails[1].value".to_string(), "$.user.email".to_string());
        let body = apply_custom_mapping(&mapping, &user_snapshot(), &[USER_SCHEMA]);
        assert_eq!(body["emails"].as_array().unwrap().len(), 2);
        assert_eq!(body["emails"][1]["value"], "a@x");
    }

    #[test]
    fn translator_is_deterministic_for_the_same_inputs() {
        let a = default_user_body(&user_snapshot(), Some("x"));
        let b = default_user_body(&user_snapshot(), Some("x"));
        assert_eq!(a, b);
    }
}
