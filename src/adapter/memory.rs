use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use serde_json::{Map, Value, json};

use super::{AdapterError, AdapterResult, ScimAdapter};
use crate::scim::{
    MultivalueOperation, PageHint, SCHEMA_CORE, ScimListResponse,
    patch::{OPERATION_KEY, TYPE_KEY},
    validate_attributes,
};

/// Process-local adapter backed by concurrent maps.
///
/// Users are keyed by `userName`, which doubles as their `id`. Groups are
/// keyed by `displayName` and can only be created up front with
/// [`InMemoryAdapter::add_group`], since the gateway exposes no group
/// creation route. Creates and modifies are checked against the configured
/// attribute whitelist.
pub struct InMemoryAdapter {
    name: String,
    whitelist: Vec<String>,
    users: DashMap<String, Map<String, Value>>,
    groups: DashMap<String, Map<String, Value>>,
}

impl InMemoryAdapter {
    pub fn new(name: impl Into<String>, whitelist: Vec<String>) -> Self {
        Self {
            name: name.into(),
            whitelist,
            users: DashMap::new(),
            groups: DashMap::new(),
        }
    }

    /// Register an empty group. Returns false if it already exists.
    pub fn add_group(&self, display_name: &str) -> bool {
        if self.groups.contains_key(display_name) {
            return false;
        }
        let mut group = Map::new();
        group.insert("schemas".into(), json!([SCHEMA_CORE]));
        group.insert("id".into(), json!(display_name));
        group.insert("displayName".into(), json!(display_name));
        group.insert("members".into(), json!([]));
        group.insert("meta".into(), new_meta());
        self.groups.insert(display_name.to_string(), group);
        true
    }

    fn check_attributes(&self, resource: &Map<String, Value>) -> AdapterResult<()> {
        let rejected = validate_attributes(&Value::Object(resource.clone()), &self.whitelist);
        if rejected.is_empty() {
            Ok(())
        } else {
            Err(AdapterError::failed(format!(
                "unsupported attributes: {}",
                rejected.join(", ")
            )))
        }
    }

    fn find_user_id(&self, id_or_user_name: &str) -> Option<String> {
        if self.users.contains_key(id_or_user_name) {
            return Some(id_or_user_name.to_string());
        }
        self.users
            .iter()
            .find(|entry| entry.value().get("userName").and_then(Value::as_str) == Some(id_or_user_name))
            .map(|entry| entry.key().clone())
    }
}

fn now() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

fn new_meta() -> Value {
    let ts = now();
    json!({"created": ts, "lastModified": ts})
}

fn touch(resource: &mut Map<String, Value>) {
    match resource.get_mut("meta") {
        Some(Value::Object(meta)) => {
            meta.insert("lastModified".into(), now());
        }
        _ => {
            resource.insert("meta".into(), new_meta());
        }
    }
}

/// Keep only the requested top-level attributes, always including `id`.
fn project(resource: &Map<String, Value>, attributes: Option<&str>) -> Value {
    let wanted: Vec<&str> = attributes
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| a.split('.').next().unwrap_or(a))
        .collect();
    if wanted.is_empty() {
        return Value::Object(resource.clone());
    }
    let projected = resource
        .iter()
        .filter(|(key, _)| key.as_str() == "id" || wanted.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Value::Object(projected)
}

/// Apply the hint window and build the explore envelope.
fn explore(mut items: Vec<Value>, sort_key: &str, page: PageHint) -> ScimListResponse {
    items.sort_by(|a, b| {
        let key = |v: &Value| v.get(sort_key).and_then(Value::as_str).unwrap_or_default().to_string();
        key(a).cmp(&key(b))
    });
    let total = items.len() as u64;
    let start = page.start_index.unwrap_or(1).max(1);
    let skip = usize::try_from(start - 1).unwrap_or(usize::MAX);
    let take = page
        .count
        .and_then(|c| usize::try_from(c).ok())
        .unwrap_or(usize::MAX);
    ScimListResponse {
        total_results: Some(total),
        start_index: Some(start),
        ..ScimListResponse::new(items.into_iter().skip(skip).take(take).collect())
    }
}

/// Merge reconciled multivalue entries into an existing list.
fn apply_multivalue(existing: &mut Vec<Value>, entries: &[Value]) {
    for entry in entries {
        let op = MultivalueOperation::of(entry).unwrap_or(MultivalueOperation::Create);
        let mut entry = entry.clone();
        if let Value::Object(map) = &mut entry {
            map.remove(OPERATION_KEY);
        }
        let same_type = |v: &Value| v.get(TYPE_KEY) == entry.get(TYPE_KEY);
        match op {
            MultivalueOperation::Delete => {
                let value = entry.get("value");
                existing.retain(|v| !(same_type(v) && (value.is_none() || v.get("value") == value)));
            }
            MultivalueOperation::Modify => match existing.iter().position(same_type) {
                Some(pos) => existing[pos] = entry.clone(),
                None => existing.push(entry.clone()),
            },
            MultivalueOperation::Create => existing.push(entry.clone()),
        }
    }
}

fn is_reconciled_multivalue(value: &Value) -> bool {
    value.as_array().is_some_and(|entries| {
        !entries.is_empty() && entries.iter().all(|e| MultivalueOperation::of(e).is_some())
    })
}

/// Remove attributes named in `meta.attributes` (`title`, `name.givenName`).
fn clear_attributes(resource: &mut Map<String, Value>, names: &[Value]) {
    for name in names.iter().filter_map(Value::as_str) {
        match name.split_once('.') {
            Some((parent, child)) => {
                if let Some(Value::Object(nested)) = resource.get_mut(parent) {
                    nested.remove(child);
                }
            }
            None => {
                resource.remove(name);
            }
        }
    }
}

#[async_trait]
impl ScimAdapter for InMemoryAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn explore_users(&self, page: PageHint) -> AdapterResult<ScimListResponse> {
        let users = self
            .users
            .iter()
            .map(|entry| {
                json!({
                    "id": entry.key(),
                    "userName": entry.value().get("userName").cloned().unwrap_or(Value::Null),
                })
            })
            .collect();
        Ok(explore(users, "userName", page))
    }

    async fn get_user(
        &self,
        id_or_user_name: &str,
        attributes: Option<&str>,
    ) -> AdapterResult<Option<Value>> {
        let Some(id) = self.find_user_id(id_or_user_name) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|user| project(user.value(), attributes)))
    }

    async fn create_user(&self, mut user: Map<String, Value>) -> AdapterResult<()> {
        self.check_attributes(&user)?;
        let user_name = user
            .get("userName")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AdapterError::failed("userName is required"))?
            .to_string();

        let entry = match self.users.entry(user_name.clone()) {
            Entry::Occupied(_) => {
                return Err(AdapterError::failed(format!(
                    "user \"{user_name}\" already exists"
                )));
            }
            Entry::Vacant(entry) => entry,
        };
        user.insert("schemas".into(), json!([SCHEMA_CORE]));
        user.insert("id".into(), json!(user_name));
        user.insert("meta".into(), new_meta());
        entry.insert(user);
        tracing::debug!(adapter = %self.name, user = %user_name, "User created");
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> AdapterResult<()> {
        let id = self
            .find_user_id(id)
            .ok_or_else(|| AdapterError::failed(format!("user \"{id}\" not found")))?;
        self.users.remove(&id);

        for mut group in self.groups.iter_mut() {
            if let Some(Value::Array(members)) = group.value_mut().get_mut("members") {
                members.retain(|m| m.get("value").and_then(Value::as_str) != Some(id.as_str()));
            }
        }
        tracing::debug!(adapter = %self.name, user = %id, "User deleted");
        Ok(())
    }

    async fn modify_user(&self, id: &str, changes: Map<String, Value>) -> AdapterResult<()> {
        self.check_attributes(&changes)?;
        let key = self
            .find_user_id(id)
            .ok_or_else(|| AdapterError::failed(format!("user \"{id}\" not found")))?;
        let mut user = self
            .users
            .get_mut(&key)
            .ok_or_else(|| AdapterError::failed(format!("user \"{id}\" not found")))?;
        let user = user.value_mut();

        if let Some(names) = changes
            .get("meta")
            .and_then(|meta| meta.get("attributes"))
            .and_then(Value::as_array)
        {
            clear_attributes(user, names);
        }

        for (attribute, value) in changes {
            match attribute.as_str() {
                "id" | "schemas" | "meta" | "userName" => continue,
                _ => {}
            }
            if is_reconciled_multivalue(&value) {
                let entries = value.as_array().map(Vec::as_slice).unwrap_or_default();
                let slot = user
                    .entry(attribute)
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                if let Value::Array(existing) = slot {
                    apply_multivalue(existing, entries);
                }
                continue;
            }
            match value {
                Value::Null => {
                    user.remove(&attribute);
                }
                Value::Object(fields) => {
                    let slot = user
                        .entry(attribute)
                        .or_insert_with(|| Value::Object(Map::new()));
                    if !slot.is_object() {
                        *slot = Value::Object(Map::new());
                    }
                    if let Value::Object(existing) = slot {
                        for (field, v) in fields {
                            if v.is_null() {
                                existing.remove(&field);
                            } else {
                                existing.insert(field, v);
                            }
                        }
                    }
                }
                other => {
                    user.insert(attribute, other);
                }
            }
        }
        touch(user);
        tracing::debug!(adapter = %self.name, user = %key, "User modified");
        Ok(())
    }

    async fn explore_groups(&self, page: PageHint) -> AdapterResult<ScimListResponse> {
        let groups = self
            .groups
            .iter()
            .map(|entry| {
                json!({
                    "id": entry.key(),
                    "displayName": entry.value().get("displayName").cloned().unwrap_or(Value::Null),
                })
            })
            .collect();
        Ok(explore(groups, "displayName", page))
    }

    async fn get_group(
        &self,
        display_name: &str,
        attributes: Option<&str>,
    ) -> AdapterResult<Option<Value>> {
        Ok(self
            .groups
            .iter()
            .find(|entry| {
                entry.value().get("displayName").and_then(Value::as_str) == Some(display_name)
            })
            .map(|entry| project(entry.value(), attributes)))
    }

    async fn get_group_members(
        &self,
        user_id: &str,
        _attributes: Option<&str>,
    ) -> AdapterResult<Vec<Value>> {
        let mut groups: Vec<Value> = self
            .groups
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .get("members")
                    .and_then(Value::as_array)
                    .is_some_and(|members| {
                        members
                            .iter()
                            .any(|m| m.get("value").and_then(Value::as_str) == Some(user_id))
                    })
            })
            .map(|entry| {
                json!({
                    "id": entry.key(),
                    "displayName": entry.value().get("displayName").cloned().unwrap_or(Value::Null),
                    "members": [{"value": user_id}],
                })
            })
            .collect();
        groups.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
        Ok(groups)
    }

    async fn modify_group_members(&self, group_id: &str, members: Vec<Value>) -> AdapterResult<()> {
        // Reject the whole change before touching the group
        let changes = members
            .iter()
            .map(|member| {
                let value = member
                    .get("value")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AdapterError::failed("member entry is missing \"value\""))?;
                let remove = member.get(OPERATION_KEY).and_then(Value::as_str) == Some("delete");
                Ok((value, remove, member.get("display")))
            })
            .collect::<AdapterResult<Vec<_>>>()?;

        let mut group = self
            .groups
            .get_mut(group_id)
            .ok_or_else(|| AdapterError::failed(format!("group \"{group_id}\" not found")))?;
        let group = group.value_mut();

        let mut current = match group.get("members") {
            Some(Value::Array(current)) => current.clone(),
            _ => Vec::new(),
        };
        for (value, remove, display) in changes {
            let has = |m: &Value| m.get("value").and_then(Value::as_str) == Some(value);
            if remove {
                current.retain(|m| !has(m));
            } else if !current.iter().any(has) {
                let mut entry = json!({"value": value});
                if let Some(display) = display {
                    entry["display"] = display.clone();
                }
                current.push(entry);
            }
        }
        group.insert("members".into(), Value::Array(current));
        touch(group);
        tracing::debug!(adapter = %self.name, group = %group_id, "Group members modified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scim::merge_multivalue;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    async fn adapter_with_user() -> InMemoryAdapter {
        let adapter = InMemoryAdapter::new("memory", Vec::new());
        adapter
            .create_user(object(json!({
                "userName": "bjensen",
                "name": {"givenName": "Barbara", "familyName": "Jensen"},
                "title": "Tour Guide",
                "emails": [{"type": "work", "value": "bjensen@example.com"}]
            })))
            .await
            .unwrap();
        adapter
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let adapter = adapter_with_user().await;

        let user = adapter.get_user("bjensen", None).await.unwrap().unwrap();
        assert_eq!(user["id"], "bjensen");
        assert_eq!(user["name"]["givenName"], "Barbara");
        assert!(user["meta"]["created"].is_string());

        assert!(adapter.get_user("nobody", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_user_projects_attributes() {
        let adapter = adapter_with_user().await;

        let user = adapter
            .get_user("bjensen", Some("userName,name.givenName"))
            .await
            .unwrap()
            .unwrap();
        let keys: Vec<&String> = user.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["userName", "name", "id"]);
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let adapter = adapter_with_user().await;
        let err = adapter
            .create_user(object(json!({"userName": "bjensen"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "user \"bjensen\" already exists");
    }

    #[tokio::test]
    async fn test_create_checks_whitelist() {
        let adapter = InMemoryAdapter::new(
            "memory",
            vec!["userName".into(), "emails.[].type=work".into()],
        );
        let err = adapter
            .create_user(object(json!({
                "userName": "bjensen",
                "emails": [{"type": "home", "value": "b@example.com"}]
            })))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unsupported attributes: emails.0.type");
    }

    #[tokio::test]
    async fn test_modify_applies_reconciled_multivalue() {
        let adapter = adapter_with_user().await;
        let changes = merge_multivalue(object(json!({
            "title": "Manager",
            "name": {"familyName": null},
            "emails": [
                {"type": "work", "value": "barbara@example.com"},
                {"operation": "delete", "type": "work", "value": "bjensen@example.com"}
            ],
            "phoneNumbers": [{"type": "mobile", "value": "555-1234"}]
        })))
        .unwrap();

        adapter.modify_user("bjensen", changes).await.unwrap();

        let user = adapter.get_user("bjensen", None).await.unwrap().unwrap();
        assert_eq!(user["title"], "Manager");
        assert_eq!(user["name"], json!({"givenName": "Barbara"}));
        assert_eq!(
            user["emails"],
            json!([{"type": "work", "value": "barbara@example.com"}])
        );
        assert_eq!(
            user["phoneNumbers"],
            json!([{"type": "mobile", "value": "555-1234"}])
        );
    }

    #[tokio::test]
    async fn test_modify_clears_meta_attributes() {
        let adapter = adapter_with_user().await;
        adapter
            .modify_user(
                "bjensen",
                object(json!({"meta": {"attributes": ["title", "name.givenName"]}})),
            )
            .await
            .unwrap();

        let user = adapter.get_user("bjensen", None).await.unwrap().unwrap();
        assert!(user.get("title").is_none());
        assert_eq!(user["name"], json!({"familyName": "Jensen"}));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let adapter = adapter_with_user().await;
        adapter.add_group("Admins");
        adapter
            .modify_group_members("Admins", vec![json!({"value": "bjensen"})])
            .await
            .unwrap();

        adapter.delete_user("bjensen").await.unwrap();

        assert!(adapter.get_user("bjensen", None).await.unwrap().is_none());
        assert!(adapter.get_group_members("bjensen", None).await.unwrap().is_empty());
        let err = adapter.delete_user("bjensen").await.unwrap_err();
        assert_eq!(err.to_string(), "user \"bjensen\" not found");
    }

    #[tokio::test]
    async fn test_explore_users_windows_by_hint() {
        let adapter = InMemoryAdapter::new("memory", Vec::new());
        for name in ["carol", "alice", "bob"] {
            adapter
                .create_user(object(json!({"userName": name})))
                .await
                .unwrap();
        }

        let all = adapter.explore_users(PageHint::default()).await.unwrap();
        let names: Vec<&str> = all
            .resources
            .iter()
            .map(|u| u["userName"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
        assert_eq!(all.total_results, Some(3));

        let window = adapter
            .explore_users(PageHint {
                start_index: Some(2),
                count: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(window.resources, vec![json!({"id": "bob", "userName": "bob"})]);
        assert_eq!(window.total_results, Some(3));
        assert_eq!(window.start_index, Some(2));
    }

    #[tokio::test]
    async fn test_group_membership() {
        let adapter = adapter_with_user().await;
        assert!(adapter.add_group("Admins"));
        assert!(adapter.add_group("Staff"));
        assert!(!adapter.add_group("Admins"));

        adapter
            .modify_group_members("Admins", vec![json!({"value": "bjensen", "display": "Barbara"})])
            .await
            .unwrap();
        adapter
            .modify_group_members("Staff", vec![json!({"value": "bjensen"})])
            .await
            .unwrap();

        let groups = adapter.get_group_members("bjensen", None).await.unwrap();
        assert_eq!(
            groups,
            vec![
                json!({"id": "Admins", "displayName": "Admins", "members": [{"value": "bjensen"}]}),
                json!({"id": "Staff", "displayName": "Staff", "members": [{"value": "bjensen"}]}),
            ]
        );

        adapter
            .modify_group_members(
                "Staff",
                vec![json!({"value": "bjensen", "operation": "delete"})],
            )
            .await
            .unwrap();
        let group = adapter.get_group("Staff", None).await.unwrap().unwrap();
        assert_eq!(group["members"], json!([]));

        let admins = adapter.get_group("Admins", Some("members")).await.unwrap().unwrap();
        assert_eq!(
            admins["members"],
            json!([{"value": "bjensen", "display": "Barbara"}])
        );
    }

    #[tokio::test]
    async fn test_modify_unknown_group() {
        let adapter = InMemoryAdapter::new("memory", Vec::new());
        let err = adapter
            .modify_group_members("Nope", vec![json!({"value": "x"})])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "group \"Nope\" not found");
    }

    #[tokio::test]
    async fn test_invalid_member_leaves_group_untouched() {
        let adapter = InMemoryAdapter::new("memory", Vec::new());
        adapter.add_group("Admins");
        adapter
            .modify_group_members("Admins", vec![json!({"value": "bjensen"})])
            .await
            .unwrap();

        let err = adapter
            .modify_group_members(
                "Admins",
                vec![
                    json!({"value": "alice"}),
                    json!({"value": "bjensen", "operation": "delete"}),
                    json!({"display": "no value"}),
                ],
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "member entry is missing \"value\"");

        let group = adapter.get_group("Admins", None).await.unwrap().unwrap();
        assert_eq!(group["members"], json!([{"value": "bjensen"}]));
    }
}
