//! Multivalue PATCH reconciliation.
//!
//! Provisioning clients express a change to a multivalue attribute (an email
//! address, a phone number) as a pair of entries: the old value tagged
//! `"operation": "delete"` and the new value untagged. Before a modify reaches
//! the adapter, each array of objects in the body is rewritten so that every
//! entry carries an explicit operation:
//!
//! - an untagged entry whose `type` matches a delete-tagged entry becomes
//!   `modify`, and the delete-tagged entry is dropped;
//! - a delete-tagged entry with no partner stays as `delete`;
//! - any other untagged entry becomes `create`.
//!
//! ```text
//! [{"type":"work","value":"new"}, {"operation":"delete","type":"work","value":"old"}]
//!   => [{"type":"work","value":"new","operation":"modify"}]
//! ```
//!
//! After reconciliation no two surviving (non-delete) entries of one
//! attribute may share a `type`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key holding the per-entry operation tag.
pub const OPERATION_KEY: &str = "operation";

/// Discriminator key of multivalue entries.
pub const TYPE_KEY: &str = "type";

/// Operation resolved for one multivalue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultivalueOperation {
    Create,
    Modify,
    Delete,
}

impl MultivalueOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            MultivalueOperation::Create => "create",
            MultivalueOperation::Modify => "modify",
            MultivalueOperation::Delete => "delete",
        }
    }

    /// Read the resolved operation of a merged entry.
    pub fn of(entry: &Value) -> Option<Self> {
        match entry.get(OPERATION_KEY)?.as_str()? {
            "create" => Some(MultivalueOperation::Create),
            "modify" => Some(MultivalueOperation::Modify),
            "delete" => Some(MultivalueOperation::Delete),
            _ => None,
        }
    }
}

/// Two surviving entries of one attribute share a `type`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "\"type\" must be unique using multivalue attributes! Found multiple entries in \
     \"{attribute}\" having the same \"type\" with value \"{type_value}\""
)]
pub struct DuplicateTypeError {
    pub attribute: String,
    pub type_value: String,
}

/// Reconcile every multivalue attribute of a modify body.
///
/// Only top-level arrays whose elements are all objects are rewritten; scalars,
/// nested objects and mixed arrays pass through unchanged. The whole body is
/// rejected on the first duplicate `type`.
pub fn merge_multivalue(
    mut body: Map<String, Value>,
) -> Result<Map<String, Value>, DuplicateTypeError> {
    for (attribute, value) in body.iter_mut() {
        let Value::Array(entries) = value else {
            continue;
        };
        if entries.is_empty() || !entries.iter().all(Value::is_object) {
            continue;
        }
        let merged = merge_entries(std::mem::take(entries));
        check_unique_types(attribute, &merged)?;
        *entries = merged;
    }
    Ok(body)
}

fn is_delete(entry: &Value) -> bool {
    entry.get(OPERATION_KEY).and_then(Value::as_str) == Some("delete")
}

fn set_operation(entry: &mut Value, op: MultivalueOperation) {
    if let Value::Object(map) = entry {
        map.insert(OPERATION_KEY.to_string(), Value::from(op.as_str()));
    }
}

fn merge_entries(mut entries: Vec<Value>) -> Vec<Value> {
    let deletes: Vec<usize> = (0..entries.len()).filter(|&i| is_delete(&entries[i])).collect();
    let mut resolved: Vec<Option<MultivalueOperation>> = vec![None; entries.len()];
    let mut dropped = vec![false; entries.len()];

    // First pass: pair each delete with the first unclaimed untagged entry of the same type.
    for &d in &deletes {
        let partner = (0..entries.len()).find(|&u| {
            !is_delete(&entries[u])
                && resolved[u].is_none()
                && entries[u].get(TYPE_KEY) == entries[d].get(TYPE_KEY)
        });
        match partner {
            Some(u) => {
                resolved[u] = Some(MultivalueOperation::Modify);
                dropped[d] = true;
            }
            None => resolved[d] = Some(MultivalueOperation::Delete),
        }
    }

    // Second pass: whatever is left untagged is new.
    for (i, entry) in entries.iter_mut().enumerate() {
        let op = resolved[i].unwrap_or(MultivalueOperation::Create);
        set_operation(entry, op);
    }

    entries
        .into_iter()
        .zip(dropped)
        .filter_map(|(entry, dropped)| (!dropped).then_some(entry))
        .collect()
}

fn check_unique_types(attribute: &str, entries: &[Value]) -> Result<(), DuplicateTypeError> {
    let mut seen: Vec<&Value> = Vec::new();
    for entry in entries {
        if MultivalueOperation::of(entry) == Some(MultivalueOperation::Delete) {
            continue;
        }
        let Some(type_value) = entry.get(TYPE_KEY) else {
            continue;
        };
        if seen.contains(&type_value) {
            return Err(DuplicateTypeError {
                attribute: attribute.to_string(),
                type_value: match type_value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            });
        }
        seen.push(type_value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test body must be an object"),
        }
    }

    #[test]
    fn test_delete_create_pair_becomes_modify() {
        let merged = merge_multivalue(body(json!({
            "emails": [
                {"type": "work", "value": "A"},
                {"operation": "delete", "type": "work", "value": "B"}
            ]
        })))
        .unwrap();

        assert_eq!(
            merged["emails"],
            json!([{"type": "work", "value": "A", "operation": "modify"}])
        );
    }

    #[test]
    fn test_untagged_entries_become_create() {
        let entries = json!([
            {"type": "work", "value": "a@example.com"},
            {"type": "home", "value": "b@example.com"}
        ]);
        let merged = merge_multivalue(body(json!({"emails": entries.clone()}))).unwrap();

        let mut expected = entries;
        for entry in expected.as_array_mut().unwrap() {
            entry["operation"] = json!("create");
        }
        assert_eq!(merged["emails"], expected);
    }

    #[test]
    fn test_merging_twice_is_stable() {
        let once = merge_multivalue(body(json!({
            "phoneNumbers": [{"type": "mobile", "value": "1"}, {"type": "work", "value": "2"}]
        })))
        .unwrap();
        let twice = merge_multivalue(once.clone()).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_unpaired_delete_is_kept() {
        let merged = merge_multivalue(body(json!({
            "emails": [
                {"operation": "delete", "type": "home", "value": "old@example.com"},
                {"type": "work", "value": "new@example.com"}
            ]
        })))
        .unwrap();

        assert_eq!(
            merged["emails"],
            json!([
                {"operation": "delete", "type": "home", "value": "old@example.com"},
                {"type": "work", "value": "new@example.com", "operation": "create"}
            ])
        );
    }

    #[test]
    fn test_duplicate_untagged_types_rejected() {
        let err = merge_multivalue(body(json!({
            "emails": [
                {"type": "work", "value": "a@example.com"},
                {"type": "work", "value": "b@example.com"}
            ]
        })))
        .unwrap_err();

        assert_eq!(
            err,
            DuplicateTypeError {
                attribute: "emails".into(),
                type_value: "work".into(),
            }
        );
        assert!(err.to_string().contains("\"type\" must be unique"));
    }

    #[test]
    fn test_one_delete_pairs_with_only_one_create() {
        let err = merge_multivalue(body(json!({
            "emails": [
                {"type": "work", "value": "a"},
                {"type": "work", "value": "b"},
                {"operation": "delete", "type": "work", "value": "old"}
            ]
        })))
        .unwrap_err();

        assert_eq!(err.type_value, "work");
    }

    #[test]
    fn test_two_deletes_pair_with_two_creates() {
        let merged = merge_multivalue(body(json!({
            "emails": [
                {"operation": "delete", "type": "work", "value": "old1"},
                {"type": "work", "value": "new1"},
                {"operation": "delete", "type": "work", "value": "old2"}
            ]
        })))
        .unwrap();

        // The second delete finds no free partner and is kept as a removal.
        assert_eq!(
            merged["emails"],
            json!([
                {"type": "work", "value": "new1", "operation": "modify"},
                {"operation": "delete", "type": "work", "value": "old2"}
            ])
        );
    }

    #[test]
    fn test_delete_sharing_type_with_create_is_allowed() {
        // A surviving delete does not count towards type uniqueness.
        let merged = merge_multivalue(body(json!({
            "emails": [
                {"operation": "delete", "type": "work", "value": "old"},
                {"operation": "delete", "type": "work", "value": "older"},
                {"type": "work", "value": "new"}
            ]
        })))
        .unwrap();

        let ops: Vec<_> = merged["emails"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| MultivalueOperation::of(e).unwrap())
            .collect();
        assert_eq!(
            ops,
            vec![MultivalueOperation::Delete, MultivalueOperation::Modify]
        );
    }

    #[test]
    fn test_uniqueness_is_per_attribute() {
        let merged = merge_multivalue(body(json!({
            "emails": [{"type": "work", "value": "a@example.com"}],
            "phoneNumbers": [{"type": "work", "value": "555"}]
        })))
        .unwrap();

        assert_eq!(merged["emails"][0]["operation"], "create");
        assert_eq!(merged["phoneNumbers"][0]["operation"], "create");
    }

    #[test]
    fn test_entries_without_type_are_not_deduplicated() {
        let merged = merge_multivalue(body(json!({
            "groups": [{"value": "g1"}, {"value": "g2"}]
        })))
        .unwrap();

        assert_eq!(merged["groups"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_non_multivalue_keys_untouched() {
        let input = body(json!({
            "userName": "bjensen",
            "name": {"givenName": "Barbara"},
            "active": true,
            "tags": ["a", "b"],
            "empty": []
        }));
        let merged = merge_multivalue(input.clone()).unwrap();

        assert_eq!(merged, input);
    }

    #[test]
    fn test_operation_serde() {
        assert_eq!(
            serde_json::to_value(MultivalueOperation::Modify).unwrap(),
            json!("modify")
        );
        assert_eq!(MultivalueOperation::of(&json!({"operation": "bogus"})), None);
    }
}
