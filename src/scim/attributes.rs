//! Attribute whitelist validation.
//!
//! Adapters declare which attributes they can store as a list of dotted paths
//! (`name.givenName`, `emails`) and array discriminators
//! (`emails.[].type=work`). A resource is flattened into dotted paths, with
//! array indices as numeric segments, and every path is checked against that
//! list.

use serde_json::Value;

/// Paths under this prefix carry attribute-clearing metadata and are always
/// accepted.
const META_ATTRIBUTES: &str = "meta.attributes";

/// Flatten a JSON tree into `(dotted.path, leaf)` pairs in document order.
///
/// Empty objects and arrays are leaves at their own path.
pub fn flatten(value: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    walk(value, String::new(), &mut out);
    out
}

fn walk<'a>(value: &'a Value, path: String, out: &mut Vec<(String, &'a Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                walk(child, child_path(&path, key), out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                walk(child, child_path(&path, &index.to_string()), out);
            }
        }
        _ if path.is_empty() => {}
        _ => out.push((path, value)),
    }
}

fn child_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{parent}.{segment}")
    }
}

/// Return the flattened keys of `resource` that `whitelist` does not permit.
///
/// An empty result means the resource is acceptable. An empty whitelist
/// permits everything.
///
/// Rules, per flattened key:
/// - `attr.N.type`: permitted if `attr` is whitelisted, or if
///   `attr.[].type=<value>` is, with the resource's value lowercased.
///   Discriminator entries are expected to list their value in lowercase.
/// - `attr.N.field` (any other field): permitted if `attr` is whitelisted or
///   any `attr.[].type=` discriminator is, since the entry's `type` alone
///   decides whether the element is allowed.
/// - anything under `meta.attributes`: always permitted.
/// - anything else: permitted only on an exact match.
pub fn validate_attributes(resource: &Value, whitelist: &[String]) -> Vec<String> {
    if whitelist.is_empty() {
        return Vec::new();
    }

    flatten(resource)
        .into_iter()
        .filter(|(key, leaf)| !is_permitted(key, leaf, whitelist))
        .map(|(key, _)| key)
        .collect()
}

fn is_permitted(key: &str, leaf: &Value, whitelist: &[String]) -> bool {
    if let Some((attr, field)) = array_entry_path(key) {
        if whitelist.iter().any(|w| w == attr) {
            return true;
        }
        let discriminator = format!("{attr}.[].type=");
        return if field == "type" {
            let wanted = format!("{discriminator}{}", scalar_text(leaf).to_lowercase());
            whitelist.iter().any(|w| *w == wanted)
        } else {
            whitelist.iter().any(|w| w.starts_with(&discriminator))
        };
    }

    if key.starts_with(META_ATTRIBUTES) {
        return true;
    }

    whitelist.iter().any(|w| w == key)
}

/// Split `attr.N.field` into `(attr, field)`.
fn array_entry_path(key: &str) -> Option<(&str, &str)> {
    let mut segments = key.split('.');
    let (attr, index, field) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() || index.parse::<usize>().is_err() {
        return None;
    }
    Some((attr, field))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flatten_nested() {
        let resource = json!({
            "userName": "bjensen",
            "name": {"givenName": "Barbara", "familyName": "Jensen"},
            "emails": [{"type": "work", "value": "bjensen@example.com"}],
            "groups": [],
            "extra": {}
        });
        let keys: Vec<String> = flatten(&resource).into_iter().map(|(k, _)| k).collect();

        assert_eq!(
            keys,
            list(&[
                "userName",
                "name.givenName",
                "name.familyName",
                "emails.0.type",
                "emails.0.value",
                "groups",
                "extra",
            ])
        );
    }

    #[test]
    fn test_rejects_unlisted_nested_key() {
        let rejected = validate_attributes(
            &json!({"name": {"givenName": "Jarle", "familyName": "Elshaug"}}),
            &list(&["name.givenName"]),
        );
        assert_eq!(rejected, list(&["name.familyName"]));
    }

    #[test]
    fn test_array_type_discriminator() {
        let whitelist = list(&["emails.[].type=work"]);

        assert!(
            validate_attributes(&json!({"emails": [{"type": "work", "value": "a"}]}), &whitelist)
                .is_empty()
        );
        assert_eq!(
            validate_attributes(&json!({"emails": [{"type": "home", "value": "b"}]}), &whitelist),
            list(&["emails.0.type"])
        );
    }

    #[test]
    fn test_array_type_value_is_lowercased() {
        let rejected = validate_attributes(
            &json!({"emails": [{"type": "Work", "value": "a"}]}),
            &list(&["emails.[].type=work"]),
        );
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_camel_case_array_discriminator() {
        let whitelist = list(&["phoneNumbers.[].type=work"]);

        assert!(
            validate_attributes(
                &json!({"phoneNumbers": [{"type": "work", "value": "555"}]}),
                &whitelist
            )
            .is_empty()
        );
        assert_eq!(
            validate_attributes(
                &json!({"phoneNumbers": [{"type": "Mobile", "value": "556"}]}),
                &whitelist
            ),
            list(&["phoneNumbers.0.type"])
        );
    }

    #[test]
    fn test_whole_array_attribute_listed() {
        let rejected = validate_attributes(
            &json!({"phoneNumbers": [{"type": "mobile", "value": "555"}, {"type": "fax", "value": "556"}]}),
            &list(&["phoneNumbers"]),
        );
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_array_without_any_rule_rejected() {
        let rejected = validate_attributes(
            &json!({"userName": "bjensen", "phoneNumbers": [{"type": "mobile", "value": "555"}]}),
            &list(&["userName"]),
        );
        assert_eq!(
            rejected,
            list(&["phoneNumbers.0.type", "phoneNumbers.0.value"])
        );
    }

    #[test]
    fn test_meta_attributes_always_permitted() {
        let rejected = validate_attributes(
            &json!({"userName": "bjensen", "meta": {"attributes": ["title", "nickName"]}}),
            &list(&["userName"]),
        );
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_empty_whitelist_permits_everything() {
        assert!(validate_attributes(&json!({"anything": {"at": "all"}}), &[]).is_empty());
    }

    #[test]
    fn test_deep_array_paths_need_exact_match() {
        let resource = json!({"x": [{"y": {"z": 1}}]});
        assert_eq!(
            validate_attributes(&resource, &list(&["x"])),
            list(&["x.0.y.z"])
        );
        assert!(validate_attributes(&resource, &list(&["x.0.y.z"])).is_empty());
    }
}
