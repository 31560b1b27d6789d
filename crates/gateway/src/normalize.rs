//! Tolerant field extraction from loosely typed JSON objects.
//!
//! Upstream payloads rename and re-nest fields between platform versions.
//! These helpers take a list of aliases, match keys case-insensitively, and
//! optionally look one level down into container objects such as `data`.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use wolt_types::{Result, WoltError};

/// The untyped object every response decodes into.
pub type Payload = Map<String, Value>;

/// Finds `key` in `map`, preferring an exact match over a case-insensitive one.
#[must_use]
pub fn lookup<'a>(map: &'a Payload, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// First alias holding a non-blank string (numbers are stringified).
#[must_use]
pub fn string_field(map: &Payload, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|alias| lookup(map, alias))
        .find_map(as_non_blank_string)
}

/// First alias holding an integer, a float (truncated) or a numeric string.
#[must_use]
pub fn int_field(map: &Payload, aliases: &[&str]) -> Option<i64> {
    aliases
        .iter()
        .filter_map(|alias| lookup(map, alias))
        .find_map(as_int)
}

/// [`string_field`] at the top level, then inside each of `containers`.
#[must_use]
pub fn string_field_nested(map: &Payload, aliases: &[&str], containers: &[&str]) -> Option<String> {
    string_field(map, aliases).or_else(|| {
        nested_objects(map, containers).find_map(|inner| string_field(inner, aliases))
    })
}

/// [`int_field`] at the top level, then inside each of `containers`.
#[must_use]
pub fn int_field_nested(map: &Payload, aliases: &[&str], containers: &[&str]) -> Option<i64> {
    int_field(map, aliases)
        .or_else(|| nested_objects(map, containers).find_map(|inner| int_field(inner, aliases)))
}

fn nested_objects<'a>(
    map: &'a Payload,
    containers: &'a [&'a str],
) -> impl Iterator<Item = &'a Payload> + 'a {
    containers
        .iter()
        .filter_map(move |c| lookup(map, c))
        .filter_map(Value::as_object)
}

fn as_non_blank_string(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

#[allow(clippy::cast_possible_truncation)]
fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

/// Canonical form of an identifier that may be a string, a number or a
/// Mongo-style `{"$oid": "..."}` object: trimmed and lowercased.
#[must_use]
pub fn normalize_id(v: &Value) -> Option<String> {
    let raw = match v {
        Value::Object(o) => string_field(o, &["$oid", "id"])?,
        other => as_non_blank_string(other)?,
    };
    Some(raw.to_ascii_lowercase())
}

/// Decodes a payload (or any JSON value) into a typed shape.
///
/// # Errors
///
/// Returns [`WoltError::Shape`] naming `what` when the value does not fit `T`.
pub fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| WoltError::Shape(format!("{what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Payload {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let m = obj(json!({"AccessToken": "a"}));
        assert_eq!(lookup(&m, "accesstoken"), Some(&json!("a")));
        assert_eq!(lookup(&m, "missing"), None);
    }

    #[test]
    fn test_lookup_prefers_exact_key() {
        let m = obj(json!({"Token": "upper", "token": "lower"}));
        assert_eq!(lookup(&m, "token"), Some(&json!("lower")));
    }

    #[test]
    fn test_string_field_skips_blank_alias() {
        let m = obj(json!({"access_token": "  ", "accessToken": "T"}));
        assert_eq!(
            string_field(&m, &["access_token", "accessToken"]).as_deref(),
            Some("T")
        );
    }

    #[test]
    fn test_string_field_stringifies_numbers() {
        let m = obj(json!({"id": 42}));
        assert_eq!(string_field(&m, &["id"]).as_deref(), Some("42"));
        assert_eq!(string_field(&obj(json!({"id": null})), &["id"]), None);
    }

    #[test]
    fn test_int_field_variants() {
        assert_eq!(int_field(&obj(json!({"n": 1800})), &["n"]), Some(1800));
        assert_eq!(int_field(&obj(json!({"n": 1800.9})), &["n"]), Some(1800));
        assert_eq!(int_field(&obj(json!({"n": " 60 "})), &["n"]), Some(60));
        assert_eq!(int_field(&obj(json!({"n": "soon"})), &["n"]), None);
    }

    #[test]
    fn test_nested_fallback() {
        let m = obj(json!({"data": {"accessToken": "T", "expiresIn": "900"}}));
        assert_eq!(
            string_field_nested(&m, &["access_token", "accessToken"], &["data"]).as_deref(),
            Some("T")
        );
        assert_eq!(int_field_nested(&m, &["expires_in", "expiresIn"], &["data"]), Some(900));
    }

    #[test]
    fn test_top_level_wins_over_nested() {
        let m = obj(json!({"token": "top", "data": {"token": "inner"}}));
        assert_eq!(
            string_field_nested(&m, &["token"], &["data"]).as_deref(),
            Some("top")
        );
    }

    #[test]
    fn test_normalize_id_shapes() {
        assert_eq!(normalize_id(&json!(" ABC123 ")).as_deref(), Some("abc123"));
        assert_eq!(normalize_id(&json!({"$oid": "5F1A"})).as_deref(), Some("5f1a"));
        assert_eq!(normalize_id(&json!(7)).as_deref(), Some("7"));
        assert_eq!(normalize_id(&Value::Null), None);
    }

    #[test]
    fn test_decode_shape_error() {
        let err = decode::<Vec<String>>(json!({"a": 1}), "sections").unwrap_err();
        assert!(matches!(err, WoltError::Shape(ref m) if m.starts_with("sections")));
    }
}
