//! Recursive normalization of vendor tool-call arguments into plain
//! JSON.
//!
//! Tool-call arguments arrive in one of three shapes depending on
//! vendor: a native JSON object, a JSON-encoded string, or (for a
//! protobuf-backed SDK) a tagged-union `Struct`/`ListValue`/`Value`
//! tree where every scalar is wrapped as `{"string_value": ...}`,
//! `{"number_value": ...}`, etc. [`normalize_arguments`] converts any
//! of the three into the same plain-JSON shape, so nothing downstream
//! of a vendor module ever sees a tagged union or a string that needs
//! a second parse.

use serde_json::{Map, Value};

const TAGGED_UNION_FIELDS: [&str; 6] = [
    "string_value",
    "number_value",
    "bool_value",
    "struct_value",
    "list_value",
    "null_value",
];

/// Recursively converts a value that may contain tagged-union wrapper
/// objects into plain JSON. Primitives pass through unchanged; object
/// and array containers are rebuilt with every value recursively
/// normalized; a single-field object whose key is one of the six
/// tagged-union field names is unwrapped to its native equivalent.
#[must_use]
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        Value::Object(map) => unwrap_tagged(map).unwrap_or_else(|| {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), normalize_value(v));
            }
            Value::Object(out)
        }),
    }
}

fn unwrap_tagged(map: &Map<String, Value>) -> Option<Value> {
    if map.len() != 1 {
        return None;
    }
    let (key, val) = map.iter().next()?;
    if !TAGGED_UNION_FIELDS.contains(&key.as_str()) {
        return None;
    }
    match key.as_str() {
        "null_value" => Some(Value::Null),
        "struct_value" => Some(normalize_struct_value(val)),
        "list_value" => Some(normalize_list_value(val)),
        _ => Some(normalize_value(val)),
    }
}

fn normalize_struct_value(val: &Value) -> Value {
    let fields = val
        .as_object()
        .and_then(|inner| inner.get("fields"))
        .and_then(Value::as_object)
        .unwrap_or_else(|| val.as_object().expect("struct_value carries an object"));
    let mut out = Map::with_capacity(fields.len());
    for (k, v) in fields {
        out.insert(k.clone(), normalize_value(v));
    }
    Value::Object(out)
}

fn normalize_list_value(val: &Value) -> Value {
    let values = val
        .as_object()
        .and_then(|inner| inner.get("values"))
        .and_then(Value::as_array)
        .or_else(|| val.as_array())
        .cloned()
        .unwrap_or_default();
    Value::Array(values.iter().map(normalize_value).collect())
}

/// Normalizes raw tool-call arguments regardless of which of the three
/// vendor shapes they arrived in. A JSON-encoded string is parsed
/// first (falling back to `{"raw": <string>}` if it fails to parse, so
/// a malformed argument string never panics the provider module); any
/// other value is run straight through [`normalize_value`].
#[must_use]
pub fn normalize_arguments(raw: &Value) -> Value {
    match raw {
        Value::String(s) => serde_json::from_str::<Value>(s)
            .map(|v| normalize_value(&v))
            .unwrap_or_else(|_| serde_json::json!({"raw": s})),
        other => normalize_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn native_object_passes_through_normalized() {
        let raw = json!({"host": "db-1", "command": "uptime"});
        assert_eq!(normalize_arguments(&raw), raw);
    }

    #[test]
    fn json_string_is_parsed_and_normalized() {
        let raw = json!(r#"{"host": "db-1", "command": "uptime"}"#);
        assert_eq!(
            normalize_arguments(&raw),
            json!({"host": "db-1", "command": "uptime"})
        );
    }

    #[test]
    fn malformed_json_string_falls_back_to_raw_wrapper() {
        let raw = json!("not json");
        assert_eq!(normalize_arguments(&raw), json!({"raw": "not json"}));
    }

    #[test]
    fn tagged_union_struct_unwraps_recursively() {
        let raw = json!({
            "struct_value": {
                "fields": {
                    "host": {"string_value": "db-1"},
                    "replicas": {"number_value": 3},
                    "dry_run": {"bool_value": false},
                    "tags": {
                        "list_value": {
                            "values": [
                                {"string_value": "a"},
                                {"string_value": "b"}
                            ]
                        }
                    },
                    "note": {"null_value": null}
                }
            }
        });
        let expected = json!({
            "host": "db-1",
            "replicas": 3,
            "dry_run": false,
            "tags": ["a", "b"],
            "note": null
        });
        assert_eq!(normalize_arguments(&raw), expected);
    }

    #[test]
    fn normalization_is_idempotent() {
        let raw = json!({
            "struct_value": {
                "fields": { "command": {"string_value": "ls"} }
            }
        });
        let once = normalize_arguments(&raw);
        let twice = normalize_arguments(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn feeding_normalized_form_back_in_is_a_fixed_point() {
        let native = json!({"hosts": ["a", "b"], "command": "uptime"});
        let as_string = json!(serde_json::to_string(&native).unwrap());
        assert_eq!(
            normalize_arguments(&native),
            normalize_arguments(&as_string)
        );
    }
}
