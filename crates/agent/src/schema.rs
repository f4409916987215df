use serde_json::{Map, Value};

/// Schema keys the Gemini function-declaration validator rejects.
pub const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &[
    "additional_properties",
    "additionalProperties",
    "unevaluatedProperties",
    "$schema",
    "$ref",
    "definitions",
    "examples",
    "default",
];

pub fn is_unsupported_key(key: &str) -> bool {
    UNSUPPORTED_SCHEMA_KEYS.contains(&key)
}

/// Returns a copy of `schema` with every unsupported key removed at any depth.
///
/// Objects and arrays are rebuilt recursively; scalars are cloned as-is. Surviving
/// keys keep their original relative order.
pub fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .iter()
                .filter(|(key, _)| !is_unsupported_key(key))
                .map(|(key, value)| (key.clone(), sanitize_schema(value)))
                .collect();
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        scalar => scalar.clone(),
    }
}
