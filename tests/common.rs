// Shared helpers for tests/main.rs's scenario modules.

use serde_json_bytes::{ByteString, Map as JsonMap, Value as JsonValue};

pub fn jstr(s: &str) -> JsonValue {
    JsonValue::String(s.into())
}

pub fn jobj(pairs: Vec<(&str, JsonValue)>) -> JsonValue {
    let mut map = JsonMap::new();
    for (key, value) in pairs {
        map.insert(ByteString::from(key), value);
    }
    JsonValue::Object(map)
}

pub fn parse(source: &str, name: &str) -> apollo_compiler::validation::Valid<apollo_compiler::Schema> {
    graphql_stitch::config::parse_schema(source, name).expect("schema should parse and validate")
}
