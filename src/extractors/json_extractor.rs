//! JSON field extraction

use serde_json::Value;

use crate::json_path::{JsonPath, Step};

/// Extract the field addressed by `path` from a JSON document
///
/// Fails only when `text` is not JSON. A missing key, an out-of-range index
/// or a step into the wrong kind of value gives `Ok(None)`.
pub fn extract_json(text: &str, path: &JsonPath) -> Result<Option<String>, serde_json::Error> {
    let data: Value = serde_json::from_str(text)?;
    Ok(navigate(&data, path).map(value_to_string))
}

/// Walk the parsed document step by step
pub fn navigate<'a>(value: &'a Value, path: &JsonPath) -> Option<&'a Value> {
    let mut current = value;

    for step in path.steps() {
        current = match step {
            Step::Key(key) => match current.get(key.as_str()) {
                Some(next) => next,
                None => {
                    tracing::warn!(key = %key, path = %path, "key not found in JSON document");
                    return None;
                }
            },
            Step::Index(index) => match current.as_array() {
                Some(items) if *index < items.len() => &items[*index],
                Some(items) => {
                    tracing::warn!(
                        index,
                        len = items.len(),
                        path = %path,
                        "JSON array index out of range"
                    );
                    return None;
                }
                None => {
                    tracing::warn!(index, path = %path, "JSON value is not an array");
                    return None;
                }
            },
        };
    }

    Some(current)
}

/// Strings render without quotes, everything else as compact JSON
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}
