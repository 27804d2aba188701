//! Lenient field decoders for provisioner JSON.
//!
//! The backend writes numeric form values sometimes as JSON strings ("4")
//! and sometimes as numbers (4), and leaves optional fields out or `null`.
//! These helpers normalise all of that into plain strings and integers so the
//! rest of the crate only deals with one representation.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Render a scalar JSON value the way the form displays it.
///
/// Strings pass through, numbers and booleans use their JSON text, `null`
/// becomes the empty string. Arrays and objects have no form representation
/// and also map to the empty string.
#[must_use]
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Deserialize a string field that may arrive as a number or `null`.
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(scalar_to_string).unwrap_or_default())
}

/// Deserialize a list of strings whose items may be numbers.
pub fn string_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(value
        .unwrap_or_default()
        .iter()
        .map(scalar_to_string)
        .collect())
}

/// Deserialize a Unix timestamp given as a number, a numeric string or `null`.
///
/// Fractional seconds are truncated; anything unparseable decodes as 0.
pub fn unix_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(0)
        }
        _ => 0,
    })
}

/// Deserialize a `[min, max]` pair, filling missing bounds with `"0"`.
pub fn min_max<'de, D>(deserializer: D) -> Result<[String; 2], D::Error>
where
    D: Deserializer<'de>,
{
    let items = string_vec(deserializer)?;
    let bound = |i: usize| {
        items
            .get(i)
            .filter(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| "0".to_string())
    };
    Ok([bound(0), bound(1)])
}
