//! Lenient field deserializers.
//!
//! Servers speaking this protocol are loose with scalar types: cursor
//! coordinates arrive as numbers or numeric strings, stop flags as booleans
//! or `0`/`1`. A single odd field must not make a whole message unreadable.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Number, numeric string, or null. Anything else reads as `None`.
pub(crate) fn coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Same as [`coordinate`] but defaults to `0.0`.
pub(crate) fn number_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    coordinate(deserializer).map(|v| v.unwrap_or(0.0))
}

/// Only a JSON boolean is a boolean; other kinds read as `None`.
pub(crate) fn strict_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        _ => None,
    })
}

/// Only a JSON string is a string; other kinds read as `None`.
pub(crate) fn strict_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// `true`/`false` or a number (non-zero is `true`).
pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}

/// A participant reference: either the bare session id or an object with `id`.
pub(crate) fn participant_ref<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Object(map)) => map.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    })
}

/// Any number, rounded to the nearest integer. Anything else reads as `0`.
pub(crate) fn rounded<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    coordinate(deserializer).map(|v| {
        v.filter(|v| v.is_finite())
            .map_or(0, |v| v.round() as i64)
    })
}

/// Same as [`rounded`], clamped to the `u32` range.
pub(crate) fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    rounded(deserializer).map(|v| v.clamp(0, i64::from(u32::MAX)) as u32)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Counters {
        #[serde(default, deserialize_with = "super::rounded")]
        delay: i64,
        #[serde(default, deserialize_with = "super::count")]
        count: u32,
    }

    fn parse(json: &str) -> Counters {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_float_integers_are_rounded() {
        // テスト項目: 小数で届いた整数フィールドは四捨五入して読み取れる
        // given (前提条件):
        let json = r#"{"delay":12.5,"count":2.0}"#;

        // when (操作):
        let counters = parse(json);

        // then (期待する結果):
        assert_eq!(counters.delay, 13);
        assert_eq!(counters.count, 2);
    }

    #[test]
    fn test_odd_integer_values_fall_back() {
        // テスト項目: 負の数は 0 に、数値以外は 0 として読み取れる
        // given (前提条件):
        let negative = r#"{"delay":-3.4,"count":-1}"#;
        let garbage = r#"{"delay":true,"count":"many"}"#;

        // when (操作):
        let negative = parse(negative);
        let garbage = parse(garbage);

        // then (期待する結果):
        assert_eq!(negative.delay, -3);
        assert_eq!(negative.count, 0);
        assert_eq!(garbage.delay, 0);
        assert_eq!(garbage.count, 0);
    }
}
