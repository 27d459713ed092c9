use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::error::DecodeError;

/// Canonical rendering of a tick instant, used as the store sort key.
pub const SORT_KEY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Deserialize a JSON number or numeric string to an exact `Decimal`.
///
/// Numbers go through their shortest textual form, so `150.1` stays `150.1`
/// instead of picking up binary float noise.
pub fn number_to_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    let text = match v {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.trim().to_string(),
        _ => return Err(serde::de::Error::custom("invalid numeric value")),
    };
    parse_decimal(&text).map_err(serde::de::Error::custom)
}

fn parse_decimal(text: &str) -> Result<Decimal, String> {
    if text.contains(['e', 'E']) {
        Decimal::from_scientific(text).map_err(|e| format!("invalid number '{}': {}", text, e))
    } else {
        Decimal::from_str(text).map_err(|e| format!("invalid number '{}': {}", text, e))
    }
}

/// Trimmed, uppercased ticker symbol. Blank symbols are rejected.
pub fn normalize_symbol<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let symbol = raw.trim().to_ascii_uppercase();
    if symbol.is_empty() {
        return Err(serde::de::Error::custom("empty symbol"));
    }
    Ok(symbol)
}

/// Largest volume the store can hold (signed 64-bit column).
pub const MAX_VOLUME: u64 = i64::MAX as u64;

/// Deserialize a non-negative integer volume up to [`MAX_VOLUME`]. Integral
/// floats (`1000.0`) pass.
pub fn number_to_volume<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    let parsed = match &v {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f < MAX_VOLUME as f64)
                .map(|f| f as u64)
        }),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .filter(|n| *n <= MAX_VOLUME);
    parsed.ok_or_else(|| serde::de::Error::custom(format!("invalid volume {}", v)))
}

/// One observation for a symbol, as delivered by the upstream feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTick {
    #[serde(deserialize_with = "normalize_symbol")]
    pub symbol: String,
    /// Timestamp exactly as the producer sent it.
    pub timestamp: String,
    #[serde(deserialize_with = "number_to_decimal")]
    pub open: Decimal,
    #[serde(deserialize_with = "number_to_decimal")]
    pub high: Decimal,
    #[serde(deserialize_with = "number_to_decimal")]
    pub low: Decimal,
    #[serde(deserialize_with = "number_to_decimal")]
    pub price: Decimal,
    #[serde(deserialize_with = "number_to_decimal")]
    pub previous_close: Decimal,
    #[serde(deserialize_with = "number_to_volume")]
    pub volume: u64,
}

impl RawTick {
    pub fn from_value(value: serde_json::Value) -> Result<Self, DecodeError> {
        Ok(serde_json::from_value(value)?)
    }

    /// The timestamp in [`SORT_KEY_FORMAT`], comparable against window thresholds.
    pub fn sort_key(&self) -> Result<String, DecodeError> {
        normalize_timestamp(&self.timestamp)
    }
}

/// Parse the timestamp shapes producers send and render them as a sort key.
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` (both with optional
/// fractional seconds) and RFC 3339 with an offset, which is shifted to UTC.
pub fn normalize_timestamp(raw: &str) -> Result<String, DecodeError> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc).format(SORT_KEY_FORMAT).to_string());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.format(SORT_KEY_FORMAT).to_string());
        }
    }
    Err(DecodeError::Timestamp(raw.to_string()))
}

/// Render an instant as a sort key.
pub fn sort_key_for(at: DateTime<Utc>) -> String {
    at.format(SORT_KEY_FORMAT).to_string()
}
