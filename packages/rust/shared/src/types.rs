//! Domain types shared between the gateway and the resolver.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// ApiKey
// ---------------------------------------------------------------------------

/// Opaque credential for the extraction service. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

// ---------------------------------------------------------------------------
// ExtractionPayload
// ---------------------------------------------------------------------------

/// Untrusted extraction result produced by the language model.
///
/// Every field is optional. Decoding is lenient per field: a value of an
/// unusable type is treated as absent instead of failing the whole payload,
/// so only a non-object document is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionPayload {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub location: Option<String>,
    /// Expected `YYYY-MM-DD`.
    #[serde(default, deserialize_with = "lenient::string")]
    pub start_date: Option<String>,
    /// Expected `YYYY-MM-DD`.
    #[serde(default, deserialize_with = "lenient::string")]
    pub end_date: Option<String>,
    /// Expected 24-hour `HH:MM`.
    #[serde(default, deserialize_with = "lenient::string")]
    pub start_time: Option<String>,
    /// Expected 24-hour `HH:MM`.
    #[serde(default, deserialize_with = "lenient::string")]
    pub end_time: Option<String>,
    /// The model's own all-day assertion. Advisory only.
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub all_day: bool,
    /// Expected in `[0, 1]`, not enforced.
    #[serde(default, deserialize_with = "lenient::number")]
    pub confidence: Option<f64>,
}

impl ExtractionPayload {
    /// Decode the JSON document returned by the model.
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }
}

mod lenient {
    use super::*;

    pub(super) fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub(super) fn boolean<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            Value::String(s) => s.eq_ignore_ascii_case("true"),
            _ => false,
        })
    }

    pub(super) fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        })
    }
}
