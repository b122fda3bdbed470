//! Wire model of an upstream feature collection.
//!
//! Only the parts the sync reads are modelled. Geometry is kept as raw JSON
//! so one malformed feature does not invalidate the whole snapshot.

use std::fmt;

use greenway_core::Attributes;
use serde::{Deserialize, Serialize};

/// A full snapshot of one feature class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSnapshot {
    /// Features in upstream order.
    pub features: Vec<SourceFeature>,
}

/// One upstream feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceFeature {
    /// Upstream identifier, when present.
    #[serde(default)]
    pub id: Option<SourceId>,
    /// Raw geometry object.
    #[serde(default)]
    pub geometry: Option<serde_json::Value>,
    /// Attribute bag.
    #[serde(default)]
    pub properties: Option<Attributes>,
}

/// Identifier as sent upstream; ArcGIS emits numeric object ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceId {
    /// String identifier.
    Text(String),
    /// Numeric identifier.
    Number(serde_json::Number),
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write_number(f, number),
        }
    }
}

/// Largest magnitude at which every integer is exactly representable in `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Render integral numbers without a fraction so `42` and `42.0` share a key.
fn write_number(f: &mut fmt::Formatter<'_>, number: &serde_json::Number) -> fmt::Result {
    if let Some(value) = number.as_u64() {
        return write!(f, "{value}");
    }
    if let Some(value) = number.as_i64() {
        return write!(f, "{value}");
    }
    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER => {
            // Adding zero folds `-0.0` into `0`.
            write!(f, "{:.0}", value + 0.0)
        }
        _ => write!(f, "{number}"),
    }
}

/// Error document returned by ArcGIS with a success status.
#[derive(Debug, Deserialize)]
pub(super) struct ServiceFault {
    #[serde(default)]
    pub(super) code: i64,
    #[serde(default)]
    pub(super) message: String,
}

/// Body of a query response: a feature collection or an error document.
#[derive(Debug, Deserialize)]
pub(super) struct QueryResponse {
    #[serde(default)]
    pub(super) features: Option<Vec<SourceFeature>>,
    #[serde(default)]
    pub(super) error: Option<ServiceFault>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(17), Some("17"))]
    #[case(json!(42.0), Some("42"))]
    #[case(json!(-3.0), Some("-3"))]
    #[case(json!(2.5), Some("2.5"))]
    #[case(json!("A-4"), Some("A-4"))]
    #[case(json!(null), None)]
    fn numeric_and_text_ids_are_accepted(
        #[case] id: serde_json::Value,
        #[case] expected: Option<&str>,
    ) {
        let feature: SourceFeature = serde_json::from_value(json!({
            "type": "Feature", "id": id, "geometry": null, "properties": {}
        }))
        .expect("parse feature");
        assert_eq!(
            feature.id.as_ref().map(ToString::to_string).as_deref(),
            expected
        );
    }

    #[rstest]
    fn integral_float_ids_share_a_key_with_integers() {
        let whole: SourceId = serde_json::from_value(json!(42)).expect("integer id");
        let float: SourceId = serde_json::from_value(json!(42.0)).expect("float id");
        assert_eq!(whole.to_string(), float.to_string());
    }

    #[rstest]
    fn malformed_geometry_does_not_fail_the_snapshot() {
        let snapshot: SourceSnapshot = serde_json::from_value(json!({
            "features": [{"id": 1, "geometry": {"type": "Circle"}, "properties": {"a": 1}}]
        }))
        .expect("parse snapshot");
        assert_eq!(
            snapshot.features.first().and_then(|f| f.geometry.clone()),
            Some(json!({"type": "Circle"}))
        );
    }

    #[rstest]
    fn error_documents_are_recognised() {
        let response: QueryResponse = serde_json::from_value(json!({
            "error": {"code": 400, "message": "Invalid query", "details": []}
        }))
        .expect("parse error document");
        assert!(response.features.is_none());
        let fault = response.error.expect("fault");
        assert_eq!((fault.code, fault.message.as_str()), (400, "Invalid query"));
    }
}
