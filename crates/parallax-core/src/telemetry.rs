//! Tabular telemetry snapshot.
//!
//! A snapshot is a list of named series, each holding named value columns.
//! The host replaces the whole snapshot whenever the data source refreshes;
//! nothing here is incremental.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::OptionsError;

/// One cell of a telemetry column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Null,
}

impl FieldValue {
    /// Numeric view of the value. Text is parsed, booleans map to 0/1.
    ///
    /// Returns `None` for nulls, unparsable text, and non-finite numbers.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Null => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Text view of the value. Numbers use Rust's shortest round-trip form.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Number(n) => Some(n.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Text(s) => Some(s.trim().to_string()),
            Self::Null => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A named value column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub values: Vec<FieldValue>,
}

impl Field {
    /// Build a field from anything convertible to [`FieldValue`].
    pub fn new<V: Into<FieldValue>>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A named group of equal-length columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub name: String,
    /// Query identifier assigned by the host, usable in place of `name`.
    #[serde(default)]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Series {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ref_id: None,
            fields: Vec::new(),
        }
    }

    /// Builder-style helper for tests and demos.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = Some(ref_id.into());
        self
    }

    /// Whether a reference naming `series` addresses this series.
    pub fn answers_to(&self, series: &str) -> bool {
        self.name == series || self.ref_id.as_deref() == Some(series)
    }

    /// First non-empty field with the given name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.name == name && !field.is_empty())
    }
}

/// The complete telemetry state delivered by the data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    #[serde(default)]
    pub series: Vec<Series>,
}

impl TelemetrySnapshot {
    pub fn new(series: Vec<Series>) -> Self {
        Self { series }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Parse a snapshot from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a snapshot file.
    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_numeric_views() {
        assert_eq!(FieldValue::Number(2.5).as_f64(), Some(2.5));
        assert_eq!(FieldValue::Text(" 4 ".into()).as_f64(), Some(4.0));
        assert_eq!(FieldValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(FieldValue::Null.as_f64(), None);
        assert_eq!(FieldValue::Text("abc".into()).as_f64(), None);
        assert_eq!(FieldValue::Number(f64::NAN).as_f64(), None);
    }

    #[test]
    fn test_field_value_text_view_drops_trailing_zero() {
        assert_eq!(FieldValue::Number(30.0).as_text().as_deref(), Some("30"));
        assert_eq!(FieldValue::Number(1.5).as_text().as_deref(), Some("1.5"));
    }

    #[test]
    fn test_snapshot_deserializes_mixed_columns() {
        let json = r#"{
            "series": [{
                "name": "Nav",
                "refId": "A",
                "fields": [
                    { "name": "PosX", "values": [1, 2.5, null] },
                    { "name": "Label", "values": ["a", "b", "c"] }
                ]
            }]
        }"#;
        let snapshot = TelemetrySnapshot::from_json(json).unwrap();
        let series = &snapshot.series[0];
        assert!(series.answers_to("Nav"));
        assert!(series.answers_to("A"));
        assert_eq!(series.field("PosX").unwrap().values[2], FieldValue::Null);
        assert_eq!(
            series.field("Label").unwrap().values[1],
            FieldValue::Text("b".into())
        );
    }

    #[test]
    fn test_series_field_skips_empty_columns() {
        let series = Series::new("Nav")
            .with_field(Field::new("PosX", Vec::<f64>::new()))
            .with_field(Field::new("PosX", [7.0]));
        assert_eq!(series.field("PosX").unwrap().values.len(), 1);
    }
}
