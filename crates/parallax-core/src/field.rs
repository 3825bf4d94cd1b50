//! Data field references and their resolution against telemetry.
//!
//! A [`DataField`] is either a literal (`const`, optionally a comma-separated
//! list) or a reference into the telemetry snapshot (`field`). References
//! accept three equivalent spellings, tried in this order:
//!
//! ```text
//! [Nav]{PosX}    bracketed series + field
//! Nav.PosX       dotted series + field
//! PosX           bare field, first match across all series
//! ```
//!
//! Resolution always yields a list. Unparsable or non-finite entries are
//! replaced by the caller's default, and a reference that matches nothing
//! yields `[default]`. Nothing is cached: every call reads the snapshot it
//! was given.

use serde::{Deserialize, Serialize};

use crate::telemetry::{Field, TelemetrySnapshot};

/// Where a field's value comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Literal value written into the options.
    #[default]
    Const,
    /// Reference into the telemetry snapshot.
    Field,
}

/// Declarative value binding: a literal or a telemetry reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataField {
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default)]
    pub value: String,
}

impl DataField {
    /// A literal field.
    pub fn constant(value: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::Const,
            value: value.into(),
        }
    }

    /// A telemetry reference.
    pub fn field(reference: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::Field,
            value: reference.into(),
        }
    }

    /// Whether this field is bound to telemetry.
    pub fn is_field(&self) -> bool {
        self.source_type == SourceType::Field
    }
}

/// Parsed form of a telemetry reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef<'a> {
    /// `[series]{field}`
    Bracketed { series: &'a str, field: &'a str },
    /// `series.field`
    Dotted { series: &'a str, field: &'a str },
    /// `field`
    Bare(&'a str),
}

/// Parse a reference string, trying bracketed, dotted, then bare syntax.
pub fn parse_field_ref(reference: &str) -> FieldRef<'_> {
    let reference = reference.trim();

    if let Some(rest) = reference.strip_prefix('[')
        && let Some((series, tail)) = rest.split_once(']')
        && let Some(field) = tail.strip_prefix('{').and_then(|t| t.strip_suffix('}'))
        && !field.is_empty()
    {
        return FieldRef::Bracketed { series, field };
    }

    if let Some((series, field)) = reference.split_once('.')
        && !series.is_empty()
        && !field.is_empty()
    {
        return FieldRef::Dotted { series, field };
    }

    FieldRef::Bare(reference)
}

/// Find the column a reference addresses, if any.
///
/// A dotted reference that names no known series is retried as a bare field
/// name, so field names that themselves contain dots stay addressable.
pub fn lookup_field<'t>(telemetry: &'t TelemetrySnapshot, reference: &str) -> Option<&'t Field> {
    match parse_field_ref(reference) {
        FieldRef::Bracketed { series, field } => find_in_series(telemetry, series, field),
        FieldRef::Dotted { series, field } => find_in_series(telemetry, series, field)
            .or_else(|| find_bare(telemetry, reference.trim())),
        FieldRef::Bare(name) => find_bare(telemetry, name),
    }
}

fn find_in_series<'t>(
    telemetry: &'t TelemetrySnapshot,
    series: &str,
    field: &str,
) -> Option<&'t Field> {
    telemetry
        .series
        .iter()
        .filter(|s| s.answers_to(series))
        .find_map(|s| s.field(field))
}

fn find_bare<'t>(telemetry: &'t TelemetrySnapshot, name: &str) -> Option<&'t Field> {
    telemetry.series.iter().find_map(|s| s.field(name))
}

/// Resolves [`DataField`]s against one telemetry snapshot.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver<'a> {
    telemetry: &'a TelemetrySnapshot,
}

impl<'a> FieldResolver<'a> {
    pub fn new(telemetry: &'a TelemetrySnapshot) -> Self {
        Self { telemetry }
    }

    /// Every value of the field as a number.
    pub fn numeric(&self, field: &DataField, default: f64) -> Vec<f64> {
        match field.source_type {
            SourceType::Const => field
                .value
                .split(',')
                .map(|token| parse_finite(token).unwrap_or(default))
                .collect(),
            SourceType::Field => match lookup_field(self.telemetry, &field.value) {
                Some(column) => column
                    .values
                    .iter()
                    .map(|v| v.as_f64().unwrap_or(default))
                    .collect(),
                None => vec![default],
            },
        }
    }

    /// Every value of the field as trimmed text.
    pub fn text(&self, field: &DataField, default: &str) -> Vec<String> {
        match field.source_type {
            SourceType::Const => field
                .value
                .split(',')
                .map(|token| token.trim().to_string())
                .collect(),
            SourceType::Field => match lookup_field(self.telemetry, &field.value) {
                Some(column) => column
                    .values
                    .iter()
                    .map(|v| v.as_text().unwrap_or_else(|| default.to_string()))
                    .collect(),
                None => vec![default.to_string()],
            },
        }
    }

    /// The most recent numeric value.
    pub fn last_numeric(&self, field: &DataField, default: f64) -> f64 {
        self.numeric(field, default)
            .last()
            .copied()
            .unwrap_or(default)
    }

    /// The most recent text value.
    pub fn last_text(&self, field: &DataField, default: &str) -> String {
        self.text(field, default)
            .pop()
            .unwrap_or_else(|| default.to_string())
    }
}

fn parse_finite(token: &str) -> Option<f64> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
