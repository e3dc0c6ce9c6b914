//! Binding functions: named transforms that derive a new column from a row.
//!
//! A template declares bindings as `{"FUNCTION": name, "DATA": {...}}`. The name is
//! looked up once, at template load, in a static registry; an unknown name or a
//! `DATA` block that does not fit the function is a configuration error.
//! Evaluation itself never fails: malformed or missing cell values produce
//! [`Datum::Null`].

pub mod geometry;

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, TimeDelta};
use regex::Regex;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::datum::{parse_timestamp, Datum};
use crate::row::RowFrame;
use crate::utils::content_uuid;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BindingError {
    #[error("Binding function `{function}` not found (declared by binding `{binding}`)")]
    UnknownFunction { binding: String, function: String },
    #[error("Invalid DATA for binding `{binding}` ({function}): {message}")]
    InvalidData {
        binding: String,
        function: String,
        message: String,
    },
}

/// Axis order of a combined coordinate column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateOrder {
    LatLon,
    LonLat,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LatLonColumns {
    pub latitude: String,
    pub longitude: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombinedPoint {
    pub column: String,
    pub order: CoordinateOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferPolygon {
    pub column: String,
    pub order: CoordinateOrder,
    /// Distance from center to each vertex, in metres
    pub radius: f64,
    pub vertices: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HashedIdentifier {
    pub identifier: String,
    pub salt: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JoinColumns {
    pub columns: Vec<String>,
    pub delimiter: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SplitParams {
    pub column: String,
    pub delimiter: String,
    /// Element to keep; negative values count from the end
    #[serde(default)]
    pub index: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EqualsParams {
    pub column: String,
    #[serde(rename = "True")]
    pub true_value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplaceParams {
    pub column: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTransform {
    Proper,
    Upper,
    Lower,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConcatParams {
    pub column_a: String,
    pub column_b: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OffsetParams {
    pub date_col: String,
    /// Signed shift in seconds
    #[serde(deserialize_with = "number_or_text")]
    pub offset: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectTemplateParams {
    pub obj: Map<String, Value>,
    /// Object key → source column, in declaration order
    pub map: Vec<(String, String)>,
}

/// A resolved binding, one variant per function in the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    PointFromLatLon(LatLonColumns),
    PointFromCombined(CombinedPoint),
    BufferFromCombined(BufferPolygon),
    DeterministicUuid(HashedIdentifier),
    Echo(Value),
    CombineColumns(JoinColumns),
    Split(SplitParams),
    TernaryBool(EqualsParams),
    Replace(ReplaceParams),
    Case { column: String, transform: CaseTransform },
    Concatenate(ConcatParams),
    OffsetDate(OffsetParams),
    UnixTimestamp { date_col: String },
    ObjectTemplate(ObjectTemplateParams),
}

type BindingParser = fn(Value) -> Result<Binding, serde_json::Error>;

lazy_static::lazy_static! {
    static ref BINDING_REGISTRY: HashMap<&'static str, BindingParser> = {
        let mut m: HashMap<&'static str, BindingParser> = HashMap::new();

        // ===== GEOMETRY =====
        m.insert("GeoJSONFromLatLon", |data| Ok(Binding::PointFromLatLon(params(data)?)));
        m.insert("GeoJSONFromCombinedLatLon", |data| {
            let p: LatLonColumn = params(data)?;
            Ok(Binding::PointFromCombined(CombinedPoint { column: p.lat_lon, order: CoordinateOrder::LatLon }))
        });
        m.insert("GeoJSONFromCombinedLonLat", |data| {
            let p: LonLatColumn = params(data)?;
            Ok(Binding::PointFromCombined(CombinedPoint { column: p.lon_lat, order: CoordinateOrder::LonLat }))
        });
        m.insert("GeoJSONHexFromCombinedLatLon", |data| {
            let p: LatLonBuffer = params(data)?;
            buffer(p.lat_lon, CoordinateOrder::LatLon, p.radius, p.vertices)
        });
        m.insert("GeoJSONHexFromCombinedLonLat", |data| {
            let p: LonLatBuffer = params(data)?;
            buffer(p.lon_lat, CoordinateOrder::LonLat, p.radius, p.vertices)
        });

        // ===== IDENTIFIERS AND LITERALS =====
        m.insert("DeterministicUUID", |data| Ok(Binding::DeterministicUuid(params(data)?)));
        m.insert("Echo", |data| {
            let p: EchoParams = params(data)?;
            Ok(Binding::Echo(p.echostring))
        });

        // ===== STRING FUNCTIONS =====
        m.insert("CombineColumns", |data| Ok(Binding::CombineColumns(params(data)?)));
        m.insert("SplitColumn", |data| {
            let p: SplitParams = params(data)?;
            Ok(Binding::Split(SplitParams { index: None, ..p }))
        });
        m.insert("SplitIndex", |data| {
            let p: SplitParams = params(data)?;
            if p.index.is_none() {
                return Err(serde_json::Error::missing_field("Index"));
            }
            Ok(Binding::Split(p))
        });
        m.insert("TernaryBool", |data| Ok(Binding::TernaryBool(params(data)?)));
        m.insert("Replace", |data| Ok(Binding::Replace(params(data)?)));
        m.insert("ProperCase", |data| case(data, CaseTransform::Proper));
        m.insert("UpCase", |data| case(data, CaseTransform::Upper));
        m.insert("DownCase", |data| case(data, CaseTransform::Lower));
        m.insert("Concatenate", |data| Ok(Binding::Concatenate(params(data)?)));

        // ===== DATETIME FUNCTIONS =====
        m.insert("OffsetDate", |data| Ok(Binding::OffsetDate(params(data)?)));
        m.insert("UnixTimestamp", |data| {
            let p: DateColumn = params(data)?;
            Ok(Binding::UnixTimestamp { date_col: p.date_col })
        });

        // ===== OBJECTS =====
        m.insert("ObjectTemplate", |data| {
            let p: RawObjectTemplate = params(data)?;
            let map = p
                .map
                .into_iter()
                .map(|(key, column)| match column {
                    Value::String(column) => Ok((key, column)),
                    other => Err(serde_json::Error::custom(format!(
                        "Map entry `{}` must name a column, found {}",
                        key, other
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Binding::ObjectTemplate(ObjectTemplateParams { obj: p.obj, map }))
        });

        m
    };

    static ref COORDINATE_SEPARATOR: Regex = Regex::new(r"[\s,]+").expect("valid regex");
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LatLonColumn {
    lat_lon: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LonLatColumn {
    lon_lat: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LatLonBuffer {
    lat_lon: String,
    #[serde(deserialize_with = "number_or_text")]
    radius: f64,
    #[serde(default = "default_vertices")]
    vertices: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LonLatBuffer {
    lon_lat: String,
    #[serde(deserialize_with = "number_or_text")]
    radius: f64,
    #[serde(default = "default_vertices")]
    vertices: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EchoParams {
    echostring: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ColumnParam {
    column: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DateColumn {
    date_col: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawObjectTemplate {
    #[serde(default)]
    obj: Map<String, Value>,
    map: Map<String, Value>,
}

fn default_vertices() -> usize {
    6
}

fn params<T: DeserializeOwned>(data: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(data)
}

fn buffer(
    column: String,
    order: CoordinateOrder,
    radius: f64,
    vertices: usize,
) -> Result<Binding, serde_json::Error> {
    if vertices < 3 {
        return Err(serde_json::Error::custom("Vertices must be at least 3"));
    }
    if !radius.is_finite() || radius <= 0.0 {
        return Err(serde_json::Error::custom("Radius must be a positive number"));
    }
    Ok(Binding::BufferFromCombined(BufferPolygon {
        column,
        order,
        radius,
        vertices,
    }))
}

fn case(data: Value, transform: CaseTransform) -> Result<Binding, serde_json::Error> {
    let p: ColumnParam = params(data)?;
    Ok(Binding::Case {
        column: p.column,
        transform,
    })
}

fn number_or_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(D::Error::custom),
    }
}

/// Names of every registered binding function.
pub fn registered_functions() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = BINDING_REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

impl Binding {
    /// Resolve a declared binding against the registry.
    pub fn resolve(binding: &str, function: &str, data: Value) -> Result<Binding, BindingError> {
        let parser = BINDING_REGISTRY
            .get(function)
            .ok_or_else(|| BindingError::UnknownFunction {
                binding: binding.to_string(),
                function: function.to_string(),
            })?;
        parser(data).map_err(|e| BindingError::InvalidData {
            binding: binding.to_string(),
            function: function.to_string(),
            message: e.to_string(),
        })
    }

    /// Compute the binding's value for the current row.
    pub fn evaluate(&self, frame: &RowFrame<'_>) -> Datum {
        self.try_evaluate(frame).unwrap_or(Datum::Null)
    }

    fn try_evaluate(&self, frame: &RowFrame<'_>) -> Option<Datum> {
        match self {
            Binding::PointFromLatLon(p) => {
                let lat = coordinate(&column_text(frame, &p.latitude)?)?;
                let lon = coordinate(&column_text(frame, &p.longitude)?)?;
                Some(Datum::Object(geometry::point(lon, lat)))
            }
            Binding::PointFromCombined(p) => {
                let (lat, lon) = combined_coordinates(&column_text(frame, &p.column)?, p.order)?;
                Some(Datum::Object(geometry::point(lon, lat)))
            }
            Binding::BufferFromCombined(p) => {
                let (lat, lon) = combined_coordinates(&column_text(frame, &p.column)?, p.order)?;
                let ring = geometry::buffer_ring(lat, lon, p.vertices, p.radius);
                Some(Datum::Object(geometry::polygon(ring)))
            }
            Binding::DeterministicUuid(p) => {
                let identifier = column_text(frame, &p.identifier)?;
                Some(Datum::Text(content_uuid(format!("{}{}", identifier, p.salt))))
            }
            Binding::Echo(value) => Some(Datum::from_json(value.clone())),
            Binding::CombineColumns(p) => {
                let parts = p
                    .columns
                    .iter()
                    .map(|c| column_text(frame, c))
                    .collect::<Option<Vec<_>>>()?;
                Some(Datum::Text(parts.join(&p.delimiter)))
            }
            Binding::Split(p) => {
                if p.delimiter.is_empty() {
                    return None;
                }
                let text = column_text(frame, &p.column)?;
                let parts: Vec<&str> = text.split(p.delimiter.as_str()).collect();
                match p.index {
                    None => Some(Datum::List(parts.into_iter().map(Datum::from).collect())),
                    Some(index) => {
                        let len = parts.len() as i64;
                        let position = if index < 0 { len + index } else { index };
                        if position < 0 || position >= len {
                            return None;
                        }
                        Some(Datum::from(parts[position as usize]))
                    }
                }
            }
            Binding::TernaryBool(p) => {
                let text = column_text(frame, &p.column)?;
                Some(Datum::Boolean(text == p.true_value))
            }
            Binding::Replace(p) => {
                let text = column_text(frame, &p.column)?;
                Some(Datum::Text(text.replace(&p.key, &p.value)))
            }
            Binding::Case { column, transform } => {
                let text = column_text(frame, column)?;
                match transform {
                    CaseTransform::Upper => Some(Datum::Text(text.to_uppercase())),
                    CaseTransform::Lower => Some(Datum::Text(text.to_lowercase())),
                    CaseTransform::Proper => {
                        let lower = text.to_lowercase();
                        let mut chars = lower.chars();
                        let first = chars.next()?;
                        Some(Datum::Text(first.to_uppercase().chain(chars).collect()))
                    }
                }
            }
            Binding::Concatenate(p) => {
                let a = column_text(frame, &p.column_a)?;
                let b = column_text(frame, &p.column_b)?;
                Some(Datum::Text(a + &b))
            }
            Binding::OffsetDate(p) => {
                let start = match frame.get(&p.date_col)? {
                    Datum::DateTime(dt) => *dt,
                    other => parse_timestamp(other.as_text()?)?.to_naive_utc(),
                };
                let millis = (p.offset * 1000.0).round();
                if !millis.is_finite() {
                    return None;
                }
                let delta = TimeDelta::try_milliseconds(millis as i64)?;
                start.checked_add_signed(delta).map(Datum::DateTime)
            }
            Binding::UnixTimestamp { date_col } => {
                let seconds: i64 = column_text(frame, date_col)?.trim().parse().ok()?;
                let dt: NaiveDateTime = DateTime::from_timestamp(seconds, 0)?.naive_utc();
                Some(Datum::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
            }
            Binding::ObjectTemplate(p) => {
                let mut obj = p.obj.clone();
                for (key, column) in &p.map {
                    let value = frame.get(column)?;
                    obj.insert(key.clone(), value.to_json());
                }
                Some(Datum::Object(obj))
            }
        }
    }
}

/// Text view of a column for string-oriented bindings. Missing columns and
/// nulls are absent; collections and objects are not text.
fn column_text(frame: &RowFrame<'_>, name: &str) -> Option<String> {
    match frame.get(name)? {
        Datum::Null | Datum::List(_) | Datum::Object(_) => None,
        other => Some(other.to_plain_string()),
    }
}

fn coordinate(text: &str) -> Option<f64> {
    let value: f64 = text.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Parse `"(a, b)"`, `"[a b]"` or `"a,b"` into `(lat, lon)`.
fn combined_coordinates(text: &str, order: CoordinateOrder) -> Option<(f64, f64)> {
    let trimmed = text.trim().trim_matches(|c| matches!(c, '(' | ')' | '[' | ']'));
    let parts: Vec<&str> = COORDINATE_SEPARATOR
        .split(trimmed.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 2 {
        return None;
    }
    let first = coordinate(parts[0])?;
    let second = coordinate(parts[1])?;
    match order {
        CoordinateOrder::LatLon => Some((first, second)),
        CoordinateOrder::LonLat => Some((second, first)),
    }
}
