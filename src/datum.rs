//! Runtime cell values.
//!
//! Source rows arrive as text, but bindings derive richer values (geometry
//! objects, split lists, shifted timestamps, booleans). `Datum` keeps the
//! value's native shape so the typer can pick a literal form when the schema
//! declares nothing for a property.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

/// Format used when a timestamp has to become plain text.
pub const DATETIME_TEXT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const AWARE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// A timestamp parsed from free text, with or without a UTC offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedTimestamp {
    Naive(NaiveDateTime),
    Aware(DateTime<FixedOffset>),
}

impl ParsedTimestamp {
    /// Wall-clock time in UTC for offset-aware values, as written otherwise.
    pub fn to_naive_utc(self) -> NaiveDateTime {
        match self {
            ParsedTimestamp::Naive(dt) => dt,
            ParsedTimestamp::Aware(dt) => dt.naive_utc(),
        }
    }
}

/// Parse the timestamp layouts that show up in tabular exports: RFC 3339,
/// ISO-like with a space or `T`, US month/day/year, and bare dates.
pub fn parse_timestamp(text: &str) -> Option<ParsedTimestamp> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(ParsedTimestamp::Aware(dt));
    }
    for fmt in AWARE_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(ParsedTimestamp::Aware(dt));
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(ParsedTimestamp::Naive(dt));
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(ParsedTimestamp::Naive)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Datum {
    /// Missing or unresolvable value
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
    /// Multi-valued cell; produces one statement per element
    List(Vec<Datum>),
    /// Structured value such as a GeoJSON geometry
    Object(Map<String, Value>),
}

impl Datum {
    /// True for values that must never produce a statement.
    pub fn is_empty(&self) -> bool {
        match self {
            Datum::Null => true,
            Datum::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Datum::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Render the value as bare text, the way it would be concatenated into
    /// another string. `Null` renders as the empty string.
    pub fn to_plain_string(&self) -> String {
        match self {
            Datum::Null => String::new(),
            Datum::Text(s) => s.clone(),
            Datum::Integer(i) => i.to_string(),
            Datum::Decimal(f) => format!("{:?}", f),
            Datum::Boolean(b) => b.to_string(),
            Datum::DateTime(dt) => dt.format(DATETIME_TEXT_FORMAT).to_string(),
            Datum::List(_) | Datum::Object(_) => self.to_json().to_string(),
        }
    }

    /// JSON projection used for hashing and for JSON-text literals.
    pub fn to_json(&self) -> Value {
        match self {
            Datum::Null => Value::Null,
            Datum::Text(s) => Value::String(s.clone()),
            Datum::Integer(i) => Value::from(*i),
            Datum::Decimal(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Datum::Boolean(b) => Value::Bool(*b),
            Datum::DateTime(dt) => Value::String(dt.format(DATETIME_TEXT_FORMAT).to_string()),
            Datum::List(items) => Value::Array(items.iter().map(Datum::to_json).collect()),
            Datum::Object(map) => Value::Object(map.clone()),
        }
    }

    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Datum::Null,
            Value::Bool(b) => Datum::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Datum::Integer(i),
                None => n.as_f64().map(Datum::Decimal).unwrap_or(Datum::Null),
            },
            Value::String(s) => Datum::Text(s),
            Value::Array(items) => Datum::List(items.into_iter().map(Datum::from_json).collect()),
            Value::Object(map) => Datum::Object(map),
        }
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::Text(s.to_string())
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2021, 3, 4)
            .unwrap()
            .and_hms_opt(5, 6, 7)
            .unwrap();
        for text in ["2021-03-04T05:06:07", "2021-03-04 05:06:07", "03/04/2021 05:06:07"] {
            assert_eq!(
                parse_timestamp(text),
                Some(ParsedTimestamp::Naive(expected)),
                "{}",
                text
            );
        }
        assert!(matches!(
            parse_timestamp("2021-03-04T05:06:07+02:00"),
            Some(ParsedTimestamp::Aware(_))
        ));
        assert_eq!(
            parse_timestamp("2021-03-04").map(ParsedTimestamp::to_naive_utc),
            NaiveDate::from_ymd_opt(2021, 3, 4).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp("  "), None);
    }

    #[test]
    fn test_aware_timestamp_converts_to_utc() {
        let parsed = parse_timestamp("2021-03-04T05:00:00+02:00").unwrap();
        assert_eq!(
            parsed.to_naive_utc(),
            NaiveDate::from_ymd_opt(2021, 3, 4)
                .unwrap()
                .and_hms_opt(3, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_empty_values() {
        assert!(Datum::Null.is_empty());
        assert!(Datum::from("").is_empty());
        assert!(!Datum::from(" ").is_empty());
        assert!(!Datum::List(vec![]).is_empty());
        assert!(!Datum::Boolean(false).is_empty());
    }

    #[test]
    fn test_plain_string_forms() {
        assert_eq!(Datum::Integer(7).to_plain_string(), "7");
        assert_eq!(Datum::Decimal(2.0).to_plain_string(), "2.0");
        assert_eq!(Datum::Null.to_plain_string(), "");
        let dt = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(Datum::DateTime(dt).to_plain_string(), "2021-01-01T12:30:00");
    }

    #[test]
    fn test_json_conversion() {
        let value = json!({"type": "Point", "coordinates": [1.5, 2]});
        let datum = Datum::from_json(value.clone());
        assert!(matches!(datum, Datum::Object(_)));
        assert_eq!(datum.to_json(), value);

        assert_eq!(
            Datum::from_json(json!(["a", 3])),
            Datum::List(vec![Datum::from("a"), Datum::Integer(3)])
        );
    }
}
