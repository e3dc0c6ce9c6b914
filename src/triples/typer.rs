//! Literal typing for data values.
//!
//! A property's declared range (from the [`PropertyTypeIndex`]) decides the
//! literal form when one exists; otherwise the value's own shape does.
//!
//! | Declared range                         | Literal                               |
//! |----------------------------------------|---------------------------------------|
//! | `DateTime`                             | `"..."^^xsd:dateTime`                 |
//! | `Decimal`, `DecimalList`, `DecimalSet` | `"..."^^xsd:double`                   |
//! | `Integer`, `IntegerList`, `IntegerSet` | `"..."^^xsd:integer`                  |
//! | `String`, `StringList`, `StringSet`    | plain `"..."`                         |
//! | `Boolean`                              | `"true"`/`"false"` `^^xsd:boolean`    |
//! | `GeoJSON`                              | compact JSON `^^<ns/GeoJSON>`         |
//! | anything else                          | `"..."^^<ns/Range>`                   |

use chrono::NaiveDateTime;

use super::errors::CoercionError;
use crate::datum::{parse_timestamp, Datum, ParsedTimestamp, DATETIME_TEXT_FORMAT};
use crate::template::PropertyTypeIndex;
use crate::vocabulary::{iri_token, Vocabulary, XSD_NAMESPACE};

const AWARE_TEXT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";

/// Properties whose undeclared ranges are written as untyped JSON text.
const JSON_TEXT_PROPERTY: &str = "metaData";

const TRUE_WORDS: &[&str] = &["true", "1", "yes", "t", "y"];
const FALSE_WORDS: &[&str] = &["false", "0", "no", "f", "n"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclaredType<'t> {
    DateTime,
    Decimal,
    Integer,
    Text,
    Boolean,
    GeoJson,
    Other(&'t str),
}

impl<'t> DeclaredType<'t> {
    fn from_range(range: &'t str) -> Self {
        match range {
            "DateTime" => DeclaredType::DateTime,
            "Decimal" | "DecimalList" | "DecimalSet" => DeclaredType::Decimal,
            "Integer" | "IntegerList" | "IntegerSet" => DeclaredType::Integer,
            "String" | "StringList" | "StringSet" => DeclaredType::Text,
            "Boolean" => DeclaredType::Boolean,
            "GeoJSON" => DeclaredType::GeoJson,
            other => DeclaredType::Other(other),
        }
    }
}

/// Quote and escape text as an N-Triples string literal.
pub fn plain_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

pub fn typed_literal(text: &str, datatype_iri: &str) -> String {
    format!("{}^^{}", plain_literal(text), iri_token(datatype_iri))
}

fn xsd(local: &str) -> String {
    format!("{}{}", XSD_NAMESPACE, local)
}

/// Turns a single (non-list) value into an object token for a property.
#[derive(Debug, Clone, Copy)]
pub struct DatumTyper<'a> {
    types: &'a PropertyTypeIndex,
    vocabulary: &'a Vocabulary,
}

impl<'a> DatumTyper<'a> {
    pub fn new(types: &'a PropertyTypeIndex, vocabulary: &'a Vocabulary) -> Self {
        DatumTyper { types, vocabulary }
    }

    /// Type `value` for `property`. Both a bare property name and a full IRI
    /// inside the vocabulary's namespace are accepted.
    pub fn type_datum(&self, property: &str, value: &Datum) -> Result<String, CoercionError> {
        let property = self.vocabulary.local_name(property);
        match self.types.declared_type(property) {
            Some(range) => self.type_declared(property, range, value),
            None => self.type_native(property, value),
        }
    }

    fn type_declared(&self, property: &str, range: &str, value: &Datum) -> Result<String, CoercionError> {
        let fail = |reason: &str| CoercionError {
            property: property.to_string(),
            value: value.to_plain_string(),
            target: range.to_string(),
            reason: reason.to_string(),
        };

        match DeclaredType::from_range(range) {
            DeclaredType::DateTime => {
                let text = match value {
                    Datum::DateTime(dt) => format_naive(dt),
                    Datum::Text(s) => match parse_timestamp(s) {
                        Some(ParsedTimestamp::Naive(dt)) => format_naive(&dt),
                        Some(ParsedTimestamp::Aware(dt)) => dt.format(AWARE_TEXT_FORMAT).to_string(),
                        None => return Err(fail("unrecognized timestamp")),
                    },
                    _ => return Err(fail("not a timestamp")),
                };
                Ok(typed_literal(&text, &xsd("dateTime")))
            }
            DeclaredType::Decimal => {
                let number = match value {
                    Datum::Decimal(f) => *f,
                    Datum::Integer(i) => *i as f64,
                    Datum::Text(s) => s.trim().parse::<f64>().map_err(|e| fail(&e.to_string()))?,
                    _ => return Err(fail("not a number")),
                };
                double_literal(number).ok_or_else(|| fail("non-finite number"))
            }
            DeclaredType::Integer => {
                let number = match value {
                    Datum::Integer(i) => *i,
                    Datum::Decimal(f) if f.is_finite() => f.trunc() as i64,
                    Datum::Text(s) => s.trim().parse::<i64>().map_err(|e| fail(&e.to_string()))?,
                    _ => return Err(fail("not an integer")),
                };
                Ok(typed_literal(&number.to_string(), &xsd("integer")))
            }
            DeclaredType::Text => match value {
                Datum::Null => Err(fail("no value")),
                other => Ok(plain_literal(&other.to_plain_string())),
            },
            DeclaredType::Boolean => {
                let flag = match value {
                    Datum::Boolean(b) => *b,
                    Datum::Integer(0) => false,
                    Datum::Integer(1) => true,
                    Datum::Text(s) => parse_flag(s).ok_or_else(|| fail("not a boolean word"))?,
                    _ => return Err(fail("not a boolean")),
                };
                Ok(typed_literal(&flag.to_string(), &xsd("boolean")))
            }
            DeclaredType::GeoJson => {
                let geometry = match value {
                    Datum::Object(map) => serde_json::Value::Object(map.clone()),
                    Datum::Text(s) => match serde_json::from_str::<serde_json::Value>(s) {
                        Ok(v @ serde_json::Value::Object(_)) => v,
                        _ => return Err(fail("not a JSON object")),
                    },
                    _ => return Err(fail("not a geometry")),
                };
                Ok(typed_literal(&geometry.to_string(), &self.vocabulary.expand("GeoJSON")))
            }
            DeclaredType::Other(_) if property == JSON_TEXT_PROPERTY => {
                Ok(plain_literal(&value.to_json().to_string()))
            }
            DeclaredType::Other(name) => {
                Ok(typed_literal(&value.to_plain_string(), &self.vocabulary.expand(name)))
            }
        }
    }

    fn type_native(&self, property: &str, value: &Datum) -> Result<String, CoercionError> {
        match value {
            Datum::Text(s) => Ok(plain_literal(s)),
            Datum::Integer(i) => Ok(typed_literal(&i.to_string(), &xsd("integer"))),
            Datum::Decimal(f) => double_literal(*f).ok_or_else(|| CoercionError {
                property: property.to_string(),
                value: value.to_plain_string(),
                target: "double".to_string(),
                reason: "non-finite number".to_string(),
            }),
            Datum::Boolean(b) => Ok(typed_literal(&b.to_string(), &xsd("boolean"))),
            Datum::DateTime(dt) => Ok(typed_literal(&format_naive(dt), &xsd("dateTime"))),
            Datum::Object(map) => Ok(typed_literal(
                &serde_json::Value::Object(map.clone()).to_string(),
                &self.vocabulary.expand("GeoJSON"),
            )),
            Datum::Null | Datum::List(_) => Err(CoercionError {
                property: property.to_string(),
                value: value.to_plain_string(),
                target: "literal".to_string(),
                reason: "value has no single literal form".to_string(),
            }),
        }
    }
}

fn format_naive(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_TEXT_FORMAT).to_string()
}

fn double_literal(number: f64) -> Option<String> {
    number
        .is_finite()
        .then(|| typed_literal(&format!("{:?}", number), &xsd("double")))
}

fn parse_flag(text: &str) -> Option<bool> {
    let word = text.trim().to_ascii_lowercase();
    if TRUE_WORDS.contains(&word.as_str()) {
        Some(true)
    } else if FALSE_WORDS.contains(&word.as_str()) {
        Some(false)
    } else {
        None
    }
}
