//! Address enrichment through a Nominatim-compatible geocoding service.
//!
//! Entities whose class is listed in `GEOLOOKUP_CLASSES` are looked up by the
//! address parts their template maps to the well-known location predicates.
//! A confident match contributes normalized address statements and a point
//! geometry; the expander drops any of those for which the row already
//! supplied a value.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::errors::GeocodeError;
use super::typer::{plain_literal, DatumTyper};
use super::Statement;
use crate::datum::Datum;
use crate::vocabulary::Vocabulary;

/// Matches at or below this rank (street level and coarser) are ignored.
pub const MIN_PLACE_RANK: i64 = 20;

pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";

// ===== Predicate names =====

const FULL_TEXT: &str = "locationAddressFullText";
const STREET_NUMBER: &str = "locationStreetNumberText";
const STREET: &str = "locationStreet";
const CITY: &str = "locationCity";
const STATE: &str = "locationState";
const POSTAL_CODE: &str = "locationPostalCode";
const COUNTRY: &str = "locationCountry";
const COUNTY: &str = "locationCounty";
const GEO_POINT: &str = "locationGeoPoint";

/// Nominatim `address` keys and the predicates they populate.
const ADDRESS_FIELDS: &[(&str, &str)] = &[
    ("city", CITY),
    ("country", COUNTRY),
    ("county", COUNTY),
    ("postcode", POSTAL_CODE),
    ("state", STATE),
    ("road", STREET),
    ("house_number", STREET_NUMBER),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressQuery {
    /// Free-text search, used when the row has a full address line
    FreeText(String),
    /// Structured search parameters (`street`, `city`, ...)
    Structured(Vec<(&'static str, String)>),
}

impl AddressQuery {
    /// Build a query from (predicate name, value) pairs. Returns `None` when
    /// none of the pairs name an address part.
    pub fn from_fields(fields: &[(String, String)]) -> Option<Self> {
        let lookup = |name: &str| {
            fields
                .iter()
                .find(|(predicate, value)| predicate == name && !value.trim().is_empty())
                .map(|(_, value)| value.trim().to_string())
        };

        if let Some(full) = lookup(FULL_TEXT) {
            return Some(AddressQuery::FreeText(full));
        }

        let mut params = Vec::new();
        let street = match (lookup(STREET_NUMBER), lookup(STREET)) {
            (Some(number), Some(street)) => Some(format!("{} {}", number, street)),
            (None, Some(street)) => Some(street),
            (Some(number), None) => Some(number),
            (None, None) => None,
        };
        if let Some(street) = street {
            params.push(("street", street));
        }
        for (param, predicate) in [
            ("city", CITY),
            ("state", STATE),
            ("postalcode", POSTAL_CODE),
            ("country", COUNTRY),
        ] {
            if let Some(value) = lookup(predicate) {
                params.push((param, value));
            }
        }

        if params.is_empty() {
            None
        } else {
            Some(AddressQuery::Structured(params))
        }
    }

    pub fn query_pairs(&self) -> Vec<(&str, &str)> {
        match self {
            AddressQuery::FreeText(text) => vec![("q", text.as_str())],
            AddressQuery::Structured(params) => params.iter().map(|(k, v)| (*k, v.as_str())).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub features: Vec<GeocodeFeature>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GeocodeFeature {
    #[serde(default)]
    pub properties: FeatureProperties,
    #[serde(default)]
    pub geometry: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeatureProperties {
    #[serde(default)]
    pub place_rank: i64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub address: Map<String, Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl GeocodeResponse {
    /// The top match, if it is specific enough to trust.
    pub fn confident_match(&self) -> Option<&GeocodeFeature> {
        self.features
            .first()
            .filter(|f| f.properties.error.is_none() && f.properties.place_rank > MIN_PLACE_RANK)
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait Geocoder {
    fn search(&self, query: &AddressQuery) -> Result<GeocodeResponse, GeocodeError>;
}

/// Blocking client for the `/search` endpoint of a Nominatim service.
pub struct NominatimGeocoder {
    search_url: String,
    client: reqwest::blocking::Client,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>) -> Result<Self, GeocodeError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url: String = base_url.into();
        Ok(NominatimGeocoder {
            search_url: format!("{}/search", base_url.trim_end_matches('/')),
            client,
        })
    }
}

impl Geocoder for NominatimGeocoder {
    fn search(&self, query: &AddressQuery) -> Result<GeocodeResponse, GeocodeError> {
        let mut params = vec![("format", "geojson"), ("limit", "1"), ("addressdetails", "1")];
        params.extend(query.query_pairs());

        log::debug!("Geocoding {:?}", query);
        let body: Value = self
            .client
            .get(&self.search_url)
            .query(&params)
            .send()?
            .error_for_status()?
            .json()?;
        serde_json::from_value(body).map_err(|e| GeocodeError::Decode(e.to_string()))
    }
}

/// Statements describing a matched address for `subject`.
pub fn address_statements(
    subject: &str,
    feature: &GeocodeFeature,
    vocabulary: &Vocabulary,
    typer: &DatumTyper<'_>,
) -> Vec<Statement> {
    let mut statements = Vec::new();
    let props = &feature.properties;

    if let Some(name) = &props.display_name {
        statements.push(Statement::new(subject, vocabulary.resource(FULL_TEXT), plain_literal(name)));
    }

    for (key, predicate) in ADDRESS_FIELDS {
        let text = match props.address.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => continue,
        };
        statements.push(Statement::new(subject, vocabulary.resource(predicate), plain_literal(&text)));
    }

    if let Some(geometry) = &feature.geometry {
        match typer.type_datum(GEO_POINT, &Datum::Object(geometry.clone())) {
            Ok(object) => statements.push(Statement::new(subject, vocabulary.resource(GEO_POINT), object)),
            Err(e) => log::warn!("Skipping geocoded geometry: {}", e),
        }
    }

    statements
}
