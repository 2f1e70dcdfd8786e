//! Property CRUD over `/api/properties`.
//!
//! Reads are lenient: numeric fields accept numbers or numeric strings,
//! `features` accepts an array or a comma-separated string, and anything
//! unusable reads as absent. Writes carry the session's user id when one
//! is known.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::unwrap_data;
use crate::form::parse_features;
use crate::gateway::{Gateway, GatewayError, RequestOptions};

const COLLECTION: &str = "/api/properties";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Residential,
    Commercial,
    Land,
}

impl PropertyType {
    pub const ALL: [Self; 3] = [Self::Residential, Self::Commercial, Self::Land];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Residential => "residential",
            Self::Commercial => "commercial",
            Self::Land => "land",
        }
    }

    /// Human-readable name for select options and listings.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Residential => "Residential",
            Self::Commercial => "Commercial",
            Self::Land => "Land",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown property type: {0}")]
pub struct UnknownPropertyType(pub String);

impl FromStr for PropertyType {
    type Err = UnknownPropertyType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownPropertyType(s.to_owned()))
    }
}

/// A property record as the API returns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub property_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_features")]
    pub features: Vec<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub taxes: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub income: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub expenditure: Option<f64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub user_id: Option<i64>,
}

/// Write payload for create and update. Absent values serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertyInput {
    pub property_type: Option<PropertyType>,
    pub features: Vec<String>,
    pub price: Option<f64>,
    pub taxes: Option<f64>,
    pub income: Option<f64>,
    pub expenditure: Option<f64>,
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    })
}

fn lenient_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_features<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
                _ => None,
            })
            .collect(),
        Value::String(s) => parse_features(&s),
        _ => Vec::new(),
    })
}

// =============================================================================
// CALLS
// =============================================================================

/// `GET /api/properties`. Accepts a bare array or `{ "data": [...] }`;
/// any other shape is an empty list. Records without an id are skipped.
///
/// # Errors
///
/// Returns the gateway error for failed calls.
pub async fn list(gateway: &Gateway) -> Result<Vec<Property>, GatewayError> {
    let body = gateway.request(COLLECTION, RequestOptions::get()).await?;
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let total = items.len();
    let properties: Vec<Property> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if properties.len() < total {
        tracing::warn!(skipped = total - properties.len(), "skipped unreadable property records");
    }
    Ok(properties)
}

/// `GET /api/properties/:id`.
///
/// # Errors
///
/// Returns the gateway error, or [`GatewayError::Decode`] when the body is
/// not a property.
pub async fn get(gateway: &Gateway, id: i64) -> Result<Property, GatewayError> {
    let body = gateway.request(&member(id), RequestOptions::get()).await?;
    Ok(serde_json::from_value(unwrap_data(body))?)
}

/// `POST /api/properties`.
///
/// # Errors
///
/// Same as [`get`].
pub async fn create(gateway: &Gateway, input: &PropertyInput) -> Result<Property, GatewayError> {
    let payload = write_payload(gateway, input)?;
    let body = gateway.request(COLLECTION, RequestOptions::post(payload)).await?;
    let property: Property = serde_json::from_value(unwrap_data(body))?;
    tracing::info!(id = property.id, "property created");
    Ok(property)
}

/// `PUT /api/properties/:id`.
///
/// # Errors
///
/// Same as [`get`].
pub async fn update(gateway: &Gateway, id: i64, input: &PropertyInput) -> Result<Property, GatewayError> {
    let payload = write_payload(gateway, input)?;
    let body = gateway.request(&member(id), RequestOptions::put(payload)).await?;
    let property: Property = serde_json::from_value(unwrap_data(body))?;
    tracing::info!(id, "property updated");
    Ok(property)
}

/// `DELETE /api/properties/:id`. The response body is ignored.
///
/// # Errors
///
/// Returns the gateway error for failed calls.
pub async fn delete(gateway: &Gateway, id: i64) -> Result<(), GatewayError> {
    gateway.request(&member(id), RequestOptions::delete()).await?;
    tracing::info!(id, "property deleted");
    Ok(())
}

fn member(id: i64) -> String {
    format!("{COLLECTION}/{id}")
}

fn write_payload(gateway: &Gateway, input: &PropertyInput) -> Result<Value, GatewayError> {
    let mut payload = serde_json::to_value(input)?;
    if let (Some(user_id), Value::Object(map)) = (gateway.session().user_id(), &mut payload) {
        map.insert("user_id".into(), Value::from(user_id));
    }
    Ok(payload)
}

#[cfg(test)]
#[path = "property_test.rs"]
mod tests;
