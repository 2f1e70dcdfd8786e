//! Property form helpers: raw text fields to API payload and back, plus the
//! display formatting used by listings.

use crate::gateway::FieldErrors;
use crate::services::property::{Property, PropertyInput, PropertyType};

const EMPTY_DISPLAY: &str = "—";

/// Split a comma-separated feature list, trimming and dropping blanks.
#[must_use]
pub fn parse_features(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[must_use]
pub fn format_features(features: &[String]) -> String {
    features.join(", ")
}

/// Features for a listing cell; an empty list shows a dash.
#[must_use]
pub fn display_features(features: &[String]) -> String {
    if features.is_empty() {
        EMPTY_DISPLAY.to_owned()
    } else {
        format_features(features)
    }
}

/// `$1,234.56`, or a dash when there is no value.
#[must_use]
pub fn format_money(value: Option<f64>) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return EMPTY_DISPLAY.to_owned();
    };
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}

/// First message for `field`, as shown under its input.
#[must_use]
pub fn first_error<'a>(errors: &'a FieldErrors, field: &str) -> Option<&'a str> {
    errors.get(field)?.first().map(String::as_str)
}

/// The text a user enters on the create and edit pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyForm {
    pub property_type: String,
    pub features: String,
    pub price: String,
    pub taxes: String,
    pub income: String,
    pub expenditure: String,
}

impl PropertyForm {
    /// Initial values for editing an existing record.
    #[must_use]
    pub fn from_property(property: &Property) -> Self {
        let number = |v: Option<f64>| v.map(|n| n.to_string()).unwrap_or_default();
        Self {
            property_type: property.property_type.clone().unwrap_or_default(),
            features: format_features(&property.features),
            price: number(property.price),
            taxes: number(property.taxes),
            income: number(property.income),
            expenditure: number(property.expenditure),
        }
    }

    /// Build the API payload. Empty fields become `null`.
    ///
    /// # Errors
    ///
    /// Returns every invalid field with one message each: an unknown type,
    /// a non-numeric amount, or a negative amount.
    pub fn to_input(&self) -> Result<PropertyInput, FieldErrors> {
        let mut errors = FieldErrors::new();

        let property_type = match self.property_type.trim() {
            "" => None,
            raw => {
                if let Ok(parsed) = raw.parse::<PropertyType>() {
                    Some(parsed)
                } else {
                    errors.insert("property_type".into(), vec!["must be one of residential, commercial, land".into()]);
                    None
                }
            }
        };

        let mut amount = |field: &str, raw: &str| match parse_amount(raw) {
            Ok(v) => v,
            Err(message) => {
                errors.insert(field.to_owned(), vec![message.to_owned()]);
                None
            }
        };
        let price = amount("price", &self.price);
        let taxes = amount("taxes", &self.taxes);
        let income = amount("income", &self.income);
        let expenditure = amount("expenditure", &self.expenditure);

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(PropertyInput {
            property_type,
            features: parse_features(&self.features),
            price,
            taxes,
            income,
            expenditure,
        })
    }
}

fn parse_amount(raw: &str) -> Result<Option<f64>, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(n) if !n.is_finite() => Err("must be a number"),
        Ok(n) if n < 0.0 => Err("must be at least 0"),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err("must be a number"),
    }
}

#[cfg(test)]
#[path = "form_test.rs"]
mod tests;
