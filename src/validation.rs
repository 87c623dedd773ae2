//! Request body validation against the transaction schema.
//!
//! Every offending field is reported, not just the first one, so callers can
//! fix a payload in a single round trip.

use crate::types::transaction::{feature_names, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Why a single field was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldIssue {
    Missing,
    Extra,
    NotANumber,
    Unparsable,
    NonFinite,
}

impl FieldIssue {
    /// Machine-readable error type
    pub fn kind(&self) -> &'static str {
        match self {
            FieldIssue::Missing => "missing",
            FieldIssue::Extra => "extra_forbidden",
            FieldIssue::NotANumber => "float_type",
            FieldIssue::Unparsable => "float_parsing",
            FieldIssue::NonFinite => "finite_number",
        }
    }

    /// Human-readable message
    pub fn message(&self) -> &'static str {
        match self {
            FieldIssue::Missing => "Field required",
            FieldIssue::Extra => "Extra inputs are not permitted",
            FieldIssue::NotANumber => "Input should be a valid number",
            FieldIssue::Unparsable => {
                "Input should be a valid number, unable to parse string as a number"
            }
            FieldIssue::NonFinite => "Input should be a finite number",
        }
    }
}

/// A single validation failure, located by its path in the request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    fn body(kind: &str, msg: impl Into<String>) -> Self {
        Self {
            loc: vec!["body".to_string()],
            msg: msg.into(),
            kind: kind.to_string(),
        }
    }

    fn field(field: &str, issue: FieldIssue) -> Self {
        Self {
            loc: vec!["body".to_string(), field.to_string()],
            msg: issue.message().to_string(),
            kind: issue.kind().to_string(),
        }
    }

    /// Field name, when the error points at one
    pub fn field_name(&self) -> Option<&str> {
        match self.loc.as_slice() {
            [_, field, ..] => Some(field.as_str()),
            _ => None,
        }
    }
}

/// All problems found in one request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationErrors {
    pub detail: Vec<FieldError>,
}

impl ValidationErrors {
    fn single(error: FieldError) -> Self {
        Self {
            detail: vec![error],
        }
    }

    /// Names of the fields that failed validation
    pub fn fields(&self) -> Vec<&str> {
        self.detail.iter().filter_map(|e| e.field_name()).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .detail
            .iter()
            .map(|e| format!("{}: {}", e.loc.join("."), e.msg))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Coerce a JSON value to a finite `f64`.
///
/// Accepts numbers and numeric strings. Booleans, null, arrays and objects
/// are rejected.
pub fn coerce_float(value: &Value) -> Result<f64, FieldIssue> {
    let number = match value {
        Value::Number(n) => n.as_f64().ok_or(FieldIssue::NotANumber)?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| FieldIssue::Unparsable)?,
        _ => return Err(FieldIssue::NotANumber),
    };

    if number.is_finite() {
        Ok(number)
    } else {
        Err(FieldIssue::NonFinite)
    }
}

/// Check a decoded JSON object against the schema, collecting every issue.
pub fn check_fields(object: &Map<String, Value>) -> Vec<FieldError> {
    let mut errors = Vec::new();

    for name in feature_names() {
        match object.get(name) {
            None => errors.push(FieldError::field(name, FieldIssue::Missing)),
            Some(value) => {
                if let Err(issue) = coerce_float(value) {
                    errors.push(FieldError::field(name, issue));
                }
            }
        }
    }

    for key in object.keys() {
        if !feature_names().any(|name| name == key.as_str()) {
            errors.push(FieldError::field(key, FieldIssue::Extra));
        }
    }

    errors
}

/// Parse and validate a raw request body into a `Transaction`.
pub fn parse_transaction(body: &[u8]) -> Result<Transaction, ValidationErrors> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        ValidationErrors::single(FieldError::body(
            "json_invalid",
            format!("JSON decode error: {}", e),
        ))
    })?;

    let object = match &value {
        Value::Object(object) => object,
        _ => {
            return Err(ValidationErrors::single(FieldError::body(
                "model_attributes_type",
                "Input should be a valid JSON object",
            )))
        }
    };

    let errors = check_fields(object);
    if !errors.is_empty() {
        return Err(ValidationErrors { detail: errors });
    }

    // Every field already passed check_fields, so this decode cannot fail.
    Transaction::deserialize(&value).map_err(|e| {
        ValidationErrors::single(FieldError::body("value_error", e.to_string()))
    })
}
