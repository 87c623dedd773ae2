//! Transaction feature schema for the fraud classifier.
//!
//! The classifier was trained on 28 PCA components (`V1`..`V28`) plus a
//! scaled transaction amount. `FEATURES` fixes the column order the model
//! expects; every vector handed to the model is assembled from it.

use crate::validation::coerce_float;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Number of model input features
pub const FEATURE_COUNT: usize = 29;

/// A feature column: wire name and accessor on a validated transaction
pub type Feature = (&'static str, fn(&Transaction) -> f64);

/// Model input columns, in training order.
pub static FEATURES: [Feature; FEATURE_COUNT] = [
    ("V1", |t| t.v1),
    ("V2", |t| t.v2),
    ("V3", |t| t.v3),
    ("V4", |t| t.v4),
    ("V5", |t| t.v5),
    ("V6", |t| t.v6),
    ("V7", |t| t.v7),
    ("V8", |t| t.v8),
    ("V9", |t| t.v9),
    ("V10", |t| t.v10),
    ("V11", |t| t.v11),
    ("V12", |t| t.v12),
    ("V13", |t| t.v13),
    ("V14", |t| t.v14),
    ("V15", |t| t.v15),
    ("V16", |t| t.v16),
    ("V17", |t| t.v17),
    ("V18", |t| t.v18),
    ("V19", |t| t.v19),
    ("V20", |t| t.v20),
    ("V21", |t| t.v21),
    ("V22", |t| t.v22),
    ("V23", |t| t.v23),
    ("V24", |t| t.v24),
    ("V25", |t| t.v25),
    ("V26", |t| t.v26),
    ("V27", |t| t.v27),
    ("V28", |t| t.v28),
    ("Scaled_Amount", |t| t.scaled_amount),
];

/// Returns the feature names in model input order.
pub fn feature_names() -> impl Iterator<Item = &'static str> {
    FEATURES.iter().map(|(name, _)| *name)
}

/// A card transaction, already reduced to the model's engineered features.
///
/// Deserialization is strict: unknown keys are rejected and every field is
/// required. Numeric strings such as `"1.5"` are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    #[serde(rename = "V1", deserialize_with = "lenient_f64")]
    pub v1: f64,
    #[serde(rename = "V2", deserialize_with = "lenient_f64")]
    pub v2: f64,
    #[serde(rename = "V3", deserialize_with = "lenient_f64")]
    pub v3: f64,
    #[serde(rename = "V4", deserialize_with = "lenient_f64")]
    pub v4: f64,
    #[serde(rename = "V5", deserialize_with = "lenient_f64")]
    pub v5: f64,
    #[serde(rename = "V6", deserialize_with = "lenient_f64")]
    pub v6: f64,
    #[serde(rename = "V7", deserialize_with = "lenient_f64")]
    pub v7: f64,
    #[serde(rename = "V8", deserialize_with = "lenient_f64")]
    pub v8: f64,
    #[serde(rename = "V9", deserialize_with = "lenient_f64")]
    pub v9: f64,
    #[serde(rename = "V10", deserialize_with = "lenient_f64")]
    pub v10: f64,
    #[serde(rename = "V11", deserialize_with = "lenient_f64")]
    pub v11: f64,
    #[serde(rename = "V12", deserialize_with = "lenient_f64")]
    pub v12: f64,
    #[serde(rename = "V13", deserialize_with = "lenient_f64")]
    pub v13: f64,
    #[serde(rename = "V14", deserialize_with = "lenient_f64")]
    pub v14: f64,
    #[serde(rename = "V15", deserialize_with = "lenient_f64")]
    pub v15: f64,
    #[serde(rename = "V16", deserialize_with = "lenient_f64")]
    pub v16: f64,
    #[serde(rename = "V17", deserialize_with = "lenient_f64")]
    pub v17: f64,
    #[serde(rename = "V18", deserialize_with = "lenient_f64")]
    pub v18: f64,
    #[serde(rename = "V19", deserialize_with = "lenient_f64")]
    pub v19: f64,
    #[serde(rename = "V20", deserialize_with = "lenient_f64")]
    pub v20: f64,
    #[serde(rename = "V21", deserialize_with = "lenient_f64")]
    pub v21: f64,
    #[serde(rename = "V22", deserialize_with = "lenient_f64")]
    pub v22: f64,
    #[serde(rename = "V23", deserialize_with = "lenient_f64")]
    pub v23: f64,
    #[serde(rename = "V24", deserialize_with = "lenient_f64")]
    pub v24: f64,
    #[serde(rename = "V25", deserialize_with = "lenient_f64")]
    pub v25: f64,
    #[serde(rename = "V26", deserialize_with = "lenient_f64")]
    pub v26: f64,
    #[serde(rename = "V27", deserialize_with = "lenient_f64")]
    pub v27: f64,
    #[serde(rename = "V28", deserialize_with = "lenient_f64")]
    pub v28: f64,
    #[serde(rename = "Scaled_Amount", deserialize_with = "lenient_f64")]
    pub scaled_amount: f64,
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    coerce_float(&value).map_err(|issue| D::Error::custom(issue.message()))
}

impl Transaction {
    /// Assemble the model input vector in training order.
    pub fn feature_vector(&self) -> FeatureVector {
        let mut values = [0.0; FEATURE_COUNT];
        for (slot, (_, extract)) in values.iter_mut().zip(FEATURES.iter()) {
            *slot = extract(self);
        }
        FeatureVector(values)
    }
}

/// Ordered model input, exactly `FEATURE_COUNT` values long.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn zeros() -> Self {
        Self([0.0; FEATURE_COUNT])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Values narrowed to `f32`, the input dtype of the exported model.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.0.iter().map(|&v| v as f32).collect()
    }

    pub fn len(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_order_matches_training() {
        let names: Vec<&str> = feature_names().collect();
        assert_eq!(names.len(), FEATURE_COUNT);
        assert_eq!(names[0], "V1");
        assert_eq!(names[27], "V28");
        assert_eq!(names[28], "Scaled_Amount");
    }

    #[test]
    fn test_feature_vector_order() {
        let tx = Transaction {
            v1: 1.0,
            v2: 2.0,
            v14: -14.0,
            v28: 28.0,
            scaled_amount: 0.75,
            ..Default::default()
        };

        let vector = tx.feature_vector();
        let values = vector.as_slice();

        assert_eq!(values.len(), FEATURE_COUNT);
        assert_eq!(values[0], 1.0);
        assert_eq!(values[1], 2.0);
        assert_eq!(values[13], -14.0);
        assert_eq!(values[27], 28.0);
        assert_eq!(values[28], 0.75);
    }

    #[test]
    fn test_deserialize_accepts_numeric_strings() {
        let mut body = serde_json::Map::new();
        for name in feature_names() {
            body.insert(name.to_string(), json!(0.5));
        }
        body.insert("V3".to_string(), json!("-1.25"));

        let tx: Transaction = serde_json::from_value(Value::Object(body)).unwrap();
        assert_eq!(tx.v3, -1.25);
        assert_eq!(tx.scaled_amount, 0.5);
    }

    #[test]
    fn test_deserialize_rejects_unknown_field() {
        let mut body = serde_json::Map::new();
        for name in feature_names() {
            body.insert(name.to_string(), json!(0.0));
        }
        body.insert("Amount".to_string(), json!(12.5));

        let result: Result<Transaction, _> = serde_json::from_value(Value::Object(body));
        assert!(result.is_err());
    }

    #[test]
    fn test_to_f32_vec() {
        let vector = FeatureVector::new([0.25; FEATURE_COUNT]);
        let narrowed = vector.to_f32_vec();
        assert_eq!(narrowed.len(), FEATURE_COUNT);
        assert!(narrowed.iter().all(|&v| v == 0.25_f32));
    }
}
