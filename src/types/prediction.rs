//! Classifier output and its wire representation

use crate::error::InferenceError;
use serde::Serialize;

/// Negative class: legitimate transaction
pub const LEGITIMATE: u8 = 0;
/// Positive class: fraudulent transaction
pub const FRAUD: u8 = 1;

/// Decimal places kept in `fraud_probability`
pub const PROBABILITY_DECIMALS: i32 = 4;

/// Result of scoring one transaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Predicted class (0 = legitimate, 1 = fraud)
    pub label: u8,
    /// Probability assigned to the fraud class (0.0 - 1.0)
    pub fraud_probability: f64,
}

impl Prediction {
    /// Build a prediction, rejecting labels outside {0, 1} and probabilities
    /// outside [0, 1].
    pub fn new(label: u8, fraud_probability: f64) -> Result<Self, InferenceError> {
        if label != LEGITIMATE && label != FRAUD {
            return Err(InferenceError::InvalidLabel(label));
        }
        if !(0.0..=1.0).contains(&fraud_probability) {
            return Err(InferenceError::InvalidProbability(fraud_probability));
        }
        Ok(Self {
            label,
            fraud_probability,
        })
    }

    /// Argmax over a two-class distribution `[p_legitimate, p_fraud]`.
    ///
    /// Ties resolve to the legitimate class.
    pub fn from_class_probabilities(probabilities: [f64; 2]) -> Result<Self, InferenceError> {
        let [legitimate, fraud] = probabilities;
        if !legitimate.is_finite() {
            return Err(InferenceError::InvalidProbability(legitimate));
        }
        let label = if fraud > legitimate { FRAUD } else { LEGITIMATE };
        Self::new(label, fraud)
    }

    pub fn is_fraud(&self) -> bool {
        self.label == FRAUD
    }
}

/// JSON body returned by `POST /predict`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub prediction: u8,
    pub fraud_probability: f64,
}

impl From<Prediction> for PredictionResponse {
    fn from(prediction: Prediction) -> Self {
        Self {
            prediction: prediction.label,
            fraud_probability: round_probability(prediction.fraud_probability),
        }
    }
}

/// Round a probability to `PROBABILITY_DECIMALS` places.
pub fn round_probability(probability: f64) -> f64 {
    let scale = 10f64.powi(PROBABILITY_DECIMALS);
    (probability * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_probability() {
        assert_eq!(round_probability(0.0123), 0.0123);
        assert_eq!(round_probability(0.123456), 0.1235);
        assert_eq!(round_probability(0.99996), 1.0);
        assert_eq!(round_probability(0.0), 0.0);
        assert_eq!(round_probability(1.0), 1.0);
    }

    #[test]
    fn test_argmax() {
        let fraud = Prediction::from_class_probabilities([0.2, 0.8]).unwrap();
        assert_eq!(fraud.label, FRAUD);
        assert!(fraud.is_fraud());
        assert_eq!(fraud.fraud_probability, 0.8);

        let legit = Prediction::from_class_probabilities([0.97, 0.03]).unwrap();
        assert_eq!(legit.label, LEGITIMATE);

        let tie = Prediction::from_class_probabilities([0.5, 0.5]).unwrap();
        assert_eq!(tie.label, LEGITIMATE);
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(Prediction::new(2, 0.5).is_err());
        assert!(Prediction::new(1, 1.2).is_err());
        assert!(Prediction::new(0, -0.1).is_err());
        assert!(Prediction::new(0, f64::NAN).is_err());
        assert!(Prediction::from_class_probabilities([f64::NAN, 0.4]).is_err());
    }

    #[test]
    fn test_response_serialization() {
        let prediction = Prediction::new(0, 0.0123).unwrap();
        let json = serde_json::to_string(&PredictionResponse::from(prediction)).unwrap();
        assert_eq!(json, r#"{"prediction":0,"fraud_probability":0.0123}"#);
    }
}
