//! Type definitions for the fraud scoring API

pub mod prediction;
pub mod transaction;

pub use prediction::{Prediction, PredictionResponse};
pub use transaction::{FeatureVector, Transaction, FEATURES, FEATURE_COUNT};
