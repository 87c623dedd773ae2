//! Fraud Scoring API Library
//!
//! Serves a pre-trained card fraud classifier over a single
//! `POST /predict` endpoint.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod types;
pub mod validation;

pub use api::{create_router, AppState};
pub use config::AppConfig;
pub use error::{ApiError, InferenceError};
pub use metrics::ServiceMetrics;
pub use models::{FraudClassifier, OnnxClassifier};
pub use types::{FeatureVector, Prediction, PredictionResponse, Transaction};
