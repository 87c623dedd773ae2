//! Fraud classifier abstraction and the ONNX-backed implementation

pub mod inference;
pub mod loader;

pub use inference::OnnxClassifier;
pub use loader::{LoadedModel, ModelLoader};

use crate::error::InferenceError;
use crate::types::{FeatureVector, Prediction};

/// A trained binary fraud classifier.
///
/// Implementations are read-only after construction and are shared across
/// concurrent requests.
pub trait FraudClassifier: Send + Sync {
    /// Score one ordered feature vector.
    fn predict(&self, features: &FeatureVector) -> Result<Prediction, InferenceError>;

    /// Short name for logs
    fn name(&self) -> &str {
        "classifier"
    }
}
