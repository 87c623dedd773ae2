//! ONNX Runtime inference for the fraud classifier

use crate::config::ModelConfig;
use crate::error::InferenceError;
use crate::models::loader::{LoadedModel, ModelLoader};
use crate::models::FraudClassifier;
use crate::types::{FeatureVector, Prediction};
use anyhow::Result;
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Classifier backed by an ONNX export of the trained ensemble.
///
/// The session needs exclusive access while running, so it sits behind a
/// mutex. The graph itself is never modified after load.
pub struct OnnxClassifier {
    model: Mutex<LoadedModel>,
    name: String,
    input_name: String,
    output_name: String,
}

impl OnnxClassifier {
    /// Load the classifier described by the model configuration
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(config.onnx_threads);
        let model = loader.load_model(&config.path)?;
        Ok(Self::from_loaded(model))
    }

    /// Wrap an already loaded model
    pub fn from_loaded(model: LoadedModel) -> Self {
        info!(model = %model.name, "Classifier ready");
        Self {
            name: model.name.clone(),
            input_name: model.input_name.clone(),
            output_name: model.output_name.clone(),
            model: Mutex::new(model),
        }
    }

    /// Input tensor name
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Probability output name
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Lock the session, recovering it if an earlier inference panicked.
    ///
    /// A run leaves no partial state in the session, so a poisoned lock is
    /// still safe to use.
    fn session(&self) -> MutexGuard<'_, LoadedModel> {
        self.model.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!(model = %self.name, "Model lock poisoned by an earlier panic; recovering");
            poisoned.into_inner()
        })
    }
}

impl FraudClassifier for OnnxClassifier {
    fn predict(&self, features: &FeatureVector) -> Result<Prediction, InferenceError> {
        let mut model = self.session();
        let probabilities = run_model(&mut model, features)?;
        let prediction = Prediction::from_class_probabilities(probabilities)?;

        debug!(
            model = %self.name,
            label = prediction.label,
            fraud_probability = prediction.fraud_probability,
            "Inference complete"
        );

        Ok(prediction)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Run the model on one feature vector, returning `[p_legitimate, p_fraud]`
fn run_model(model: &mut LoadedModel, features: &FeatureVector) -> Result<[f64; 2], InferenceError> {
    use ort::value::Tensor;

    // Prepare input tensor - shape [1, num_features]
    let shape = vec![1_i64, features.len() as i64];
    let input_tensor = Tensor::from_array((shape, features.to_f32_vec()))
        .map_err(|e| InferenceError::Runtime(format!("Failed to create input tensor: {}", e)))?;

    let outputs = model
        .session
        .run(ort::inputs![model.input_name.as_str() => input_tensor])
        .map_err(|e| InferenceError::Runtime(e.to_string()))?;

    extract_probabilities(&outputs, &model.output_name)
}

/// Extract class probabilities from the session outputs.
///
/// Handles both tensor outputs and seq(map) outputs (ZipMap exports).
fn extract_probabilities(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
) -> Result<[f64; 2], InferenceError> {
    let output = outputs.get(output_name).ok_or_else(|| {
        InferenceError::MalformedOutput(format!("missing output '{}'", output_name))
    })?;

    if let Ok(tensor) = output.try_extract_tensor::<f32>() {
        let (shape, data) = tensor;
        let dims: Vec<i64> = shape.iter().copied().collect();
        return probabilities_from_tensor(&dims, data);
    }

    let dtype = output.dtype();
    if DynSequenceValueType::can_downcast(&dtype) {
        return probabilities_from_sequence_map(output);
    }

    Err(InferenceError::MalformedOutput(format!(
        "output '{}' is neither a float tensor nor seq(map)",
        output_name
    )))
}

/// Extract probabilities from seq(map(int64, float)) format
fn probabilities_from_sequence_map(
    output: &ort::value::DynValue,
) -> Result<[f64; 2], InferenceError> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| InferenceError::MalformedOutput(format!("not a sequence: {}", e)))?;

    let maps = sequence
        .try_extract_sequence::<DynMapValueType>(&allocator)
        .map_err(|e| InferenceError::MalformedOutput(e.to_string()))?;

    // Batch size is always 1
    let map_value = maps
        .first()
        .ok_or_else(|| InferenceError::MalformedOutput("empty sequence".to_string()))?;

    let kv_pairs = map_value
        .try_extract_key_values::<i64, f32>()
        .map_err(|e| InferenceError::MalformedOutput(e.to_string()))?;

    let pairs: Vec<(i64, f64)> = kv_pairs
        .iter()
        .map(|(class_id, prob)| (*class_id, *prob as f64))
        .collect();

    probabilities_from_pairs(&pairs)
}

/// Two-class probabilities from a `[batch, classes]` or `[classes]` tensor.
fn probabilities_from_tensor(dims: &[i64], data: &[f32]) -> Result<[f64; 2], InferenceError> {
    let classes = match dims {
        [1, classes] | [classes] => *classes,
        _ => {
            return Err(InferenceError::MalformedOutput(format!(
                "unexpected probability shape {:?}",
                dims
            )))
        }
    };

    match (classes, data) {
        (2, [legitimate, fraud, ..]) => Ok([*legitimate as f64, *fraud as f64]),
        // Single column holds the positive class
        (1, [fraud, ..]) => Ok([1.0 - *fraud as f64, *fraud as f64]),
        _ => Err(InferenceError::MalformedOutput(format!(
            "expected 2 classes, got shape {:?}",
            dims
        ))),
    }
}

/// Two-class probabilities from `(class_id, probability)` pairs.
fn probabilities_from_pairs(pairs: &[(i64, f64)]) -> Result<[f64; 2], InferenceError> {
    let lookup = |class: i64| pairs.iter().find(|(id, _)| *id == class).map(|(_, p)| *p);

    match (lookup(0), lookup(1)) {
        (Some(legitimate), Some(fraud)) => Ok([legitimate, fraud]),
        (None, Some(fraud)) => Ok([1.0 - fraud, fraud]),
        (Some(legitimate), None) => Ok([legitimate, 1.0 - legitimate]),
        (None, None) => Err(InferenceError::MalformedOutput(
            "no probability for class 0 or 1".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FEATURE_COUNT;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    fn load_fixture(name: &str) -> OnnxClassifier {
        OnnxClassifier::load(&ModelConfig {
            path: fixture(name),
            onnx_threads: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_zero_vector_splits_evenly() {
        let classifier = load_fixture("linear29.onnx");

        let probabilities = run_model(&mut classifier.session(), &FeatureVector::zeros()).unwrap();
        assert_eq!(probabilities, [0.5, 0.5]);

        let prediction = classifier.predict(&FeatureVector::zeros()).unwrap();
        assert_eq!(prediction.label, 0);
        assert_eq!(prediction.fraud_probability, 0.5);
    }

    #[test]
    fn test_tensor_output_argmax() {
        let classifier = load_fixture("linear29.onnx");
        assert_eq!(classifier.input_name(), "float_input");
        assert_eq!(classifier.output_name(), "probabilities");

        let fraud = classifier
            .predict(&FeatureVector::new([0.1; FEATURE_COUNT]))
            .unwrap();
        assert_eq!(fraud.label, 1);
        assert!(fraud.fraud_probability > 0.9);

        let legit = classifier
            .predict(&FeatureVector::new([-0.1; FEATURE_COUNT]))
            .unwrap();
        assert_eq!(legit.label, 0);
        assert!(legit.fraud_probability < 0.1);
    }

    #[test]
    fn test_zipmap_output_argmax() {
        let classifier = load_fixture("linear29_zipmap.onnx");
        assert_eq!(classifier.output_name(), "output_probability");

        let even = classifier.predict(&FeatureVector::zeros()).unwrap();
        assert_eq!(even.label, 0);
        assert!((even.fraud_probability - 0.5).abs() < 1e-6);

        let fraud = classifier
            .predict(&FeatureVector::new([0.1; FEATURE_COUNT]))
            .unwrap();
        assert_eq!(fraud.label, 1);
        assert!(fraud.fraud_probability > 0.9);
    }

    #[test]
    fn test_wrong_width_model_rejected_at_load() {
        let result = OnnxClassifier::load(&ModelConfig {
            path: fixture("linear30.onnx"),
            onnx_threads: 1,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_recovers_after_panic_while_locked() {
        let classifier = Arc::new(load_fixture("linear29.onnx"));

        let holder = Arc::clone(&classifier);
        let outcome = std::thread::spawn(move || {
            let _session = holder.model.lock().unwrap();
            panic!("inference panicked while holding the session");
        })
        .join();
        assert!(outcome.is_err());
        assert!(classifier.model.is_poisoned());

        let prediction = classifier.predict(&FeatureVector::zeros()).unwrap();
        assert_eq!(prediction.label, 0);
        assert_eq!(prediction.fraud_probability, 0.5);

        let prediction = classifier
            .predict(&FeatureVector::new([0.1; FEATURE_COUNT]))
            .unwrap();
        assert_eq!(prediction.label, 1);
    }

    #[test]
    fn test_tensor_two_classes() {
        let probs = probabilities_from_tensor(&[1, 2], &[0.75, 0.25]).unwrap();
        assert_eq!(probs, [0.75, 0.25]);

        let probs = probabilities_from_tensor(&[2], &[0.5, 0.5]).unwrap();
        assert_eq!(probs, [0.5, 0.5]);
    }

    #[test]
    fn test_tensor_single_column() {
        let probs = probabilities_from_tensor(&[1, 1], &[0.25]).unwrap();
        assert_eq!(probs, [0.75, 0.25]);
    }

    #[test]
    fn test_tensor_bad_shape() {
        assert!(probabilities_from_tensor(&[1, 3], &[0.2, 0.3, 0.5]).is_err());
        assert!(probabilities_from_tensor(&[4, 2], &[0.5; 8]).is_err());
        assert!(probabilities_from_tensor(&[1, 2], &[0.5]).is_err());
    }

    #[test]
    fn test_pairs() {
        assert_eq!(
            probabilities_from_pairs(&[(0, 0.875), (1, 0.125)]).unwrap(),
            [0.875, 0.125]
        );
        assert_eq!(
            probabilities_from_pairs(&[(1, 0.25)]).unwrap(),
            [0.75, 0.25]
        );
        assert!(probabilities_from_pairs(&[(2, 0.9)]).is_err());
    }

    #[test]
    fn test_probabilities_feed_argmax() {
        let probs = probabilities_from_pairs(&[(0, 0.125), (1, 0.875)]).unwrap();
        let prediction = Prediction::from_class_probabilities(probs).unwrap();
        assert!(prediction.is_fraud());
        assert_eq!(prediction.fraud_probability, 0.875);
    }
}
