//! ONNX model loader

use crate::types::FEATURE_COUNT;
use anyhow::{bail, Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::tensor::TensorElementType;
use ort::value::ValueType;
use std::path::Path;
use tracing::{info, warn};

/// Loaded ONNX model with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the model
    pub input_name: String,
    /// Output name for probabilities
    pub output_name: String,
}

/// Loader for the classifier artifact
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load the classifier from an ONNX file.
    ///
    /// Fails when the file is missing, is not a valid ONNX graph, does not
    /// take a single float `[batch, FEATURE_COUNT]` input, or has no float
    /// tensor / seq(map) probability output.
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> Result<LoadedModel> {
        let path = path.as_ref();

        if !path.is_file() {
            bail!("Model artifact not found at {}", path.display());
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        if session.inputs.len() != 1 {
            bail!(
                "Model {} declares {} inputs, expected a single [1, {}] tensor",
                name,
                session.inputs.len(),
                FEATURE_COUNT
            );
        }
        let input = &session.inputs[0];
        check_input_type(&input.input_type)
            .with_context(|| format!("Model {} has an incompatible input '{}'", name, input.name))?;
        let input_name = input.name.clone();

        let output_name = select_probability_output(session.outputs.iter().map(|o| o.name.as_str()))
            .with_context(|| format!("Model {} has no outputs", name))?;
        if let Some(output) = session.outputs.iter().find(|o| o.name == output_name) {
            check_output_type(&output.output_type).with_context(|| {
                format!("Model {} has an incompatible output '{}'", name, output_name)
            })?;
        }

        if session.outputs.len() == 1 {
            warn!(model = %name, output = %output_name, "Model exposes a single output; treating it as class probabilities");
        }

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name,
            session,
            input_name,
            output_name,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn check_input_type(value_type: &ValueType) -> Result<()> {
    match value_type {
        ValueType::Tensor { ty, shape, .. } => {
            let dims: Vec<i64> = shape.iter().copied().collect();
            check_input_tensor(*ty, &dims)
        }
        other => bail!("expected a float tensor input, found {:?}", other),
    }
}

/// The input must be `f32 [batch, FEATURE_COUNT]`; dynamic dimensions
/// (reported as -1) are accepted.
pub fn check_input_tensor(ty: TensorElementType, dims: &[i64]) -> Result<()> {
    if ty != TensorElementType::Float32 {
        bail!("input element type is {:?}, expected Float32", ty);
    }
    match dims {
        [_, features] if *features < 0 || *features == FEATURE_COUNT as i64 => Ok(()),
        _ => bail!(
            "input shape {:?} does not take {} features",
            dims,
            FEATURE_COUNT
        ),
    }
}

/// Probabilities are read from a float tensor or a seq(map) (ZipMap) output.
fn check_output_type(value_type: &ValueType) -> Result<()> {
    match value_type {
        ValueType::Tensor {
            ty: TensorElementType::Float32,
            ..
        }
        | ValueType::Sequence(_) => Ok(()),
        other => bail!(
            "expected a float tensor or seq(map) output, found {:?}",
            other
        ),
    }
}

/// Pick the output carrying class probabilities.
///
/// Classifier exports usually emit a label output and a probability output
/// (`probabilities` for raw tensors, `output_probability` for ZipMap).
pub fn select_probability_output<'a, I>(names: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();

    names
        .iter()
        .find(|n| n.contains("prob"))
        .or_else(|| names.iter().rev().find(|n| !n.contains("label")))
        .or_else(|| names.last())
        .map(|n| n.to_string())
}
