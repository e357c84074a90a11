//! Fraud scorer - model invocation behind a trait
//!
//! The pipeline only sees [`FraudScorer`]. Production uses [`OnnxScorer`],
//! tests substitute stubs.

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use thiserror::Error;

use super::registry::ModelUnavailableError;
use crate::models::{FeatureVector, FEATURE_COUNT};

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("model invocation failed: {0}")]
    Backend(String),

    #[error("model returned unusable output: {0}")]
    InvalidOutput(String),
}

/// Synchronous scoring against a loaded model
pub trait FraudScorer: Send + Sync {
    /// Fraud probability for one feature vector
    fn score(&self, features: &FeatureVector) -> Result<f64, ScoringError>;
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

/// Scorer over an in-memory ONNX Runtime session.
///
/// `Session::run` needs exclusive access, so concurrent requests take turns
/// on the mutex.
pub struct OnnxScorer {
    session: Mutex<Session>,
    output_names: Vec<String>,
}

impl OnnxScorer {
    pub fn from_bytes(model_bytes: &[u8]) -> Result<Self, ModelUnavailableError> {
        tracing::info!("Building ONNX session from memory ({} bytes)", model_bytes.len());

        let session = Session::builder()
            .map_err(|e| invalid(format!("Session builder error: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| invalid(format!("Optimization error: {}", e)))?
            .commit_from_memory(model_bytes)
            .map_err(|e| invalid(format!("Load from memory error: {}", e)))?;

        if session.inputs.is_empty() {
            return Err(invalid("model declares no inputs".to_string()));
        }
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if output_names.is_empty() {
            return Err(invalid("model declares no outputs".to_string()));
        }

        Ok(Self {
            session: Mutex::new(session),
            output_names,
        })
    }
}

fn invalid(reason: String) -> ModelUnavailableError {
    ModelUnavailableError::InvalidArtifact(reason)
}

impl FraudScorer for OnnxScorer {
    fn score(&self, features: &FeatureVector) -> Result<f64, ScoringError> {
        let input_array = Array2::<f32>::from_shape_vec((1, FEATURE_COUNT), features.to_f32().to_vec())
            .map_err(|e| ScoringError::Backend(format!("Array error: {}", e)))?;
        let input_tensor = Value::from_array(input_array)
            .map_err(|e| ScoringError::Backend(format!("Tensor error: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| ScoringError::Backend(format!("Inference failed: {}", e)))?;

        // Classifiers export a label tensor next to the probabilities; take
        // the first output that holds floats.
        for name in &self.output_names {
            let Some(output) = outputs.get(name.as_str()) else {
                continue;
            };
            if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
                return probability_from_output(data);
            }
        }

        Err(ScoringError::InvalidOutput(format!(
            "no float tensor among outputs {:?}",
            self.output_names
        )))
    }
}

/// Read the fraud probability out of a single-row output.
///
/// Two values are `[p(legit), p(fraud)]`, one value is the probability itself.
pub fn probability_from_output(data: &[f32]) -> Result<f64, ScoringError> {
    match data {
        [p] | [_, p] => Ok(f64::from(*p)),
        other => Err(ScoringError::InvalidOutput(format!(
            "expected 1 or 2 values for a single row, got {}",
            other.len()
        ))),
    }
}
