//! Scoring models and their lifecycle

pub mod linear;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod registry;

pub use linear::{LinearEvaluator, LinearModel};
#[cfg(feature = "onnx")]
pub use onnx::OnnxEvaluator;
pub use registry::ModelRegistry;

use crate::error::{RescoreError, Result};
use std::path::Path;
use std::sync::Arc;

/// A loaded predictive model.
///
/// Models are shared read-only between concurrent rescoring requests.
pub trait Model: Send + Sync {
    /// Number of positional input values expected by `infer`
    fn input_arity(&self) -> usize;

    /// Number of target values the model declares
    fn output_arity(&self) -> usize;

    /// Score one feature vector. Fails with `InferenceShape` when
    /// `features.len() != self.input_arity()`.
    fn infer(&self, features: &[f64]) -> Result<f64>;
}

/// Turns a model file into a [`Model`].
pub trait ModelEvaluator: Send + Sync {
    /// Parse and structurally verify the model at `path`
    fn load(&self, path: &Path) -> anyhow::Result<Arc<dyn Model>>;
}

/// Reject an input vector whose length does not match the model's arity.
pub(crate) fn check_input_arity(expected: usize, features: &[f64]) -> Result<()> {
    if features.len() != expected {
        return Err(RescoreError::InferenceShape(format!(
            "model need {} input field but got {} fields",
            expected,
            features.len()
        )));
    }
    Ok(())
}
