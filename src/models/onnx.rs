//! ONNX model evaluator

use super::{check_input_arity, Model, ModelEvaluator};
use crate::error::{RescoreError, Result};
use anyhow::{Context, Result as AnyResult};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{Tensor, ValueType};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Loader for ONNX scoring models
pub struct OnnxEvaluator {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl OnnxEvaluator {
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }
}

impl Default for OnnxEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Last dimension of a tensor-typed value, if it is statically known
fn last_dimension(value_type: &ValueType) -> Option<usize> {
    value_type
        .tensor_shape()
        .and_then(|shape| shape.last().copied())
        .and_then(|dim| usize::try_from(dim).ok())
}

impl ModelEvaluator for OnnxEvaluator {
    fn load(&self, path: &Path) -> AnyResult<Arc<dyn Model>> {
        info!(path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        if session.inputs.len() != 1 {
            anyhow::bail!(
                "model declares {} input tensors, expected a single [batch, features] input",
                session.inputs.len()
            );
        }
        let first_input = &session.inputs[0];
        let input_name = first_input.name.clone();
        let input_arity = last_dimension(&first_input.input_type)
            .context("model input has no static feature dimension")?;

        let first_output = session
            .outputs
            .first()
            .context("model declares no output")?;
        let output_name = first_output.name.clone();
        let output_arity = if session.outputs.len() > 1 {
            session.outputs.len()
        } else {
            last_dimension(&first_output.output_type).unwrap_or(1)
        };

        info!(
            input = %input_name,
            output = %output_name,
            input_arity,
            output_arity,
            "Model loaded successfully"
        );

        Ok(Arc::new(OnnxModel {
            session: Mutex::new(session),
            input_name,
            output_name,
            input_arity,
            output_arity,
        }))
    }
}

/// Loaded ONNX model
struct OnnxModel {
    /// ONNX Runtime session; running it needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_arity: usize,
    output_arity: usize,
}

impl Model for OnnxModel {
    fn input_arity(&self) -> usize {
        self.input_arity
    }

    fn output_arity(&self) -> usize {
        self.output_arity
    }

    fn infer(&self, features: &[f64]) -> Result<f64> {
        check_input_arity(self.input_arity, features)?;

        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let data: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let input_tensor = Tensor::from_array((shape, data))
            .map_err(|e| RescoreError::Inference(format!("failed to create input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| RescoreError::Inference(format!("Lock error: {}", e)))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| RescoreError::Inference(e.to_string()))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            RescoreError::Inference(format!("model produced no output [{}]", self.output_name))
        })?;
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| RescoreError::Inference(e.to_string()))?;

        data.first()
            .map(|&v| v as f64)
            .ok_or_else(|| RescoreError::Inference("model produced an empty output".to_string()))
    }
}
