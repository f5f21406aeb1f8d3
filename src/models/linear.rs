//! Linear and logistic regression models stored as JSON

use super::{check_input_arity, Model, ModelEvaluator};
use crate::error::Result;
use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Link function applied to the linear predictor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Link {
    #[default]
    Identity,
    Logistic,
}

/// Regression model: `link(intercept + sum(weights[i] * x[i]))`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    /// Declared input fields, in positional order
    pub inputs: Vec<String>,
    pub weights: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub link: Link,
    /// Declared target fields
    #[serde(default = "default_outputs")]
    pub outputs: Vec<String>,
}

fn default_outputs() -> Vec<String> {
    vec!["score".to_string()]
}

impl LinearModel {
    /// Build a single-output identity model with generated input names
    pub fn new(weights: Vec<f64>, intercept: f64) -> Self {
        Self {
            inputs: (0..weights.len()).map(|i| format!("x{}", i)).collect(),
            weights,
            intercept,
            link: Link::Identity,
            outputs: default_outputs(),
        }
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.link = link;
        self
    }

    /// Check the declared structure of the model
    pub fn verify(&self) -> AnyResult<()> {
        if self.weights.len() != self.inputs.len() {
            anyhow::bail!(
                "model declares {} inputs but has {} weights",
                self.inputs.len(),
                self.weights.len()
            );
        }
        if self.outputs.is_empty() {
            anyhow::bail!("model declares no output field");
        }
        if !self.intercept.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            anyhow::bail!("model coefficients must be finite");
        }
        Ok(())
    }
}

impl Model for LinearModel {
    fn input_arity(&self) -> usize {
        self.inputs.len()
    }

    fn output_arity(&self) -> usize {
        self.outputs.len()
    }

    fn infer(&self, features: &[f64]) -> Result<f64> {
        check_input_arity(self.input_arity(), features)?;

        let linear = self
            .weights
            .iter()
            .zip(features)
            .fold(self.intercept, |acc, (w, x)| acc + w * x);

        Ok(match self.link {
            Link::Identity => linear,
            Link::Logistic => 1.0 / (1.0 + (-linear).exp()),
        })
    }
}

/// Loads [`LinearModel`] files
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearEvaluator;

impl ModelEvaluator for LinearEvaluator {
    fn load(&self, path: &Path) -> AnyResult<Arc<dyn Model>> {
        info!(path = %path.display(), "Loading linear model");

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model from {:?}", path))?;
        let model: LinearModel = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse model from {:?}", path))?;
        model.verify()?;

        info!(
            inputs = model.input_arity(),
            outputs = model.output_arity(),
            link = ?model.link,
            "Linear model loaded successfully"
        );

        Ok(Arc::new(model))
    }
}
