//! Model-based rescoring of the top of a ranked window

use super::comparator::ScoreComparator;
use crate::error::{RescoreError, Result};
use crate::feature_extractor::{AccessStrategy, FeatureExtractor};
use crate::metrics::RescoreMetrics;
use crate::models::{Model, ModelRegistry};
use crate::storage::FieldDataSource;
use crate::types::{Candidate, FeatureSpec, Segment};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Rescoring request as handed over by the query parser
#[derive(Debug, Clone, Deserialize)]
pub struct RescoreRequest {
    /// `|`-delimited feature field names, in model input order
    #[serde(default)]
    pub features: String,
    /// Number of top hits to rescore; falls back to the configured size
    #[serde(default)]
    pub window_size: Option<usize>,
}

/// Parsed, per-request rescoring parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescoreContext {
    pub window_size: usize,
    pub fields: FeatureSpec,
}

impl RescoreContext {
    pub fn new(window_size: usize, fields: FeatureSpec) -> Self {
        Self {
            window_size,
            fields,
        }
    }

    /// Build a context from a request, using `default_window` when the
    /// request does not name a window size
    pub fn from_request(request: &RescoreRequest, default_window: usize) -> Result<Self> {
        Ok(Self {
            window_size: request.window_size.unwrap_or(default_window),
            fields: FeatureSpec::parse(&request.features)?,
        })
    }
}

/// Recomputes scores for the top of a result window with a loaded model.
///
/// Requests are processed synchronously on the calling thread. The only
/// state shared between concurrent requests is the immutable model.
pub struct RescoringEngine {
    registry: Arc<ModelRegistry>,
    model_name: String,
    extractor: FeatureExtractor,
    metrics: Option<Arc<RescoreMetrics>>,
}

impl RescoringEngine {
    pub fn new(registry: Arc<ModelRegistry>, model_name: impl Into<String>) -> Self {
        Self {
            registry,
            model_name: model_name.into(),
            extractor: FeatureExtractor::new(),
            metrics: None,
        }
    }

    pub fn with_strategy(mut self, strategy: AccessStrategy) -> Self {
        self.extractor = FeatureExtractor::with_strategy(strategy);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<RescoreMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Rescore the first `context.window_size` candidates of `window`.
    ///
    /// The rescored prefix is re-sorted by [`ScoreComparator`]; candidates
    /// beyond the window follow it unchanged. Any failure fails the whole
    /// request, no partially rescored window is ever returned.
    ///
    /// The model shape and every requested field are checked even when the
    /// window is empty or `window_size` is 0, so an unknown field name is a
    /// configuration error regardless of how many hits are rescored.
    pub fn rescore(
        &self,
        window: Vec<Candidate>,
        context: &RescoreContext,
        segments: &[Segment],
        source: &dyn FieldDataSource,
    ) -> Result<Vec<Candidate>> {
        let start_time = Instant::now();
        let result = self.rescore_inner(window, context, segments, source);

        match &result {
            Ok(candidates) => {
                let rescored = context.window_size.min(candidates.len());
                if let Some(metrics) = &self.metrics {
                    metrics.record_request(start_time.elapsed(), rescored);
                }
                debug!(
                    model = %self.model_name,
                    rescored,
                    total = candidates.len(),
                    elapsed_us = start_time.elapsed().as_micros() as u64,
                    "Rescore complete"
                );
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure(e.kind());
                }
                warn!(model = %self.model_name, error = %e, "Rescore failed");
            }
        }

        result
    }

    fn rescore_inner(
        &self,
        mut window: Vec<Candidate>,
        context: &RescoreContext,
        segments: &[Segment],
        source: &dyn FieldDataSource,
    ) -> Result<Vec<Candidate>> {
        let model = self.registry.ensure_loaded(&self.model_name)?;
        Self::validate_shape(model.as_ref(), &context.fields)?;

        let end = window.len().min(context.window_size);
        let suffix = window.split_off(end);
        let mut prefix = window;

        let vectors = self
            .extractor
            .extract(&prefix, &context.fields, segments, source)?;

        let mut scores = Vec::with_capacity(prefix.len());
        for features in &vectors {
            scores.push(model.infer(features)?);
        }

        // Scores are written back only once every candidate has been scored.
        for (candidate, score) in prefix.iter_mut().zip(scores) {
            candidate.score = score as f32;
        }

        let mut order: Vec<usize> = (0..prefix.len()).collect();
        ScoreComparator::sort_indices(&prefix, &mut order);

        let mut slots: Vec<Option<Candidate>> = prefix.into_iter().map(Some).collect();
        let mut rescored: Vec<Candidate> = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();
        rescored.extend(suffix);

        Ok(rescored)
    }

    /// Check the request's fields against the model before touching storage
    fn validate_shape(model: &dyn Model, fields: &FeatureSpec) -> Result<()> {
        if fields.is_empty() && model.input_arity() != 0 {
            return Err(RescoreError::Configuration(format!(
                "no feature fields given but the model needs {} inputs",
                model.input_arity()
            )));
        }
        if fields.len() != model.input_arity() {
            return Err(RescoreError::InferenceShape(format!(
                "model evaluator has wrong inputs, model need {} input field but got {} fields",
                model.input_arity(),
                fields.len()
            )));
        }
        if model.output_arity() != 1 {
            return Err(RescoreError::InferenceShape(format!(
                "model evaluator has wrong outputs, got {} output field",
                model.output_arity()
            )));
        }
        Ok(())
    }
}
