//! ML Rescorer Library
//!
//! Second-stage rescoring for ranked search hits: the top of a result
//! window is scored again by a pre-trained model fed with per-document
//! numeric features read from columnar field data, then re-sorted.

pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod rescorer;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use error::{FieldAccessError, FieldAccessKind, RescoreError, Result};
pub use feature_extractor::{AccessStrategy, FeatureExtractor};
pub use metrics::RescoreMetrics;
pub use models::{Model, ModelEvaluator, ModelRegistry};
pub use rescorer::{RescoreContext, RescoreRequest, RescoringEngine, ScoreComparator};
pub use storage::{FieldDataSource, InMemoryIndex};
pub use types::{Candidate, FeatureSpec, FeatureVector, Segment};
