//! Type definitions for the rescoring pipeline

pub mod candidate;
pub mod feature_spec;
pub mod segment;

pub use candidate::Candidate;
pub use feature_spec::{FeatureSpec, FeatureVector, FEATURE_SEPARATOR};
pub use segment::Segment;
