//! Rescoring of ranked windows

pub mod comparator;
pub mod engine;

pub use comparator::ScoreComparator;
pub use engine::{RescoreContext, RescoreRequest, RescoringEngine};
