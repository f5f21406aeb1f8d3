//! Final ordering of rescored hits

use crate::types::Candidate;
use std::cmp::Ordering;

/// Sort by score descending, then doc id ascending, like the upstream
/// query rescorer does.
///
/// NaN scores sort after every number. Equal scores (including two NaNs,
/// or `0.0` and `-0.0`) fall through to the doc id tie-break, so the order
/// is total.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoreComparator;

impl ScoreComparator {
    pub fn compare(a: &Candidate, b: &Candidate) -> Ordering {
        Self::compare_scores(a.score, b.score).then_with(|| a.doc_id.cmp(&b.doc_id))
    }

    /// Descending score order with NaN last
    fn compare_scores(a: f32, b: f32) -> Ordering {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        }
    }

    /// Sort a permutation of indices into `candidates`
    pub fn sort_indices(candidates: &[Candidate], indices: &mut [usize]) {
        indices.sort_by(|&a, &b| Self::compare(&candidates[a], &candidates[b]));
    }
}
