//! Candidate hits flowing through the rescoring window

use serde::{Deserialize, Serialize};

/// A ranked hit eligible for rescoring.
///
/// `score` starts out equal to `original_score` and is overwritten by the
/// model output when the candidate falls inside the rescoring window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Index-wide document identifier
    #[serde(alias = "doc")]
    pub doc_id: u32,

    /// Score assigned by the upstream ranking stage
    pub original_score: f32,

    /// Current score (the new score once rescored)
    pub score: f32,
}

impl Candidate {
    /// Create a candidate as handed over by the upstream ranking stage
    pub fn new(doc_id: u32, score: f32) -> Self {
        Self {
            doc_id,
            original_score: score,
            score,
        }
    }

    /// Whether the score differs from the one the candidate arrived with
    pub fn is_rescored(&self) -> bool {
        self.score.to_bits() != self.original_score.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_candidate_keeps_original_score() {
        let candidate = Candidate::new(5, 1.0);
        assert_eq!(candidate.doc_id, 5);
        assert_eq!(candidate.score, 1.0);
        assert_eq!(candidate.original_score, 1.0);
        assert!(!candidate.is_rescored());
    }

    #[test]
    fn test_candidate_serialization() {
        let mut candidate = Candidate::new(9, 0.5);
        candidate.score = 2.0;

        let json = serde_json::to_string(&candidate).unwrap();
        let deserialized: Candidate = serde_json::from_str(&json).unwrap();

        assert_eq!(candidate, deserialized);
        assert!(deserialized.is_rescored());
    }
}
