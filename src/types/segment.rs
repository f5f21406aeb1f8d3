//! Segment descriptors and the forward-only cursor over them

use crate::error::{RescoreError, Result};
use serde::{Deserialize, Serialize};

/// A contiguous range of document ids backed by one storage unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// First document id of the segment
    pub base: u32,
    /// Number of documents in the segment
    pub max_doc: u32,
}

impl Segment {
    pub fn new(base: u32, max_doc: u32) -> Self {
        Self { base, max_doc }
    }

    /// Exclusive upper bound of the segment's document ids
    pub fn end(&self) -> u32 {
        self.base.saturating_add(self.max_doc)
    }

    pub fn contains(&self, doc_id: u32) -> bool {
        doc_id >= self.base && doc_id < self.end()
    }

    /// Segment-local id of an index-wide document id
    pub fn local_doc(&self, doc_id: u32) -> u32 {
        doc_id - self.base
    }

    /// Check that segments are sorted by base id and do not overlap.
    pub fn validate_order(segments: &[Segment]) -> Result<()> {
        for pair in segments.windows(2) {
            if pair[1].base < pair[0].end() {
                return Err(RescoreError::Configuration(format!(
                    "segments out of order or overlapping: [{}, {}) then [{}, {})",
                    pair[0].base,
                    pair[0].end(),
                    pair[1].base,
                    pair[1].end()
                )));
            }
        }
        Ok(())
    }
}

/// Forward-only cursor over segments ordered by base id.
///
/// Callers must seek with non-decreasing document ids.
pub struct SegmentCursor<'a> {
    segments: &'a [Segment],
    position: usize,
}

impl<'a> SegmentCursor<'a> {
    pub fn new(segments: &'a [Segment]) -> Self {
        Self {
            segments,
            position: 0,
        }
    }

    /// Advance while `doc_id` is at or beyond the current segment's end and
    /// return the position of the segment holding `doc_id`.
    pub fn seek(&mut self, doc_id: u32) -> Result<usize> {
        while self.position < self.segments.len() && doc_id >= self.segments[self.position].end()
        {
            self.position += 1;
        }

        match self.segments.get(self.position) {
            Some(segment) if segment.contains(doc_id) => Ok(self.position),
            _ => Err(RescoreError::UnknownDocument { doc_id }),
        }
    }
}
