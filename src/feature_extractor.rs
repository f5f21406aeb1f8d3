//! Feature extraction from columnar field data.
//!
//! Candidates arrive in rank order, which is random with respect to where
//! their values live on disk. The extractor walks them in doc id order,
//! one segment at a time, so reads within a column move forwards and stay
//! close together. Vectors are written back at each candidate's original
//! window position.

use crate::error::{FieldAccessError, FieldAccessKind, Result};
use crate::storage::{FieldColumn, FieldDataSource, SegmentFieldData, SegmentValues};
use crate::types::segment::SegmentCursor;
use crate::types::{Candidate, FeatureSpec, FeatureVector, Segment};
use serde::Deserialize;
use tracing::debug;

/// Order in which values are pulled inside one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessStrategy {
    /// Pick per segment from the field and document counts
    #[default]
    Auto,
    /// For each field, sweep all of the segment's candidates
    FieldMajor,
    /// For each candidate, read every field
    DocumentMajor,
}

impl AccessStrategy {
    /// Concrete strategy for a segment holding `docs` candidates
    fn resolve(self, fields: usize, docs: usize) -> AccessStrategy {
        match self {
            AccessStrategy::Auto if fields <= 1 || docs >= fields => AccessStrategy::FieldMajor,
            AccessStrategy::Auto => AccessStrategy::DocumentMajor,
            other => other,
        }
    }
}

/// Candidates of one window that fall into the same segment
struct SegmentGroup<'a> {
    segment: &'a Segment,
    /// Window positions, sorted by doc id
    members: &'a [usize],
}

/// Builds one feature vector per candidate from field data.
#[derive(Debug, Default, Clone)]
pub struct FeatureExtractor {
    strategy: AccessStrategy,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(strategy: AccessStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> AccessStrategy {
        self.strategy
    }

    /// Extract `fields` for every candidate in `window`.
    ///
    /// The returned vectors line up with `window`. The first field error
    /// aborts the whole extraction. Columns are resolved before any
    /// candidate is looked at, so an unknown field fails an empty window too.
    pub fn extract(
        &self,
        window: &[Candidate],
        fields: &FeatureSpec,
        segments: &[Segment],
        source: &dyn FieldDataSource,
    ) -> Result<Vec<FeatureVector>> {
        Segment::validate_order(segments)?;

        let columns = fields
            .iter()
            .map(|field| source.for_field(field))
            .collect::<Result<Vec<_>>>()?;

        let mut by_doc: Vec<usize> = (0..window.len()).collect();
        by_doc.sort_by_key(|&i| window[i].doc_id);

        let mut vectors = vec![vec![0.0; fields.len()]; window.len()];
        let mut cursor = SegmentCursor::new(segments);
        let mut segments_visited = 0;
        let mut start = 0;

        while start < by_doc.len() {
            let segment = &segments[cursor.seek(window[by_doc[start]].doc_id)?];
            let len = by_doc[start..]
                .iter()
                .take_while(|&&i| window[i].doc_id < segment.end())
                .count();
            let group = SegmentGroup {
                segment,
                members: &by_doc[start..start + len],
            };

            match self.strategy.resolve(fields.len(), len) {
                AccessStrategy::DocumentMajor => {
                    Self::extract_document_major(window, &columns, &group, &mut vectors)?
                }
                _ => Self::extract_field_major(window, &columns, &group, &mut vectors)?,
            }

            segments_visited += 1;
            start += len;
        }

        debug!(
            candidates = window.len(),
            fields = fields.len(),
            segments_visited,
            strategy = ?self.strategy,
            "Feature extraction complete"
        );

        Ok(vectors)
    }

    fn extract_field_major(
        window: &[Candidate],
        columns: &[Box<dyn FieldColumn + '_>],
        group: &SegmentGroup<'_>,
        vectors: &mut [FeatureVector],
    ) -> Result<()> {
        let first_doc = window[group.members[0]].doc_id;

        for (position, column) in columns.iter().enumerate() {
            let mut values = load_numeric(column.as_ref(), group.segment, first_doc)?;
            for &i in group.members {
                vectors[i][position] =
                    read_single(values.as_mut(), group.segment, window[i].doc_id, column.name())?;
            }
        }
        Ok(())
    }

    fn extract_document_major(
        window: &[Candidate],
        columns: &[Box<dyn FieldColumn + '_>],
        group: &SegmentGroup<'_>,
        vectors: &mut [FeatureVector],
    ) -> Result<()> {
        let first_doc = window[group.members[0]].doc_id;
        let mut loaded = columns
            .iter()
            .map(|column| load_numeric(column.as_ref(), group.segment, first_doc))
            .collect::<Result<Vec<_>>>()?;

        for &i in group.members {
            let doc_id = window[i].doc_id;
            for (position, (values, column)) in loaded.iter_mut().zip(columns).enumerate() {
                vectors[i][position] =
                    read_single(values.as_mut(), group.segment, doc_id, column.name())?;
            }
        }
        Ok(())
    }
}

fn load_numeric<'c>(
    column: &'c dyn FieldColumn,
    segment: &Segment,
    doc_id: u32,
) -> Result<Box<dyn SegmentValues + 'c>> {
    match column.load(segment)? {
        SegmentFieldData::Numeric(values) => Ok(values),
        SegmentFieldData::NonNumeric => {
            Err(FieldAccessError::new(doc_id, column.name(), FieldAccessKind::NotNumeric).into())
        }
    }
}

/// Read the only value of `doc_id`; absence and multiplicity are errors.
fn read_single(
    values: &mut dyn SegmentValues,
    segment: &Segment,
    doc_id: u32,
    field: &str,
) -> Result<f64> {
    match values.value_count(segment.local_doc(doc_id))? {
        0 => Err(FieldAccessError::new(doc_id, field, FieldAccessKind::Missing).into()),
        1 => values.next_value(),
        _ => Err(FieldAccessError::new(doc_id, field, FieldAccessKind::MultiValued).into()),
    }
}
