//! Columnar field data access
//!
//! The rescorer only reads per-document numeric values, one segment at a
//! time. Implementations sit on top of whatever columnar layout the index
//! uses; [`InMemoryIndex`] is a self-contained one.

pub mod memory;

pub use memory::InMemoryIndex;

use crate::error::Result;
use crate::types::Segment;

/// Entry point to per-field columnar data.
pub trait FieldDataSource {
    /// Resolve the column backing `field`.
    fn for_field(&self, field: &str) -> Result<Box<dyn FieldColumn + '_>>;
}

/// One field's values across all segments.
pub trait FieldColumn {
    fn name(&self) -> &str;

    /// Load this field's values for one segment. May block on I/O.
    fn load(&self, segment: &Segment) -> Result<SegmentFieldData<'_>>;
}

/// Field data loaded for a single segment.
pub enum SegmentFieldData<'a> {
    Numeric(Box<dyn SegmentValues + 'a>),
    /// The field exists but is not numeric (keyword, text, ...)
    NonNumeric,
}

/// Per-document values of one field inside one segment.
///
/// Local document ids are requested in non-decreasing order.
pub trait SegmentValues {
    /// Position on `local_doc` and return how many values it has.
    fn value_count(&mut self, local_doc: u32) -> Result<usize>;

    /// Next value of the current document. Only valid after
    /// `value_count` returned a non-zero count.
    fn next_value(&mut self) -> Result<f64>;
}
