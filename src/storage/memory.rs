//! In-memory field data store

use super::{FieldColumn, FieldDataSource, SegmentFieldData, SegmentValues};
use crate::error::{RescoreError, Result};
use crate::types::Segment;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Storage type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Numeric,
    Keyword,
}

/// Values of one field, keyed by index-wide document id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredField {
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub values: BTreeMap<u32, Vec<f64>>,
}

/// Segmented index held entirely in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryIndex {
    segments: Vec<Segment>,
    #[serde(default)]
    fields: HashMap<String, StoredField>,
}

impl InMemoryIndex {
    /// Create an empty index over the given segments
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        Segment::validate_order(&segments)?;
        Ok(Self {
            segments,
            fields: HashMap::new(),
        })
    }

    /// Load an index from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read index from {:?}", path))?;
        let index: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse index from {:?}", path))?;
        Segment::validate_order(&index.segments)?;
        Ok(index)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Append values for a numeric field on one document
    pub fn add_values(&mut self, field: &str, doc_id: u32, values: &[f64]) -> &mut Self {
        self.fields
            .entry(field.to_string())
            .or_default()
            .values
            .entry(doc_id)
            .or_default()
            .extend_from_slice(values);
        self
    }

    /// Convenience for the common single-valued case
    pub fn add_value(&mut self, field: &str, doc_id: u32, value: f64) -> &mut Self {
        self.add_values(field, doc_id, &[value])
    }

    /// Declare a field that exists but is not numeric
    pub fn add_keyword_field(&mut self, field: &str) -> &mut Self {
        self.fields.entry(field.to_string()).or_default().field_type = FieldType::Keyword;
        self
    }
}

impl FieldDataSource for InMemoryIndex {
    fn for_field(&self, field: &str) -> Result<Box<dyn FieldColumn + '_>> {
        let (name, stored) = self.fields.get_key_value(field).ok_or_else(|| {
            RescoreError::Configuration(format!("no field data for field [{}]", field))
        })?;

        Ok(Box::new(MemoryColumn { name, stored }))
    }
}

struct MemoryColumn<'a> {
    name: &'a str,
    stored: &'a StoredField,
}

impl FieldColumn for MemoryColumn<'_> {
    fn name(&self) -> &str {
        self.name
    }

    fn load(&self, segment: &Segment) -> Result<SegmentFieldData<'_>> {
        match self.stored.field_type {
            FieldType::Keyword => Ok(SegmentFieldData::NonNumeric),
            FieldType::Numeric => Ok(SegmentFieldData::Numeric(Box::new(MemorySegmentValues {
                base: segment.base,
                values: &self.stored.values,
                current: &[],
                next: 0,
            }))),
        }
    }
}

struct MemorySegmentValues<'a> {
    base: u32,
    values: &'a BTreeMap<u32, Vec<f64>>,
    current: &'a [f64],
    next: usize,
}

impl SegmentValues for MemorySegmentValues<'_> {
    fn value_count(&mut self, local_doc: u32) -> Result<usize> {
        let doc_id = self.base + local_doc;
        self.current = self
            .values
            .get(&doc_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        self.next = 0;
        Ok(self.current.len())
    }

    fn next_value(&mut self) -> Result<f64> {
        let value = self.current.get(self.next).copied().ok_or_else(|| {
            RescoreError::Storage("next_value called past the document's last value".to_string())
        })?;
        self.next += 1;
        Ok(value)
    }
}
