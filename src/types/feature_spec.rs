//! Ordered feature-field specification
//!
//! The position of a field in the spec is its position in the model input,
//! so the order given in the request is significant.

use crate::error::{RescoreError, Result};
use std::collections::HashSet;
use std::fmt;

/// Separator between field names in the request's `features` parameter.
pub const FEATURE_SEPARATOR: char = '|';

/// Feature values for one document, aligned with a [`FeatureSpec`].
pub type FeatureVector = Vec<f64>;

/// Ordered, duplicate-free list of feature field names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureSpec {
    fields: Vec<String>,
}

impl FeatureSpec {
    /// Parse a `|`-delimited list such as `"price|popularity"`.
    ///
    /// An empty string yields an empty spec; whether that is acceptable
    /// depends on the model and is checked by the engine.
    pub fn parse(features: &str) -> Result<Self> {
        let trimmed = features.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        Self::new(trimmed.split(FEATURE_SEPARATOR).map(str::trim))
    }

    /// Build a spec from field names, rejecting empty and duplicate names.
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(fields.len());

        for (position, field) in fields.iter().enumerate() {
            if field.is_empty() {
                return Err(RescoreError::Configuration(format!(
                    "empty feature field name at position {}",
                    position
                )));
            }
            if !seen.insert(field.as_str()) {
                return Err(RescoreError::Configuration(format!(
                    "feature field [{}] is listed more than once",
                    field
                )));
            }
        }

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

impl fmt::Display for FeatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", FEATURE_SEPARATOR)?;
            }
            f.write_str(field)?;
        }
        Ok(())
    }
}
