//! Error types for the rescoring pipeline

use std::fmt;
use thiserror::Error;

/// Why a single document could not produce a feature value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccessKind {
    /// The field is not backed by numeric field data
    NotNumeric,
    /// The document has no value for the field
    Missing,
    /// The document has more than one value for the field
    MultiValued,
}

/// Per-document, per-field extraction failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAccessError {
    pub doc_id: u32,
    pub field: String,
    pub kind: FieldAccessKind,
}

impl FieldAccessError {
    pub fn new(doc_id: u32, field: impl Into<String>, kind: FieldAccessKind) -> Self {
        Self {
            doc_id,
            field: field.into(),
            kind,
        }
    }
}

impl fmt::Display for FieldAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FieldAccessKind::NotNumeric => write!(
                f,
                "document [{}] is not a number field [{}]",
                self.doc_id, self.field
            ),
            FieldAccessKind::Missing => write!(
                f,
                "document [{}] does not have the field [{}]",
                self.doc_id, self.field
            ),
            FieldAccessKind::MultiValued => write!(
                f,
                "document [{}] has more than one value for the field [{}]",
                self.doc_id, self.field
            ),
        }
    }
}

impl std::error::Error for FieldAccessError {}

#[derive(Debug, Error)]
pub enum RescoreError {
    #[error("Model loading failed for [{identifier}]: {source:#}")]
    ModelLoad {
        identifier: String,
        source: anyhow::Error,
    },

    #[error("Inference shape mismatch: {0}")]
    InferenceShape(String),

    #[error("Model inference failed: {0}")]
    Inference(String),

    #[error("Field access failed: {0}")]
    FieldAccess(#[from] FieldAccessError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("document [{doc_id}] does not belong to any segment")]
    UnknownDocument { doc_id: u32 },

    #[error("Field data storage error: {0}")]
    Storage(String),
}

impl RescoreError {
    /// Short label used when counting failures.
    pub fn kind(&self) -> &'static str {
        match self {
            RescoreError::ModelLoad { .. } => "model_load",
            RescoreError::InferenceShape(_) => "inference_shape",
            RescoreError::Inference(_) => "inference",
            RescoreError::FieldAccess(e) => match e.kind {
                FieldAccessKind::NotNumeric => "field_not_numeric",
                FieldAccessKind::Missing => "field_missing",
                FieldAccessKind::MultiValued => "field_multi_valued",
            },
            RescoreError::Configuration(_) => "configuration",
            RescoreError::UnknownDocument { .. } => "unknown_document",
            RescoreError::Storage(_) => "storage",
        }
    }
}

pub type Result<T> = std::result::Result<T, RescoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_access_messages() {
        let missing = FieldAccessError::new(7, "price", FieldAccessKind::Missing);
        assert_eq!(
            missing.to_string(),
            "document [7] does not have the field [price]"
        );

        let multi = FieldAccessError::new(3, "tags", FieldAccessKind::MultiValued);
        assert_eq!(
            multi.to_string(),
            "document [3] has more than one value for the field [tags]"
        );
    }

    #[test]
    fn test_error_kind_labels() {
        let err: RescoreError = FieldAccessError::new(1, "x", FieldAccessKind::NotNumeric).into();
        assert_eq!(err.kind(), "field_not_numeric");

        let err = RescoreError::ModelLoad {
            identifier: "lr.json".to_string(),
            source: anyhow::anyhow!("file not found"),
        };
        assert_eq!(err.kind(), "model_load");
        assert!(err.to_string().contains("lr.json"));
        assert!(err.to_string().contains("file not found"));
    }
}
