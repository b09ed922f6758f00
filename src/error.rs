use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::SaleId;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Malformed input: {reason}")]
    MalformedInput { reason: String },

    #[error("Invalid value for '{field}': {details}")]
    InvalidRecord { field: String, details: String },

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Unknown sale id: {0}")]
    UnknownSale(SaleId),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TrackerError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// A cell that could not be converted to its expected type and was replaced
/// by a default. Collected next to results; never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoercionWarning {
    /// Zero-based data row index in the source table.
    pub row: usize,
    pub field: String,
    pub value: String,
    pub fallback: String,
}

impl std::fmt::Display for CoercionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "row {}: '{}' value '{}' replaced by '{}'",
            self.row, self.field, self.value, self.fallback
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A single store call that failed inside a batch. Sibling rows are unaffected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMutationFailure {
    pub kind: MutationKind,
    /// `None` for inserts, which have no id until the store assigns one.
    pub id: Option<SaleId>,
    pub reason: String,
}

impl std::fmt::Display for RowMutationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "failed to {} id={}: {}", self.kind, id, self.reason),
            None => write!(f, "failed to {}: {}", self.kind, self.reason),
        }
    }
}
