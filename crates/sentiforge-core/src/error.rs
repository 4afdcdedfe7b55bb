use thiserror::Error;

/// Errors that can occur while preparing a dataset for training.
///
/// Every variant is detected before the first batch is encoded, so a failed
/// pipeline run never yields partial results.
#[derive(Debug, Error)]
pub enum SentiError {
    /// The label column does not hold exactly two distinct values.
    #[error("label column {column:?} must hold exactly two distinct values, found {found}: {values:?}")]
    InvalidLabelCardinality {
        /// The label column name.
        column: String,
        /// Number of distinct values found.
        found: usize,
        /// Up to the first few distinct values, for the error message.
        values: Vec<String>,
    },

    /// A dataset or one of its splits has no usable rows.
    #[error("dataset {what} is empty")]
    EmptyDataset {
        /// Which dataset was empty ("input", "train split", ...).
        what: &'static str,
    },

    /// A configured column name is not present in the table.
    #[error("column {column:?} not found (available: {available:?})")]
    MissingColumn {
        /// The requested column.
        column: String,
        /// The columns the table actually has.
        available: Vec<String>,
    },

    /// A text or label cell is null.
    #[error("column {column:?} has a missing value at row {row}")]
    MissingValue {
        /// The column holding the null cell.
        column: String,
        /// Zero-based row index.
        row: usize,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The CSV input could not be read.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// An I/O operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type alias for SentiForge core operations.
pub type Result<T> = std::result::Result<T, SentiError>;
