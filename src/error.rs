//! Error taxonomy for the load → normalize → analyse pipeline.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input file could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No header row was found before the input ran out.
    #[error("no header row starting with '{header_label}' found in {source_name}")]
    MalformedInput {
        source_name: String,
        header_label: String,
    },

    /// A numeric cell was still unparsable after separator stripping.
    #[error("cell [{row_key}, {column}] is not numeric: '{value}'")]
    DataType {
        row_key: String,
        column: String,
        value: String,
    },

    /// The requested entity has no row in the named table.
    #[error("entity '{entity}' not found in {table}")]
    EntityNotFound { entity: String, table: String },

    /// Too few points to fit a line or correlate.
    #[error("insufficient data for '{entity}': need at least {required} points, got {actual}")]
    InsufficientData {
        entity: String,
        required: usize,
        actual: usize,
    },

    /// A period label that cannot be used as an integer period.
    #[error("invalid period label '{label}': {reason}")]
    InvalidPeriod { label: String, reason: String },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl PipelineError {
    /// Per-entity failures. Callers skip the entity and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::EntityNotFound { .. } | PipelineError::InsufficientData { .. }
        )
    }
}
