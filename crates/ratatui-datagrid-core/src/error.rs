use thiserror::Error;

use crate::options::Tier;
use crate::value::RowId;

/// Errors surfaced by the grid engine.
///
/// Most inconsistencies on the render path are recovered locally (selectors filter, layout
/// falls back to empty windows). The variants here cover misuse that callers can act on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GridError {
    #[error("duplicate row id: {0}")]
    DuplicateRowId(RowId),

    #[error("row id {0} uses the prefix reserved for generated group rows")]
    ReservedRowId(RowId),

    #[error("row not found: {0}")]
    RowNotFound(RowId),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("column definition is missing its `field`")]
    MissingColumnField,

    #[error("unknown grid api method: {0}")]
    UnknownMethod(String),

    /// Raised when the dynamic API is invoked before the grid finished assembling itself.
    #[error("grid api method `{0}` called before the grid was initialized")]
    NotInitialized(String),

    #[error("invalid arguments for `{method}`: {reason}")]
    InvalidArguments { method: String, reason: String },

    #[error("{feature} requires the {required:?} tier")]
    FeatureUnavailable { feature: &'static str, required: Tier },

    #[error("cell {id}/{field} is not editable")]
    NotEditable { id: RowId, field: String },

    #[error("no cell is being edited")]
    NotEditing,

    #[error("row update rejected: {0}")]
    RowUpdateRejected(String),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("export failed: {0}")]
    Export(String),

    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GridError>;
