//! Error taxonomy for a reconciliation run

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Settings or special-case table missing, unreadable or malformed. Aborts the run.
    #[error("configuration error: {0}")]
    FatalConfig(String),

    /// The summary workbook cannot be opened. Aborts the run before any writing.
    #[error("summary workbook unavailable: {path}")]
    SummaryUnavailable {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The filled summary workbook cannot be written.
    #[error("failed to save summary workbook {path}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// One input workbook cannot be opened; its entity is skipped.
    #[error("failed to open input workbook {path}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// A matching call received an empty list.
    #[error("cannot match against an empty {0} list")]
    EmptyInput(&'static str),

    /// A matched summary sheet is missing from the workbook.
    #[error("sheet '{0}' not found in summary workbook")]
    SheetNotFound(String),

    /// The fixed value cell of a special case was already written in this run.
    #[error("special case '{id}' value cell {cell} is already written")]
    SpecialCaseTaken { id: String, cell: String },
}

impl ReconcileError {
    /// Whether the error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReconcileError::FatalConfig(_)
                | ReconcileError::SummaryUnavailable { .. }
                | ReconcileError::SaveFailed { .. }
        )
    }
}
