//! Workflow error taxonomy.

use crate::collaborators::{MatchingError, ParserError};
use bomflow_schema::{BomId, TaskId};
use bomflow_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the workflow layer.
///
/// Transition errors (`Conflict`, `InvalidState`) are returned
/// synchronously and never mutate state. Stage errors are persisted on the
/// BOM and its task before they propagate.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A processing run is already active for the document.
    #[error("a processing run is already active for BOM {bom_id} (task {task_id})")]
    Conflict { bom_id: BomId, task_id: TaskId },

    /// A transition was attempted from the wrong state. Identifies the
    /// expected and actual states to aid correction.
    #[error("cannot act on {entity} {id}: expected status '{expected}', found '{actual}'")]
    InvalidState {
        entity: &'static str,
        id: String,
        expected: &'static str,
        actual: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Bounded to the parse stage.
    #[error("unsupported source format: {0}")]
    UnsupportedFormat(String),

    /// Bounded to the parse stage.
    #[error("failed to parse source file: {0}")]
    Parse(String),

    /// The matching collaborator stayed unavailable through the configured
    /// retries.
    #[error("matching service unavailable: {0}")]
    MatchingUnavailable(String),

    #[error("invalid workflow configuration: {0}")]
    Config(String),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::RunActive { bom_id, task_id } => Self::Conflict { bom_id, task_id },
        }
    }
}

impl From<ParserError> for WorkflowError {
    fn from(err: ParserError) -> Self {
        match err {
            ParserError::UnsupportedFormat(detail) => Self::UnsupportedFormat(detail),
            ParserError::Malformed(detail) => Self::Parse(detail),
        }
    }
}

impl From<MatchingError> for WorkflowError {
    fn from(err: MatchingError) -> Self {
        match err {
            MatchingError::Unavailable(detail) => Self::MatchingUnavailable(detail),
        }
    }
}
