use bomflow_schema::{BomId, TaskId};
use thiserror::Error;

/// Errors surfaced by the entity store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A Queued or Running task already exists for the BOM.
    #[error("a processing run is already active for BOM {bom_id} (task {task_id})")]
    RunActive { bom_id: BomId, task_id: TaskId },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
