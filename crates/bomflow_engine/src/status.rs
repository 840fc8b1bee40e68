//! Observer-facing status surface.
//!
//! A single cheap read per poll: no joins, no derived state beyond what the
//! BOM record already carries. Combined with the pure step projection, an
//! observer reconstructs the full step view from this snapshot alone.

use crate::error::WorkflowError;
use bomflow_schema::{project_steps, BomId, BomStatus, ProcessingStatus, StageStep};
use bomflow_store::EntityStore;
use serde::Serialize;

/// Poll-friendly snapshot of a BOM's processing state.
#[derive(Debug, Clone, Serialize)]
pub struct BomStatusView {
    pub bom_id: BomId,
    pub status: BomStatus,
    pub processing_status: ProcessingStatus,
    pub processing_progress: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,
    pub total_items: u32,
    pub matched_items: u32,
}

impl BomStatusView {
    /// Derive the discrete step view from this snapshot.
    pub fn steps(&self) -> Vec<StageStep> {
        project_steps(self.processing_progress)
    }
}

/// Read the current status snapshot for a BOM.
pub fn get_status(store: &EntityStore, bom_id: BomId) -> Result<BomStatusView, WorkflowError> {
    let bom = store.get_bom(bom_id)?;
    Ok(BomStatusView {
        bom_id: bom.id,
        status: bom.status,
        processing_status: bom.processing_status,
        processing_progress: bom.processing_progress,
        processing_step: bom.processing_step,
        processing_error: bom.processing_error,
        total_items: bom.total_items,
        matched_items: bom.matched_items,
    })
}
