//! Entity model and pure state machines for the Bomflow workflow.
//!
//! Everything in this crate is plain data plus pure logic: status
//! vocabularies, transition tables, aggregate recomputation, and the
//! progress-to-step projection. No storage access, no I/O. The engine
//! crate drives these types; the store crate persists them.

pub mod approval;
pub mod bom;
pub mod ids;
pub mod progress;
pub mod purchase_order;
pub mod task;

pub use approval::{ApprovalEntity, ApprovalRequest, ApprovalStatus};
pub use bom::{
    recompute_aggregates, AlternativeMatch, Bom, BomAggregates, BomItem, BomStatus, ItemStatus,
    MatchMethod, ProcessingStatus,
};
pub use ids::{
    ApprovalId, BomId, IdParseError, ItemId, PartId, PoId, SupplierId, SupplierPartId, TaskId,
};
pub use progress::{
    project_steps, PipelineStage, ProgressBand, StageStep, StepState, GENERATE_POS_BAND,
    MATCH_BAND, OPTIMIZE_BAND, PARSE_BAND, PROGRESS_COMPLETE,
};
pub use purchase_order::{format_po_number, PoItem, PoStatus, PurchaseOrder};
pub use task::{ProcessingTask, TaskState};
