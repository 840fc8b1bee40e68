//! Purchase order approval workflow.
//!
//! Gated transitions on a PO: submit out of draft, human approve/reject,
//! send to the supplier. Every transition that needs human sign-off writes
//! an [`ApprovalRequest`] so the decision is auditable independently of the
//! PO's own status field. State checks happen inside the store's atomic
//! update, so a wrong-state call returns an error without mutating
//! anything.

use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use bomflow_schema::{ApprovalEntity, ApprovalRequest, PoId, PoStatus, PurchaseOrder};
use bomflow_store::EntityStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// A human decision on a pending PO.
#[derive(Debug, Clone)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub approved_by: Option<String>,
    pub notes: Option<String>,
}

impl ApprovalDecision {
    pub fn approve(approved_by: impl Into<String>) -> Self {
        Self {
            approved: true,
            approved_by: Some(approved_by.into()),
            notes: None,
        }
    }

    pub fn reject(notes: impl Into<String>) -> Self {
        Self {
            approved: false,
            approved_by: None,
            notes: Some(notes.into()),
        }
    }

    /// Attach reviewer notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Drives the PO approval state machine.
pub struct ApprovalWorkflow {
    store: Arc<EntityStore>,
    config: WorkflowConfig,
}

impl ApprovalWorkflow {
    pub fn new(store: Arc<EntityStore>, config: WorkflowConfig) -> Self {
        Self { store, config }
    }

    fn wrong_state(po_id: PoId, expected: &'static str, actual: PoStatus) -> WorkflowError {
        WorkflowError::InvalidState {
            entity: "purchase order",
            id: po_id.to_string(),
            expected,
            actual: actual.as_str().to_string(),
        }
    }

    /// Submit a draft PO to the approval gate.
    ///
    /// Re-derives `requires_approval` from the current total. Above the
    /// threshold the PO moves to `pending_approval` and a pending approval
    /// record is created; below it the gate is skipped with an explicit,
    /// logged transition straight to `approved` — never an implicit
    /// default status.
    pub fn submit(&self, po_id: PoId) -> Result<PurchaseOrder, WorkflowError> {
        let threshold = self.config.approval_threshold.clone();
        let updated = self
            .store
            .update_po(po_id, |po| -> Result<PurchaseOrder, WorkflowError> {
                if po.status != PoStatus::Draft {
                    return Err(Self::wrong_state(po_id, "draft", po.status));
                }
                // a fresh submission opens a fresh decision cycle
                po.rejection_reason = None;
                po.evaluate_approval_gate(&threshold);
                if po.requires_approval {
                    po.status = PoStatus::PendingApproval;
                } else {
                    po.status = PoStatus::Approved;
                    po.approved_at = Some(Utc::now());
                }
                po.touch();
                Ok(po.clone())
            })??;

        if updated.requires_approval {
            let entity = ApprovalEntity::PurchaseOrder(po_id);
            if self.store.find_pending_approval(entity).is_none() {
                let request =
                    ApprovalRequest::new(entity, format!("PO Approval: {}", updated.po_number))
                        .with_details(serde_json::json!({
                            "po_number": updated.po_number,
                            "supplier_id": updated.supplier_id,
                            "total": updated.total.to_string(),
                            "item_count": updated.item_count(),
                        }));
                self.store.insert_approval(request);
            }
            info!(
                po_number = %updated.po_number,
                total = %updated.total,
                "purchase order submitted for approval"
            );
        } else {
            info!(
                po_number = %updated.po_number,
                total = %updated.total,
                threshold = %self.config.approval_threshold,
                "approval gate skipped, total below threshold"
            );
        }

        Ok(updated)
    }

    /// Record the human decision on a pending PO.
    ///
    /// Approve moves it to `approved` and stamps approver and time; reject
    /// returns it to `draft` for rework with the rejection reason set.
    pub fn approve(
        &self,
        po_id: PoId,
        decision: ApprovalDecision,
    ) -> Result<PurchaseOrder, WorkflowError> {
        let updated = self
            .store
            .update_po(po_id, |po| -> Result<PurchaseOrder, WorkflowError> {
                if po.status != PoStatus::PendingApproval {
                    return Err(Self::wrong_state(po_id, "pending_approval", po.status));
                }
                if decision.approved {
                    po.status = PoStatus::Approved;
                    po.approved_by = decision.approved_by.clone();
                    po.approved_at = Some(Utc::now());
                } else {
                    po.status = PoStatus::Draft;
                    po.rejection_reason = decision.notes.clone();
                }
                po.touch();
                Ok(po.clone())
            })??;

        if let Some(request) = self
            .store
            .find_pending_approval(ApprovalEntity::PurchaseOrder(po_id))
        {
            self.store.update_approval(&request.id, |r| {
                r.decide(decision.approved, decision.notes.clone())
            })?;
        }

        info!(
            po_number = %updated.po_number,
            approved = decision.approved,
            "purchase order approval decided"
        );
        Ok(updated)
    }

    /// Send an approved PO to its supplier. Terminal for the automated
    /// portion of the workflow; later tracking states are driven by
    /// external events.
    pub fn send(&self, po_id: PoId) -> Result<PurchaseOrder, WorkflowError> {
        let updated = self
            .store
            .update_po(po_id, |po| -> Result<PurchaseOrder, WorkflowError> {
                if po.status != PoStatus::Approved {
                    return Err(Self::wrong_state(po_id, "approved", po.status));
                }
                po.status = PoStatus::Sent;
                po.sent_at = Some(Utc::now());
                po.touch();
                Ok(po.clone())
            })??;

        info!(po_number = %updated.po_number, "purchase order sent");
        Ok(updated)
    }
}
