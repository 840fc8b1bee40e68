//! Purchase order aggregation.
//!
//! Groups matched and confirmed line items by supplier and upserts one PO
//! per (BOM, supplier) pair. Regeneration is idempotent by content: a PO
//! still ahead of the approval gate gets its items replaced and totals
//! recomputed; one already past the gate is never rewritten. Items without
//! a unit cost cannot be ordered — they are excluded and counted, never
//! silently dropped.

use crate::approvals::ApprovalWorkflow;
use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use bigdecimal::BigDecimal;
use bomflow_schema::{
    ApprovalEntity, BomId, BomItem, ItemStatus, PoId, PoItem, PoStatus, PurchaseOrder, SupplierId,
};
use bomflow_store::EntityStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// What one generation pass did.
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    /// Live POs for the BOM after this pass, in supplier order.
    pub po_ids: Vec<PoId>,
    /// POs created this pass.
    pub created: usize,
    /// POs whose items were replaced this pass.
    pub updated: usize,
    /// POs left untouched because they are already past approval.
    pub skipped: usize,
    /// Ungated POs cancelled because their supplier group vanished.
    pub cancelled: usize,
    /// Matched items excluded for lacking a unit cost. They remain flagged
    /// for pricing; callers must check this count.
    pub unpriced_items: usize,
}

/// Materializes purchase orders from a BOM's matched items.
pub struct PoAggregator {
    store: Arc<EntityStore>,
    config: WorkflowConfig,
    approvals: ApprovalWorkflow,
}

impl PoAggregator {
    pub fn new(store: Arc<EntityStore>, config: WorkflowConfig) -> Self {
        let approvals = ApprovalWorkflow::new(store.clone(), config.clone());
        Self {
            store,
            config,
            approvals,
        }
    }

    /// Generate or refresh the POs for a BOM.
    pub fn generate_pos(&self, bom_id: BomId) -> Result<GenerationReport, WorkflowError> {
        let bom = self.store.get_bom(bom_id)?;
        let items = self.store.list_items(bom_id);

        let mut groups: BTreeMap<SupplierId, Vec<(BomItem, BigDecimal)>> = BTreeMap::new();
        let mut report = GenerationReport::default();

        for item in items {
            if !item.status.is_matched() {
                continue;
            }
            let Some(supplier_id) = item.matched_supplier_id else {
                continue;
            };
            match item.unit_cost.clone() {
                Some(unit_cost) => groups
                    .entry(supplier_id)
                    .or_default()
                    .push((item, unit_cost)),
                None => report.unpriced_items += 1,
            }
        }

        if report.unpriced_items > 0 {
            warn!(
                bom_id = %bom_id,
                unpriced = report.unpriced_items,
                "matched items excluded from PO generation pending a price"
            );
        }

        // ungated POs whose supplier group vanished are withdrawn
        for po in self.store.list_pos(bom_id) {
            if groups.contains_key(&po.supplier_id) {
                continue;
            }
            if matches!(po.status, PoStatus::Draft | PoStatus::PendingApproval) {
                self.store.update_po(po.id, |po| {
                    po.status = PoStatus::Cancelled;
                    po.touch();
                })?;
                if let Some(request) = self
                    .store
                    .find_pending_approval(ApprovalEntity::PurchaseOrder(po.id))
                {
                    self.store.update_approval(&request.id, |r| {
                        r.decide(false, Some("superseded by regeneration".to_string()))
                    })?;
                }
                report.cancelled += 1;
            }
        }

        for (supplier_id, group) in groups {
            let po_items: Vec<PoItem> = group
                .iter()
                .enumerate()
                .map(|(index, (item, unit_cost))| {
                    let mut po_item =
                        PoItem::new(index as u32 + 1, item.quantity.clone(), unit_cost.clone())
                            .with_bom_item(item.id);
                    po_item.part_id = item.part_id;
                    po_item.supplier_part_id = item.matched_supplier_part_id;
                    po_item.part_number = item.part_number_raw.clone();
                    po_item.description = item.description_raw.clone();
                    po_item.unit_of_measure = item.unit_of_measure.clone();
                    po_item
                })
                .collect();

            let po_id = match self.store.find_po_for_supplier(bom_id, supplier_id) {
                Some(existing) if existing.status.is_past_approval() => {
                    warn!(
                        po_number = %existing.po_number,
                        status = %existing.status,
                        "leaving purchase order past approval untouched"
                    );
                    report.skipped += 1;
                    existing.id
                }
                Some(existing) => {
                    let threshold = self.config.approval_threshold.clone();
                    self.store.update_po(existing.id, |po| {
                        po.replace_items(po_items);
                        po.evaluate_approval_gate(&threshold);
                    })?;
                    report.updated += 1;
                    existing.id
                }
                None => {
                    let tax = self.config.default_tax.clone();
                    let shipping = self.config.default_shipping.clone();
                    let created = self.store.insert_po(|id, po_number| {
                        let mut po =
                            PurchaseOrder::new(id, po_number, supplier_id).with_bom(bom_id);
                        po.tax = tax;
                        po.shipping = shipping;
                        po.replace_items(po_items);
                        po
                    });
                    self.approvals.submit(created.id)?;
                    report.created += 1;
                    created.id
                }
            };
            report.po_ids.push(po_id);

            // included items are confirmed: ordered but not yet sent
            for (item, _) in &group {
                if item.status == ItemStatus::Matched {
                    self.store.update_item(item.id, |item| {
                        item.status = ItemStatus::Confirmed;
                        item.touch();
                    })?;
                }
            }
        }

        info!(
            bom_id = %bom_id,
            bom = %bom.name,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            unpriced = report.unpriced_items,
            "purchase order generation finished"
        );
        Ok(report)
    }
}
