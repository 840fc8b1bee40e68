//! Review queue and human resolution of supplier matches.
//!
//! The queue is simply every item the confidence gate held back, least
//! certain first. Resolving an item is a human override: it always wins
//! over the automated match, and the BOM aggregates are recomputed from
//! item state immediately so a correction can never leave stale totals
//! behind.

use crate::error::WorkflowError;
use bigdecimal::BigDecimal;
use bomflow_schema::{
    recompute_aggregates, ApprovalEntity, BomId, BomItem, ItemId, ItemStatus, MatchMethod,
    SupplierId, SupplierPartId,
};
use bomflow_store::EntityStore;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::info;

/// How a human resolves a queued (or previously confirmed) item.
#[derive(Debug, Clone)]
pub enum ItemResolution {
    /// Pick a supplier — the top match or one of the alternatives. The
    /// price comes from the chosen candidate unless overridden here.
    SelectSupplier {
        supplier_id: SupplierId,
        supplier_part_id: Option<SupplierPartId>,
        unit_cost: Option<BigDecimal>,
    },
    /// Keep the current match but set the price by hand.
    ManualPrice { unit_cost: BigDecimal },
}

/// Surfaces and resolves items held for human review.
pub struct ReviewQueue {
    store: Arc<EntityStore>,
}

impl ReviewQueue {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }

    /// All items of a BOM awaiting review, ordered by ascending confidence
    /// so the least certain matches surface first.
    pub fn queue(&self, bom_id: BomId) -> Result<Vec<BomItem>, WorkflowError> {
        self.store.get_bom(bom_id)?;
        let mut items = self
            .store
            .list_items_by_status(bom_id, ItemStatus::NeedsReview);
        items.sort_by(|a, b| {
            let left = a.match_confidence.unwrap_or(0.0);
            let right = b.match_confidence.unwrap_or(0.0);
            left.partial_cmp(&right)
                .unwrap_or(Ordering::Equal)
                .then(a.line_number.cmp(&b.line_number))
        });
        Ok(items)
    }

    /// Apply a human resolution to an item.
    ///
    /// The item becomes `Confirmed` with match method `Manual` and
    /// confidence 1.0; an explicit price overrides any supplier-derived
    /// price. Re-resolving an already confirmed item is allowed and treated
    /// as a correction. Aggregates are recomputed afterwards.
    pub fn resolve_item(
        &self,
        item_id: ItemId,
        resolution: ItemResolution,
    ) -> Result<BomItem, WorkflowError> {
        let updated = self.store.update_item(item_id, |item| {
            match &resolution {
                ItemResolution::SelectSupplier {
                    supplier_id,
                    supplier_part_id,
                    unit_cost,
                } => {
                    let alternative = item
                        .alternative_matches
                        .iter()
                        .find(|alt| alt.supplier_id == *supplier_id)
                        .cloned();
                    let price = unit_cost
                        .clone()
                        .or_else(|| {
                            alternative
                                .as_ref()
                                .and_then(|alt| alt.unit_price.clone())
                        })
                        .or_else(|| {
                            if item.matched_supplier_id == Some(*supplier_id) {
                                item.unit_cost.clone()
                            } else {
                                None
                            }
                        });
                    item.matched_supplier_id = Some(*supplier_id);
                    item.matched_supplier_part_id = (*supplier_part_id)
                        .or_else(|| alternative.and_then(|alt| alt.supplier_part_id));
                    item.match_method = Some(MatchMethod::Manual);
                    item.match_confidence = Some(1.0);
                    item.set_unit_cost(price);
                }
                ItemResolution::ManualPrice { unit_cost } => {
                    item.match_method = Some(MatchMethod::Manual);
                    item.match_confidence = Some(1.0);
                    item.set_unit_cost(Some(unit_cost.clone()));
                }
            }
            item.status = ItemStatus::Confirmed;
            item.review_reason = None;
            item.clone()
        })?;

        if let Some(request) = self
            .store
            .find_pending_approval(ApprovalEntity::SupplierMatch(item_id))
        {
            self.store.update_approval(&request.id, |r| {
                r.decide(true, Some("resolved via review".to_string()))
            })?;
        }

        let items = self.store.list_items(updated.bom_id);
        let aggregates = recompute_aggregates(&items);
        self.store
            .update_bom(updated.bom_id, |bom| bom.apply_aggregates(&aggregates, false))?;

        info!(
            item_id = %item_id,
            bom_id = %updated.bom_id,
            line = updated.line_number,
            "review item resolved"
        );
        Ok(updated)
    }
}
