//! Purchase orders and their approval/send state machine.
//!
//! A [`PurchaseOrder`] owns its [`PoItem`]s exclusively; regeneration
//! replaces the whole item set and recomputes totals. Status transitions
//! follow the table in [`PoStatus::can_transition`]; the engine's approval
//! workflow is the only writer of gated transitions.

use crate::ids::{BomId, ItemId, PartId, PoId, SupplierId, SupplierPartId};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Purchase order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Sent,
    Acknowledged,
    Shipped,
    Received,
    Cancelled,
}

impl PoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Sent => "sent",
            Self::Acknowledged => "acknowledged",
            Self::Shipped => "shipped",
            Self::Received => "received",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Received | Self::Cancelled)
    }

    /// True once the PO has passed (or skipped) the approval gate; such a
    /// PO is never rewritten by regeneration.
    pub fn is_past_approval(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Sent | Self::Acknowledged | Self::Shipped | Self::Received
        )
    }

    /// Transition table for the full workflow graph.
    ///
    /// `draft -> pending_approval -> {approved | rejected}`,
    /// `rejected -> draft` (rework), `approved -> sent -> acknowledged ->
    /// shipped -> received`. Ungated POs may be cancelled.
    pub fn can_transition(self, to: PoStatus) -> bool {
        use PoStatus::*;
        matches!(
            (self, to),
            (Draft, PendingApproval)
                | (Draft, Approved)
                | (Draft, Cancelled)
                | (PendingApproval, Approved)
                | (PendingApproval, Rejected)
                | (PendingApproval, Cancelled)
                | (Rejected, Draft)
                | (Approved, Sent)
                | (Sent, Acknowledged)
                | (Acknowledged, Shipped)
                | (Shipped, Received)
        )
    }
}

impl fmt::Display for PoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Format a PO number from its creation month and store-assigned sequence.
pub fn format_po_number(created_at: DateTime<Utc>, sequence: u64) -> String {
    format!("PO-{}-{:04}", created_at.format("%Y%m"), sequence)
}

/// One line of a purchase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoItem {
    /// 1-based position within the order.
    pub line_number: u32,

    /// Source BOM line, when the PO was generated from a document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bom_item_id: Option<ItemId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_id: Option<PartId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_part_id: Option<SupplierPartId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub quantity: BigDecimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measure: Option<String>,

    pub unit_price: BigDecimal,

    /// `quantity * unit_price`.
    pub extended_price: BigDecimal,
}

impl PoItem {
    /// Create a priced order line; the extension is computed here.
    pub fn new(line_number: u32, quantity: BigDecimal, unit_price: BigDecimal) -> Self {
        let extended_price = &quantity * &unit_price;
        Self {
            line_number,
            bom_item_id: None,
            part_id: None,
            supplier_part_id: None,
            part_number: None,
            description: None,
            quantity,
            unit_of_measure: None,
            unit_price,
            extended_price,
        }
    }

    /// Link back to the source BOM line.
    pub fn with_bom_item(mut self, bom_item_id: ItemId) -> Self {
        self.bom_item_id = Some(bom_item_id);
        self
    }

    /// Set the part number.
    pub fn with_part_number(mut self, part_number: impl Into<String>) -> Self {
        self.part_number = Some(part_number.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the unit of measure.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit_of_measure = Some(unit.into());
        self
    }

    /// Set the supplier part reference.
    pub fn with_supplier_part(mut self, supplier_part_id: SupplierPartId) -> Self {
        self.supplier_part_id = Some(supplier_part_id);
        self
    }
}

/// A draft or active order to a single supplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PoId,

    /// Unique, assigned at creation.
    pub po_number: String,

    pub supplier_id: SupplierId,

    /// Source document; None for manually created POs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bom_id: Option<BomId>,

    pub status: PoStatus,

    pub subtotal: BigDecimal,
    pub tax: BigDecimal,
    pub shipping: BigDecimal,
    /// `subtotal + tax + shipping`.
    pub total: BigDecimal,

    /// Derived: `total >= approval threshold` at last evaluation.
    pub requires_approval: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,

    pub items: Vec<PoItem>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    /// Create an empty draft order.
    pub fn new(id: PoId, po_number: impl Into<String>, supplier_id: SupplierId) -> Self {
        let now = Utc::now();
        Self {
            id,
            po_number: po_number.into(),
            supplier_id,
            bom_id: None,
            status: PoStatus::Draft,
            subtotal: BigDecimal::zero(),
            tax: BigDecimal::zero(),
            shipping: BigDecimal::zero(),
            total: BigDecimal::zero(),
            requires_approval: false,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            sent_at: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Link to the source BOM.
    pub fn with_bom(mut self, bom_id: BomId) -> Self {
        self.bom_id = Some(bom_id);
        self
    }

    /// Replace the full item set and recompute totals.
    pub fn replace_items(&mut self, items: Vec<PoItem>) {
        self.items = items;
        self.recompute_totals();
    }

    /// Recompute `subtotal` and `total` from current items, tax and
    /// shipping. Called whenever items change.
    pub fn recompute_totals(&mut self) {
        self.subtotal = self
            .items
            .iter()
            .fold(BigDecimal::zero(), |acc, item| acc + &item.extended_price);
        self.total = &self.subtotal + &self.tax + &self.shipping;
        self.touch();
    }

    /// Re-derive `requires_approval` from the current total.
    pub fn evaluate_approval_gate(&mut self, threshold: &BigDecimal) {
        self.requires_approval = self.total >= *threshold;
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
