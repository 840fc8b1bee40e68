//! Bill of Materials entities.
//!
//! A [`Bom`] owns its [`BomItem`]s exclusively: items are created by the
//! parse stage, mutated by the match stage and by human review, and deleted
//! with their document. Aggregate fields (`total_items`, `matched_items`,
//! `total_cost`) are always recomputed from current item state via
//! [`recompute_aggregates`], never incremented in place.

use crate::ids::{BomId, ItemId, PartId, SupplierId, SupplierPartId};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Document lifecycle status, independent of processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BomStatus {
    Draft,
    Active,
    Archived,
}

impl BomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for BomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a BOM currently sits in the processing pipeline.
///
/// Stage statuses (`Parsing`..`GeneratingPos`) are set by the pipeline as
/// each stage begins; the terminal trio (`AwaitingReview`, `Completed`,
/// `Failed`) is set when a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Parsing,
    Matching,
    Optimizing,
    GeneratingPos,
    AwaitingReview,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Parsing => "parsing",
            Self::Matching => "matching",
            Self::Optimizing => "optimizing",
            Self::GeneratingPos => "generating_pos",
            Self::AwaitingReview => "awaiting_review",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// True while a pipeline stage is actively mutating the document.
    pub fn is_stage_active(&self) -> bool {
        matches!(
            self,
            Self::Parsing | Self::Matching | Self::Optimizing | Self::GeneratingPos
        )
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a line item was matched to a supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Fuzzy,
    Semantic,
    Manual,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Semantic => "semantic",
            Self::Manual => "manual",
        }
    }
}

/// Line item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Parsed but not matched (or matched below the review floor).
    Pending,
    /// Auto-accepted supplier match.
    Matched,
    /// Held for human review.
    NeedsReview,
    /// Human-confirmed (or included in a generated PO).
    Confirmed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Matched => "matched",
            Self::NeedsReview => "needs_review",
            Self::Confirmed => "confirmed",
        }
    }

    /// True for items that count toward `matched_items` and PO generation.
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched | Self::Confirmed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A runner-up supplier candidate, kept for human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeMatch {
    pub supplier_id: SupplierId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_part_id: Option<SupplierPartId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<BigDecimal>,

    /// Match confidence in [0, 1].
    pub confidence: f64,
}

/// A versioned procurement document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bom {
    pub id: BomId,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub version: String,

    pub status: BomStatus,

    /// Source file reference handed to the parsing collaborator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,

    pub processing_status: ProcessingStatus,

    /// 0-100. Non-decreasing within a run; reset only when a new run starts.
    pub processing_progress: f32,

    /// Free-text description of the current activity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_step: Option<String>,

    /// Set iff `processing_status` is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,

    pub total_items: u32,

    /// Count of items with status `Matched` or `Confirmed`.
    /// Invariant: `matched_items <= total_items`.
    pub matched_items: u32,

    /// None until the optimize stage has run for this document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<BigDecimal>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bom {
    /// Create a new draft BOM.
    pub fn new(id: BomId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: None,
            version: "1.0".to_string(),
            status: BomStatus::Draft,
            source_file: None,
            processing_status: ProcessingStatus::Pending,
            processing_progress: 0.0,
            processing_step: None,
            processing_error: None,
            total_items: 0,
            matched_items: 0,
            total_cost: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the source file reference.
    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the document version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Reset processing state for a fresh run.
    ///
    /// This is the only place `processing_progress` may go backwards.
    pub fn begin_run(&mut self) {
        self.processing_status = ProcessingStatus::Pending;
        self.processing_progress = 0.0;
        self.processing_step = None;
        self.processing_error = None;
        self.touch();
    }

    /// Advance processing state. Progress below the current value is clamped
    /// so observers never see it move backwards mid-run.
    pub fn record_progress(
        &mut self,
        status: ProcessingStatus,
        progress: f32,
        step: impl Into<String>,
    ) {
        self.processing_status = status;
        if progress > self.processing_progress {
            self.processing_progress = progress.min(100.0);
        }
        self.processing_step = Some(step.into());
        self.touch();
    }

    /// Mark the run failed, preserving the error for later inspection.
    pub fn fail_processing(&mut self, error: impl Into<String>) {
        self.processing_status = ProcessingStatus::Failed;
        self.processing_error = Some(error.into());
        self.touch();
    }

    /// Mark the run finished: `AwaitingReview` when any item still needs a
    /// human decision, `Completed` otherwise.
    pub fn finish_processing(&mut self, needs_review: bool) {
        self.processing_status = if needs_review {
            ProcessingStatus::AwaitingReview
        } else {
            ProcessingStatus::Completed
        };
        self.processing_progress = 100.0;
        self.processing_step = Some(if needs_review {
            "Awaiting human review".to_string()
        } else {
            "Processing complete".to_string()
        });
        self.touch();
    }

    /// Apply freshly recomputed aggregates.
    pub fn apply_aggregates(&mut self, aggregates: &BomAggregates, set_total_cost: bool) {
        self.total_items = aggregates.total_items;
        self.matched_items = aggregates.matched_items;
        if set_total_cost || self.total_cost.is_some() {
            self.total_cost = Some(aggregates.total_cost.clone());
        }
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// One parsed line of a BOM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomItem {
    pub id: ItemId,

    pub bom_id: BomId,

    /// 1-based position within the document; defines display and
    /// aggregation order.
    pub line_number: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number_raw: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_raw: Option<String>,

    pub quantity: BigDecimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measure: Option<String>,

    /// Resolved catalog part, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_id: Option<PartId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_supplier_id: Option<SupplierId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_supplier_part_id: Option<SupplierPartId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<BigDecimal>,

    /// `quantity * unit_cost`; recomputed whenever either side changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_cost: Option<BigDecimal>,

    /// Match confidence in [0, 1].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_confidence: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_method: Option<MatchMethod>,

    /// Runner-up candidates, ranked descending by confidence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_matches: Vec<AlternativeMatch>,

    pub status: ItemStatus,

    /// Set when `status` is `NeedsReview`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BomItem {
    /// Create a new pending line item.
    pub fn new(id: ItemId, bom_id: BomId, line_number: u32, quantity: BigDecimal) -> Self {
        let now = Utc::now();
        Self {
            id,
            bom_id,
            line_number,
            part_number_raw: None,
            description_raw: None,
            quantity,
            unit_of_measure: None,
            part_id: None,
            matched_supplier_id: None,
            matched_supplier_part_id: None,
            unit_cost: None,
            extended_cost: None,
            match_confidence: None,
            match_method: None,
            alternative_matches: Vec::new(),
            status: ItemStatus::Pending,
            review_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the raw part number.
    pub fn with_part_number(mut self, part_number: impl Into<String>) -> Self {
        self.part_number_raw = Some(part_number.into());
        self
    }

    /// Set the raw description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description_raw = Some(description.into());
        self
    }

    /// Set the unit of measure.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit_of_measure = Some(unit.into());
        self
    }

    /// Recompute `extended_cost` from `quantity` and `unit_cost`.
    /// Must be called after any edit to either field.
    pub fn recompute_extended_cost(&mut self) {
        self.extended_cost = self.unit_cost.as_ref().map(|unit| unit * &self.quantity);
        self.touch();
    }

    /// Set a new unit cost and recompute the extension.
    pub fn set_unit_cost(&mut self, unit_cost: Option<BigDecimal>) {
        self.unit_cost = unit_cost;
        self.recompute_extended_cost();
    }

    /// Record a supplier match on this item. The caller decides the
    /// resulting status (auto-accept vs. review).
    #[allow(clippy::too_many_arguments)]
    pub fn apply_match(
        &mut self,
        supplier_id: SupplierId,
        supplier_part_id: Option<SupplierPartId>,
        unit_price: Option<BigDecimal>,
        confidence: f64,
        method: MatchMethod,
        alternatives: Vec<AlternativeMatch>,
    ) {
        self.matched_supplier_id = Some(supplier_id);
        self.matched_supplier_part_id = supplier_part_id;
        self.match_confidence = Some(confidence);
        self.match_method = Some(method);
        self.alternative_matches = alternatives;
        self.set_unit_cost(unit_price);
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Aggregates derived from a BOM's full item set.
#[derive(Debug, Clone, PartialEq)]
pub struct BomAggregates {
    pub total_items: u32,
    pub matched_items: u32,
    /// Sum of all present extended costs. Whether this is written back to
    /// the BOM depends on whether optimization has completed.
    pub total_cost: BigDecimal,
}

/// Recompute document aggregates from current item state.
pub fn recompute_aggregates(items: &[BomItem]) -> BomAggregates {
    let matched_items = items.iter().filter(|i| i.status.is_matched()).count() as u32;
    let total_cost = items
        .iter()
        .filter_map(|i| i.extended_cost.as_ref())
        .fold(BigDecimal::zero(), |acc, cost| acc + cost);

    BomAggregates {
        total_items: items.len() as u32,
        matched_items,
        total_cost,
    }
}
