//! Human-in-the-loop approval records.
//!
//! An [`ApprovalRequest`] is the audit record of a gated decision,
//! independent of the status field on the entity being decided. Requests
//! are immutable once they leave `Pending`.

use crate::ids::{ApprovalId, ItemId, PoId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a request is asking a human to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "entity_id", rename_all = "snake_case")]
pub enum ApprovalEntity {
    /// Sign-off on a purchase order above the cost threshold.
    PurchaseOrder(PoId),
    /// Review of a low-confidence supplier match.
    SupplierMatch(ItemId),
}

impl ApprovalEntity {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PurchaseOrder(_) => "purchase_order",
            Self::SupplierMatch(_) => "supplier_match",
        }
    }
}

impl fmt::Display for ApprovalEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PurchaseOrder(id) => write!(f, "purchase_order/{}", id),
            Self::SupplierMatch(id) => write!(f, "supplier_match/{}", id),
        }
    }
}

/// Decision state of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pending or decided human sign-off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalId,

    /// Entity under decision.
    #[serde(flatten)]
    pub entity: ApprovalEntity,

    /// Human-readable summary of what is being decided.
    pub title: String,

    /// Opaque payload describing the decision context.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,

    pub status: ApprovalStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Create a new pending request.
    pub fn new(entity: ApprovalEntity, title: impl Into<String>) -> Self {
        Self {
            id: ApprovalId::new(),
            entity,
            title: title.into(),
            details: serde_json::Value::Null,
            status: ApprovalStatus::Pending,
            review_notes: None,
            reviewed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the decision payload.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Record the human decision. Returns false (and mutates nothing) when
    /// the request has already been decided.
    pub fn decide(&mut self, approved: bool, notes: Option<String>) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        self.review_notes = notes;
        self.reviewed_at = Some(Utc::now());
        true
    }
}
