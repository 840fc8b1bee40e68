//! External collaborator contracts.
//!
//! File parsing and supplier candidate ranking are not implemented here;
//! the pipeline consumes them through these traits. Implementations must be
//! `Send + Sync` — the pipeline may run on a worker thread while observers
//! poll from others.

use bigdecimal::BigDecimal;
use bomflow_schema::{MatchMethod, SupplierId, SupplierPartId};
use thiserror::Error;

/// One line extracted from a source document, before any matching.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLineItem {
    /// 1-based line position.
    pub line_number: u32,
    pub part_number_raw: Option<String>,
    pub description_raw: Option<String>,
    pub quantity: BigDecimal,
    pub unit_of_measure: Option<String>,
}

impl RawLineItem {
    pub fn new(line_number: u32, quantity: BigDecimal) -> Self {
        Self {
            line_number,
            part_number_raw: None,
            description_raw: None,
            quantity,
            unit_of_measure: None,
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
}

/// Errors from the parsing collaborator. Bounded to the parse stage.
#[derive(Debug, Clone, Error)]
pub enum ParserError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("malformed input: {0}")]
    Malformed(String),
}

/// Parsing collaborator: turns a source file reference into raw line items.
pub trait BomParser: Send + Sync {
    fn parse(&self, source_file: &str) -> Result<Vec<RawLineItem>, ParserError>;
}

/// One ranked supplier candidate for a line item.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub supplier_id: SupplierId,
    pub supplier_part_id: Option<SupplierPartId>,
    pub unit_price: Option<BigDecimal>,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub method: MatchMethod,
}

impl MatchCandidate {
    pub fn new(supplier_id: SupplierId, confidence: f64, method: MatchMethod) -> Self {
        Self {
            supplier_id,
            supplier_part_id: None,
            unit_price: None,
            confidence,
            method,
        }
    }

    /// Set the supplier part reference.
    pub fn with_supplier_part(mut self, supplier_part_id: SupplierPartId) -> Self {
        self.supplier_part_id = Some(supplier_part_id);
        self
    }

    /// Set the quoted unit price.
    pub fn with_unit_price(mut self, unit_price: BigDecimal) -> Self {
        self.unit_price = Some(unit_price);
        self
    }
}

/// Errors from the matching collaborator.
#[derive(Debug, Clone, Error)]
pub enum MatchingError {
    /// Recoverable: the match stage retries with backoff before failing
    /// the run.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Matching collaborator: ranks supplier candidates for a line item,
/// descending by confidence. May return an empty list.
pub trait MatchGateway: Send + Sync {
    fn find_candidates(
        &self,
        description: Option<&str>,
        part_number: Option<&str>,
    ) -> Result<Vec<MatchCandidate>, MatchingError>;
}
