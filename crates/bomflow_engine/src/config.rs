//! Workflow configuration.
//!
//! All thresholds live in an explicit struct injected into the components
//! that use them — the confidence gate and the approval workflow never read
//! ambient globals.

use crate::error::WorkflowError;
use bigdecimal::{BigDecimal, Zero};
use std::time::Duration;

/// Tunables for the confidence gate, the approval gate and matcher retries.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// PO totals at or above this amount require human approval.
    pub approval_threshold: BigDecimal,

    /// Matches at or above this confidence are accepted without review.
    pub auto_accept_confidence: f64,

    /// Matches below this confidence are treated as unmatched rather than
    /// queued for review.
    pub review_floor_confidence: f64,

    /// Tax applied to generated POs.
    pub default_tax: BigDecimal,

    /// Shipping applied to generated POs.
    pub default_shipping: BigDecimal,

    /// Attempts against an unavailable matching service before the run
    /// fails.
    pub match_retry_attempts: u32,

    /// Base backoff between matcher retries (grows linearly per attempt).
    pub match_retry_backoff: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            approval_threshold: BigDecimal::from(10_000),
            auto_accept_confidence: 0.85,
            review_floor_confidence: 0.30,
            default_tax: BigDecimal::zero(),
            default_shipping: BigDecimal::zero(),
            match_retry_attempts: 3,
            match_retry_backoff: Duration::from_millis(100),
        }
    }
}

impl WorkflowConfig {
    /// Check the configuration for internally inconsistent values.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if !(0.0..=1.0).contains(&self.auto_accept_confidence) {
            return Err(WorkflowError::Config(format!(
                "auto_accept_confidence must be in [0, 1], got {}",
                self.auto_accept_confidence
            )));
        }
        if !(0.0..=1.0).contains(&self.review_floor_confidence) {
            return Err(WorkflowError::Config(format!(
                "review_floor_confidence must be in [0, 1], got {}",
                self.review_floor_confidence
            )));
        }
        if self.review_floor_confidence > self.auto_accept_confidence {
            return Err(WorkflowError::Config(format!(
                "review_floor_confidence ({}) exceeds auto_accept_confidence ({})",
                self.review_floor_confidence, self.auto_accept_confidence
            )));
        }
        Ok(())
    }
}
