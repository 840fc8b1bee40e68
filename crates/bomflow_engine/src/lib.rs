//! Bomflow workflow engine.
//!
//! Drives a Bill of Materials through the processing pipeline
//! (Parse -> Match -> Optimize -> GeneratePos) with human-in-the-loop
//! checkpoints: a confidence-gated review queue for uncertain supplier
//! matches and an approval workflow for purchase orders above the cost
//! threshold.
//!
//! # Design
//!
//! All state lives in the entity store; observers poll it and derive the
//! step view with the pure projection in `bomflow_schema`. Runs are
//! tracked by processing tasks — at most one active run per document —
//! and execute synchronously on the caller's thread, checking for
//! cooperative cancellation at every stage boundary. External concerns
//! (file parsing, candidate ranking) enter through the collaborator
//! traits in [`collaborators`].

pub mod aggregator;
pub mod approvals;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod review;
pub mod status;

pub use aggregator::{GenerationReport, PoAggregator};
pub use approvals::{ApprovalDecision, ApprovalWorkflow};
pub use collaborators::{
    BomParser, MatchCandidate, MatchGateway, MatchingError, ParserError, RawLineItem,
};
pub use config::WorkflowConfig;
pub use error::WorkflowError;
pub use pipeline::{latest_task, Pipeline, RunOutcome};
pub use review::{ItemResolution, ReviewQueue};
pub use status::{get_status, BomStatusView};
