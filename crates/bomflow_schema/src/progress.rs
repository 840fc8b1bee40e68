//! Progress bands and the step projection.
//!
//! Each pipeline stage owns a fixed slice of the 0-100 progress range.
//! The bands are a contract between the pipeline (writer) and every
//! polling observer (reader): [`project_steps`] derives the discrete
//! step view from a bare percentage, deterministically and without any
//! observer-side state.

use crate::bom::ProcessingStatus;
use serde::{Deserialize, Serialize};

/// A stage's slice of the overall progress range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressBand {
    pub start: f32,
    pub end: f32,
}

impl ProgressBand {
    /// Progress value at `fraction` (clamped to [0, 1]) through this band.
    pub fn at(&self, fraction: f32) -> f32 {
        self.start + (self.end - self.start) * fraction.clamp(0.0, 1.0)
    }
}

pub const PARSE_BAND: ProgressBand = ProgressBand {
    start: 0.0,
    end: 25.0,
};
pub const MATCH_BAND: ProgressBand = ProgressBand {
    start: 25.0,
    end: 60.0,
};
pub const OPTIMIZE_BAND: ProgressBand = ProgressBand {
    start: 60.0,
    end: 70.0,
};
pub const GENERATE_POS_BAND: ProgressBand = ProgressBand {
    start: 70.0,
    end: 100.0,
};

pub const PROGRESS_COMPLETE: f32 = 100.0;

/// The ordered pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Parse,
    Match,
    Optimize,
    GeneratePos,
}

impl PipelineStage {
    /// Execution order. Stages never run out of this order and are never
    /// skipped past (only over, when already complete).
    pub const ALL: [PipelineStage; 4] = [
        PipelineStage::Parse,
        PipelineStage::Match,
        PipelineStage::Optimize,
        PipelineStage::GeneratePos,
    ];

    pub fn band(&self) -> ProgressBand {
        match self {
            Self::Parse => PARSE_BAND,
            Self::Match => MATCH_BAND,
            Self::Optimize => OPTIMIZE_BAND,
            Self::GeneratePos => GENERATE_POS_BAND,
        }
    }

    /// The BOM processing status announced while this stage runs.
    pub fn processing_status(&self) -> ProcessingStatus {
        match self {
            Self::Parse => ProcessingStatus::Parsing,
            Self::Match => ProcessingStatus::Matching,
            Self::Optimize => ProcessingStatus::Optimizing,
            Self::GeneratePos => ProcessingStatus::GeneratingPos,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Parse => "Parsing line items",
            Self::Match => "Finding supplier matches",
            Self::Optimize => "Computing costs",
            Self::GeneratePos => "Creating purchase orders",
        }
    }
}

/// Observer-facing state of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Completed,
}

/// One row of the projected step view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStep {
    pub stage: PipelineStage,
    pub state: StepState,
}

/// Project a raw progress percentage onto the discrete step view.
///
/// Pure and deterministic: identical input yields identical output, so
/// independently polling observers always agree. Input is clamped to
/// [0, 100]. A stage is `Completed` at or beyond its band end, `Running`
/// strictly inside its band, `Pending` otherwise — so 0 projects to all
/// pending and 100 to all completed.
pub fn project_steps(progress: f32) -> Vec<StageStep> {
    let progress = progress.clamp(0.0, PROGRESS_COMPLETE);
    PipelineStage::ALL
        .iter()
        .map(|&stage| {
            let band = stage.band();
            let state = if progress >= band.end {
                StepState::Completed
            } else if progress > band.start {
                StepState::Running
            } else {
                StepState::Pending
            };
            StageStep { stage, state }
        })
        .collect()
}
