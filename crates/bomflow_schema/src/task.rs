//! Processing task records.
//!
//! One [`ProcessingTask`] exists per pipeline run. Its lifecycle is
//! independent of the BOM's own processing fields: the task answers "is a
//! run active, and how did it end", the BOM answers "what stage is the
//! document logically in". Multiple historical tasks may exist per BOM; at
//! most one may be active at a time (enforced by the store primitive that
//! creates them).

use crate::ids::{BomId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task state with the timestamps of each transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskState {
    /// Created, waiting for the pipeline to pick it up.
    Queued { queued_at: DateTime<Utc> },
    /// Pipeline is executing stages.
    Running { started_at: DateTime<Utc> },
    /// All stages finished.
    Completed {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        /// Run summary (counts of parsed/matched/review/PO results).
        summary: serde_json::Value,
    },
    /// A stage failed; the run stopped.
    Failed {
        started_at: Option<DateTime<Utc>>,
        failed_at: DateTime<Utc>,
        error: String,
    },
    /// Cancelled cooperatively at a stage boundary.
    Cancelled { cancelled_at: DateTime<Utc> },
}

impl TaskState {
    pub fn status_str(&self) -> &'static str {
        match self {
            Self::Queued { .. } => "queued",
            Self::Running { .. } => "running",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }

    /// Queued or Running: counts toward the one-active-run-per-BOM
    /// invariant.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued { .. } | Self::Running { .. })
    }
}

/// One pipeline run for one BOM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingTask {
    pub id: TaskId,

    pub bom_id: BomId,

    pub state: TaskState,

    /// 0-100, non-decreasing for the life of the task.
    pub progress: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl ProcessingTask {
    /// Create a new queued task.
    pub fn new(id: TaskId, bom_id: BomId) -> Self {
        let now = Utc::now();
        Self {
            id,
            bom_id,
            state: TaskState::Queued { queued_at: now },
            progress: 0.0,
            current_step: None,
            created_at: now,
        }
    }

    /// Transition to running. Only a queued task starts; in particular a
    /// cancellation that raced the pickup is preserved.
    pub fn start(&mut self) {
        if let TaskState::Queued { .. } = self.state {
            self.state = TaskState::Running {
                started_at: Utc::now(),
            };
        }
    }

    /// Record progress. Values below the current progress are ignored so
    /// any poller observes a non-decreasing sequence.
    pub fn record_progress(&mut self, progress: f32, step: impl Into<String>) {
        if progress > self.progress {
            self.progress = progress.min(100.0);
        }
        self.current_step = Some(step.into());
    }

    /// Transition to completed with a run summary.
    pub fn complete(&mut self, summary: serde_json::Value) {
        if let TaskState::Running { started_at } = self.state {
            self.state = TaskState::Completed {
                started_at,
                completed_at: Utc::now(),
                summary,
            };
            self.progress = 100.0;
        }
    }

    /// Transition to failed, keeping the error for inspection.
    pub fn fail(&mut self, error: impl Into<String>) {
        let started_at = match self.state {
            TaskState::Running { started_at } => Some(started_at),
            _ => None,
        };
        self.state = TaskState::Failed {
            started_at,
            failed_at: Utc::now(),
            error: error.into(),
        };
    }

    /// Request cancellation. No-op on terminal states; returns whether the
    /// task was actually cancelled.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = TaskState::Cancelled {
            cancelled_at: Utc::now(),
        };
        true
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.state, TaskState::Cancelled { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            TaskState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}
