//! Stage pipeline.
//!
//! Drives a BOM through Parse -> Match -> Optimize -> GeneratePos, strictly
//! in order. Each run is tracked by one [`ProcessingTask`]; the store
//! enforces at most one active run per document. Stage boundaries are the
//! checkpoints: effects are committed before status and progress advance,
//! cancellation is observed there, and every stage detects work a previous
//! run already finished instead of redoing it blindly.
//!
//! Progress is mapped onto the fixed bands in `bomflow_schema::progress`;
//! within a run it never decreases as seen by any poller.

use crate::aggregator::{GenerationReport, PoAggregator};
use crate::collaborators::{BomParser, MatchCandidate, MatchGateway, MatchingError};
use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use bomflow_schema::{
    recompute_aggregates, AlternativeMatch, ApprovalEntity, ApprovalRequest, BomId, BomItem,
    ItemId, ItemStatus, PipelineStage, PoId, ProcessingStatus, ProcessingTask, TaskId, TaskState,
    MATCH_BAND,
};
use bomflow_store::EntityStore;
use std::cmp::Ordering;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Alternatives kept per item for human review.
const MAX_ALTERNATIVES: usize = 4;

/// How a run ended.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub task_id: TaskId,
    pub bom_id: BomId,
    /// The BOM's processing status when the run stopped.
    pub status: ProcessingStatus,
    /// True when the run stopped at a stage boundary after cancellation.
    pub cancelled: bool,
    /// Items awaiting human review.
    pub review_items: usize,
    /// Matched items that could not be ordered for lack of a price.
    pub unpriced_items: usize,
    /// Live POs for the document after generation.
    pub purchase_orders: Vec<PoId>,
}

/// The BOM processing pipeline.
pub struct Pipeline {
    store: Arc<EntityStore>,
    parser: Arc<dyn BomParser>,
    matcher: Arc<dyn MatchGateway>,
    config: WorkflowConfig,
    aggregator: PoAggregator,
}

impl Pipeline {
    pub fn new(
        store: Arc<EntityStore>,
        parser: Arc<dyn BomParser>,
        matcher: Arc<dyn MatchGateway>,
        config: WorkflowConfig,
    ) -> Result<Self, WorkflowError> {
        config.validate()?;
        let aggregator = PoAggregator::new(store.clone(), config.clone());
        Ok(Self {
            store,
            parser,
            matcher,
            config,
            aggregator,
        })
    }

    /// Start a new run for a BOM.
    ///
    /// Fails with [`WorkflowError::Conflict`] when a run is already active.
    /// Resets the document's processing state — the only point at which
    /// progress may return to zero.
    pub fn start_run(&self, bom_id: BomId) -> Result<TaskId, WorkflowError> {
        let task = self.store.create_task(bom_id)?;
        self.store.update_bom(bom_id, |bom| bom.begin_run())?;
        info!(bom_id = %bom_id, task_id = %task.id, "processing run queued");
        Ok(task.id)
    }

    /// Execute a queued run to completion on the calling thread.
    pub fn run(&self, task_id: TaskId) -> Result<RunOutcome, WorkflowError> {
        let task = self.store.get_task(task_id)?;
        let bom_id = task.bom_id;

        match task.state {
            TaskState::Queued { .. } => {}
            TaskState::Cancelled { .. } => return self.cancelled_outcome(task_id, bom_id),
            ref other => {
                return Err(WorkflowError::InvalidState {
                    entity: "task",
                    id: task_id.to_string(),
                    expected: "queued",
                    actual: other.status_str().to_string(),
                })
            }
        }
        self.store.update_task(task_id, |t| t.start())?;
        info!(bom_id = %bom_id, task_id = %task_id, "processing run started");

        let mut report = GenerationReport::default();
        for stage in PipelineStage::ALL {
            if self.task_cancelled(task_id)? {
                info!(task_id = %task_id, stage = ?stage, "run cancelled at stage boundary");
                return self.cancelled_outcome(task_id, bom_id);
            }

            self.record_progress(
                bom_id,
                task_id,
                stage.processing_status(),
                stage.band().start,
                stage.label().to_string(),
            )?;

            let result = match stage {
                PipelineStage::Parse => self.run_parse_stage(bom_id, task_id),
                PipelineStage::Match => self.run_match_stage(bom_id, task_id),
                PipelineStage::Optimize => self.run_optimize_stage(bom_id, task_id),
                PipelineStage::GeneratePos => match self.run_generate_stage(bom_id, task_id) {
                    Ok(generated) => {
                        report = generated;
                        Ok(())
                    }
                    Err(err) => Err(err),
                },
            };

            if let Err(err) = result {
                let message = err.to_string();
                warn!(bom_id = %bom_id, task_id = %task_id, stage = ?stage, error = %message, "stage failed");
                let _ = self
                    .store
                    .update_bom(bom_id, |bom| bom.fail_processing(message.as_str()));
                let _ = self
                    .store
                    .update_task(task_id, |task| task.fail(message.as_str()));
                return Err(err);
            }
        }

        let review_items = self
            .store
            .list_items_by_status(bom_id, ItemStatus::NeedsReview)
            .len();
        let bom = self
            .store
            .update_bom(bom_id, |bom| {
                bom.finish_processing(review_items > 0);
                bom.clone()
            })?;

        let summary = serde_json::json!({
            "total_items": bom.total_items,
            "matched_items": bom.matched_items,
            "review_items": review_items,
            "purchase_orders": report.po_ids.len(),
            "unpriced_items": report.unpriced_items,
        });
        self.store.update_task(task_id, |task| {
            task.record_progress(100.0, "Processing complete");
            task.complete(summary.clone());
        })?;

        info!(
            bom_id = %bom_id,
            task_id = %task_id,
            status = %bom.processing_status,
            review_items,
            "processing run finished"
        );
        Ok(RunOutcome {
            task_id,
            bom_id,
            status: bom.processing_status,
            cancelled: false,
            review_items,
            unpriced_items: report.unpriced_items,
            purchase_orders: report.po_ids,
        })
    }

    /// Start and immediately execute a run.
    pub fn process(&self, bom_id: BomId) -> Result<RunOutcome, WorkflowError> {
        let task_id = self.start_run(bom_id)?;
        self.run(task_id)
    }

    /// Request cooperative cancellation. The run stops before its next
    /// stage; the BOM keeps the status of the last completed stage.
    pub fn cancel(&self, task_id: TaskId) -> Result<bool, WorkflowError> {
        let cancelled = self.store.update_task(task_id, |task| task.cancel())?;
        if cancelled {
            info!(task_id = %task_id, "cancellation requested");
        }
        Ok(cancelled)
    }

    fn task_cancelled(&self, task_id: TaskId) -> Result<bool, WorkflowError> {
        Ok(self.store.get_task(task_id)?.is_cancelled())
    }

    fn cancelled_outcome(
        &self,
        task_id: TaskId,
        bom_id: BomId,
    ) -> Result<RunOutcome, WorkflowError> {
        let bom = self.store.get_bom(bom_id)?;
        let review_items = self
            .store
            .list_items_by_status(bom_id, ItemStatus::NeedsReview)
            .len();
        Ok(RunOutcome {
            task_id,
            bom_id,
            status: bom.processing_status,
            cancelled: true,
            review_items,
            unpriced_items: 0,
            purchase_orders: Vec::new(),
        })
    }

    /// Mirror a progress update to the BOM and its task. Both sides clamp,
    /// so observers of either record see a non-decreasing sequence.
    fn record_progress(
        &self,
        bom_id: BomId,
        task_id: TaskId,
        status: ProcessingStatus,
        progress: f32,
        step: String,
    ) -> Result<(), WorkflowError> {
        self.store
            .update_bom(bom_id, |bom| bom.record_progress(status, progress, step.as_str()))?;
        self.store
            .update_task(task_id, |task| task.record_progress(progress, step.as_str()))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------

    fn run_parse_stage(&self, bom_id: BomId, task_id: TaskId) -> Result<(), WorkflowError> {
        let bom = self.store.get_bom(bom_id)?;
        let band = PipelineStage::Parse.band();

        let existing = self.store.list_items(bom_id);
        if !existing.is_empty() {
            debug!(bom_id = %bom_id, count = existing.len(), "parse stage: items already present, skipping");
            return self.record_progress(
                bom_id,
                task_id,
                ProcessingStatus::Parsing,
                band.end,
                format!("Reusing {} parsed line items", existing.len()),
            );
        }

        let source = bom
            .source_file
            .as_deref()
            .ok_or_else(|| WorkflowError::Parse("BOM has no source file".to_string()))?;
        let raw = self.parser.parse(source)?;

        let items = self.store.replace_bom_items(bom_id, raw.len(), |index, id| {
            let row = &raw[index];
            let mut item = BomItem::new(id, bom_id, row.line_number, row.quantity.clone());
            item.part_number_raw = row.part_number_raw.clone();
            item.description_raw = row.description_raw.clone();
            item.unit_of_measure = row.unit_of_measure.clone();
            item
        })?;

        let aggregates = recompute_aggregates(&items);
        self.store
            .update_bom(bom_id, |bom| bom.apply_aggregates(&aggregates, false))?;

        self.record_progress(
            bom_id,
            task_id,
            ProcessingStatus::Parsing,
            band.end,
            format!("Extracted {} line items", items.len()),
        )
    }

    fn run_match_stage(&self, bom_id: BomId, task_id: TaskId) -> Result<(), WorkflowError> {
        let items = self.store.list_items(bom_id);
        let total = items.len().max(1);

        for (index, item) in items.iter().enumerate() {
            // already decided by a previous run or a human — re-validate,
            // don't redo
            if item.status != ItemStatus::Pending || item.match_confidence.is_some() {
                continue;
            }

            let candidates = self.find_candidates_with_retry(item)?;
            self.gate_item(item.id, candidates)?;

            self.record_progress(
                bom_id,
                task_id,
                ProcessingStatus::Matching,
                MATCH_BAND.at((index + 1) as f32 / total as f32),
                format!("Matching item {}/{}", index + 1, total),
            )?;
        }

        let items = self.store.list_items(bom_id);
        let aggregates = recompute_aggregates(&items);
        self.store
            .update_bom(bom_id, |bom| bom.apply_aggregates(&aggregates, false))?;

        self.record_progress(
            bom_id,
            task_id,
            ProcessingStatus::Matching,
            MATCH_BAND.end,
            format!(
                "Matched {}/{} items",
                aggregates.matched_items, aggregates.total_items
            ),
        )
    }

    fn run_optimize_stage(&self, bom_id: BomId, task_id: TaskId) -> Result<(), WorkflowError> {
        let items = self.store.list_items(bom_id);
        let mut priced = 0usize;
        for item in &items {
            if item.unit_cost.is_some() {
                self.store
                    .update_item(item.id, |item| item.recompute_extended_cost())?;
                priced += 1;
            }
        }

        let items = self.store.list_items(bom_id);
        let aggregates = recompute_aggregates(&items);
        self.store
            .update_bom(bom_id, |bom| bom.apply_aggregates(&aggregates, true))?;

        self.record_progress(
            bom_id,
            task_id,
            ProcessingStatus::Optimizing,
            PipelineStage::Optimize.band().end,
            format!("Computed costs for {} priced items", priced),
        )
    }

    fn run_generate_stage(
        &self,
        bom_id: BomId,
        task_id: TaskId,
    ) -> Result<GenerationReport, WorkflowError> {
        let report = self.aggregator.generate_pos(bom_id)?;
        self.record_progress(
            bom_id,
            task_id,
            ProcessingStatus::GeneratingPos,
            PipelineStage::GeneratePos.band().end,
            format!(
                "Created {} and updated {} purchase orders",
                report.created, report.updated
            ),
        )?;
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Confidence gate
    // ------------------------------------------------------------------

    fn find_candidates_with_retry(
        &self,
        item: &BomItem,
    ) -> Result<Vec<MatchCandidate>, WorkflowError> {
        let attempts = self.config.match_retry_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            match self.matcher.find_candidates(
                item.description_raw.as_deref(),
                item.part_number_raw.as_deref(),
            ) {
                Ok(candidates) => return Ok(candidates),
                Err(MatchingError::Unavailable(reason)) => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(WorkflowError::MatchingUnavailable(reason));
                    }
                    let backoff = self.config.match_retry_backoff * attempt;
                    warn!(
                        item_id = %item.id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        reason = %reason,
                        "matching service unavailable, retrying"
                    );
                    thread::sleep(backoff);
                }
            }
        }
    }

    /// Apply the three-way confidence policy to one item.
    fn gate_item(
        &self,
        item_id: ItemId,
        mut candidates: Vec<MatchCandidate>,
    ) -> Result<(), WorkflowError> {
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });

        if candidates.is_empty() {
            debug!(item_id = %item_id, "no candidates, item stays unmatched");
            return Ok(());
        }
        let top = candidates.remove(0);
        if top.confidence < self.config.review_floor_confidence {
            debug!(
                item_id = %item_id,
                confidence = top.confidence,
                "top candidate below review floor, item stays unmatched"
            );
            return Ok(());
        }

        let alternatives = candidates
            .into_iter()
            .take(MAX_ALTERNATIVES)
            .map(|candidate| AlternativeMatch {
                supplier_id: candidate.supplier_id,
                supplier_part_id: candidate.supplier_part_id,
                unit_price: candidate.unit_price,
                confidence: candidate.confidence,
            })
            .collect();

        let auto_accepted = top.confidence >= self.config.auto_accept_confidence;
        let item = self.store.update_item(item_id, |item| {
            item.apply_match(
                top.supplier_id,
                top.supplier_part_id,
                top.unit_price.clone(),
                top.confidence,
                top.method,
                alternatives,
            );
            if auto_accepted {
                item.status = ItemStatus::Matched;
                item.review_reason = None;
            } else {
                item.status = ItemStatus::NeedsReview;
                item.review_reason =
                    Some(format!("Low confidence match ({:.0}%)", top.confidence * 100.0));
            }
            item.clone()
        })?;

        if !auto_accepted {
            let entity = ApprovalEntity::SupplierMatch(item_id);
            if self.store.find_pending_approval(entity).is_none() {
                let subject = item
                    .part_number_raw
                    .clone()
                    .or_else(|| item.description_raw.clone())
                    .unwrap_or_else(|| format!("line {}", item.line_number));
                let request = ApprovalRequest::new(entity, format!("Review match: {}", subject))
                    .with_details(serde_json::json!({
                        "bom_id": item.bom_id,
                        "line_number": item.line_number,
                        "part_number": item.part_number_raw,
                        "description": item.description_raw,
                        "match_confidence": top.confidence,
                        "alternatives": item.alternative_matches.len(),
                    }));
                self.store.insert_approval(request);
            }
        }

        Ok(())
    }
}

/// Convenience: the active or most recent task for a BOM.
pub fn latest_task(store: &EntityStore, bom_id: BomId) -> Option<ProcessingTask> {
    store
        .active_task(bom_id)
        .or_else(|| store.list_tasks(bom_id).into_iter().next())
}
