//! End-to-end workflow tests: pipeline runs, review resolution, approval
//! gating and PO generation against stub collaborators.

use anyhow::Result;
use bigdecimal::{BigDecimal, Zero};
use bomflow_engine::{
    get_status, latest_task, ApprovalDecision, ApprovalWorkflow, BomParser, ItemResolution,
    MatchCandidate, MatchGateway, MatchingError, ParserError, Pipeline, PoAggregator, RawLineItem,
    ReviewQueue, WorkflowConfig, WorkflowError,
};
use bomflow_schema::{
    ApprovalStatus, Bom, BomId, ItemStatus, MatchMethod, PoStatus, ProcessingStatus, StepState,
    SupplierId, SupplierPartId,
};
use bomflow_store::EntityStore;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn test_config() -> WorkflowConfig {
    WorkflowConfig {
        match_retry_backoff: Duration::from_millis(1),
        ..WorkflowConfig::default()
    }
}

// ----------------------------------------------------------------------
// Stub collaborators
// ----------------------------------------------------------------------

struct StubParser {
    items: Vec<RawLineItem>,
    failure: Option<ParserError>,
}

impl StubParser {
    fn with_items(items: Vec<RawLineItem>) -> Self {
        Self {
            items,
            failure: None,
        }
    }

    fn failing(failure: ParserError) -> Self {
        Self {
            items: Vec::new(),
            failure: Some(failure),
        }
    }
}

impl BomParser for StubParser {
    fn parse(&self, _source_file: &str) -> Result<Vec<RawLineItem>, ParserError> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.items.clone()),
        }
    }
}

struct TableMatcher {
    by_part: HashMap<String, Vec<MatchCandidate>>,
}

impl MatchGateway for TableMatcher {
    fn find_candidates(
        &self,
        _description: Option<&str>,
        part_number: Option<&str>,
    ) -> Result<Vec<MatchCandidate>, MatchingError> {
        Ok(part_number
            .and_then(|part| self.by_part.get(part))
            .cloned()
            .unwrap_or_default())
    }
}

/// Fails the first `failures` calls, then delegates.
struct FlakyMatcher {
    inner: TableMatcher,
    failures_remaining: AtomicU32,
}

impl MatchGateway for FlakyMatcher {
    fn find_candidates(
        &self,
        description: Option<&str>,
        part_number: Option<&str>,
    ) -> Result<Vec<MatchCandidate>, MatchingError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(MatchingError::Unavailable("search index offline".to_string()));
        }
        self.inner.find_candidates(description, part_number)
    }
}

// ----------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------

fn candidate(supplier: u64, confidence: f64, price: &str) -> MatchCandidate {
    MatchCandidate::new(SupplierId::new(supplier), confidence, MatchMethod::Semantic)
        .with_supplier_part(SupplierPartId::new(supplier * 100))
        .with_unit_price(dec(price))
}

fn raw(line: u32, part: &str, quantity: &str) -> RawLineItem {
    RawLineItem::new(line, dec(quantity))
        .with_part_number(part)
        .with_description(format!("Part {}", part))
        .with_unit("EA")
}

fn new_bom(store: &Arc<EntityStore>) -> BomId {
    store
        .insert_bom(|id| Bom::new(id, "Widget Assembly").with_source_file("widget_assembly.csv"))
        .id
}

fn pipeline_with(
    store: &Arc<EntityStore>,
    parser: impl BomParser + 'static,
    matcher: impl MatchGateway + 'static,
    config: WorkflowConfig,
) -> Pipeline {
    Pipeline::new(store.clone(), Arc::new(parser), Arc::new(matcher), config).unwrap()
}

/// The reference scenario: 10 lines, 6 confidently matched (two
/// suppliers), 3 in the review band, 1 below the floor.
fn ten_item_fixture(store: &Arc<EntityStore>) -> (Pipeline, BomId) {
    let mut items = Vec::new();
    let mut by_part = HashMap::new();
    for line in 1..=10u32 {
        let part = format!("P{}", line);
        items.push(raw(line, &part, "1"));
        let (supplier, confidence) = match line {
            1..=3 => (1, 0.9),
            4..=6 => (2, 0.9),
            7..=9 => (3, 0.5),
            _ => (4, 0.1),
        };
        by_part.insert(
            part,
            vec![
                candidate(supplier, confidence, "10.00"),
                candidate(5, (confidence - 0.05).max(0.01), "9.50"),
            ],
        );
    }

    let bom_id = new_bom(store);
    let pipeline = pipeline_with(
        store,
        StubParser::with_items(items),
        TableMatcher { by_part },
        test_config(),
    );
    (pipeline, bom_id)
}

// ----------------------------------------------------------------------
// Pipeline runs
// ----------------------------------------------------------------------

#[test]
fn test_full_run_matches_gates_and_generates() {
    init_tracing();
    let store = Arc::new(EntityStore::new());
    let (pipeline, bom_id) = ten_item_fixture(&store);

    let outcome = pipeline.process(bom_id).unwrap();
    assert!(!outcome.cancelled);
    assert_eq!(outcome.status, ProcessingStatus::AwaitingReview);
    assert_eq!(outcome.review_items, 3);
    assert_eq!(outcome.unpriced_items, 0);
    // two suppliers with confident matches -> two POs
    assert_eq!(outcome.purchase_orders.len(), 2);

    let bom = store.get_bom(bom_id).unwrap();
    assert_eq!(bom.total_items, 10);
    assert_eq!(bom.matched_items, 6);
    assert!(bom.matched_items <= bom.total_items);
    assert_eq!(bom.processing_progress, 100.0);
    // review-band items were priced too: 9 items at 10.00 each
    assert_eq!(bom.total_cost, Some(dec("90.00")));

    // three review requests, least certain surfaced first
    let review = ReviewQueue::new(store.clone());
    let queue = review.queue(bom_id).unwrap();
    assert_eq!(queue.len(), 3);
    assert!(queue
        .windows(2)
        .all(|pair| pair[0].match_confidence <= pair[1].match_confidence));
    assert_eq!(
        store.list_approvals(Some(ApprovalStatus::Pending)).len(),
        3
    );

    // the unmatched line stays pending with no review entry
    let pending = store.list_items_by_status(bom_id, ItemStatus::Pending);
    assert_eq!(pending.len(), 1);
    assert!(pending[0].match_confidence.is_none());

    // confident items were confirmed by PO generation
    assert_eq!(
        store
            .list_items_by_status(bom_id, ItemStatus::Confirmed)
            .len(),
        6
    );

    let task = store.get_task(outcome.task_id).unwrap();
    assert_eq!(task.state.status_str(), "completed");
    assert_eq!(task.progress, 100.0);
}

#[test]
fn test_status_surface_and_step_projection() {
    let store = Arc::new(EntityStore::new());
    let (pipeline, bom_id) = ten_item_fixture(&store);
    pipeline.process(bom_id).unwrap();

    let view = get_status(&store, bom_id).unwrap();
    assert_eq!(view.processing_status, ProcessingStatus::AwaitingReview);
    assert_eq!(view.total_items, 10);
    assert_eq!(view.matched_items, 6);
    assert!(view
        .steps()
        .iter()
        .all(|step| step.state == StepState::Completed));

    let missing = get_status(&store, BomId::new(999));
    assert!(matches!(missing, Err(WorkflowError::NotFound { .. })));
}

#[test]
fn test_second_run_conflicts_while_active() {
    let store = Arc::new(EntityStore::new());
    let (pipeline, bom_id) = ten_item_fixture(&store);

    let task_id = pipeline.start_run(bom_id).unwrap();
    let err = pipeline.start_run(bom_id).unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict { .. }));

    pipeline.run(task_id).unwrap();
    // terminal task releases the slot
    assert!(pipeline.start_run(bom_id).is_ok());
}

#[test]
fn test_rerun_skips_completed_work() {
    let store = Arc::new(EntityStore::new());
    let (pipeline, bom_id) = ten_item_fixture(&store);

    pipeline.process(bom_id).unwrap();
    let first_items: Vec<_> = store
        .list_items(bom_id)
        .into_iter()
        .map(|item| item.id)
        .collect();
    let first_pos = store.list_pos(bom_id);

    let outcome = pipeline.process(bom_id).unwrap();
    assert_eq!(outcome.status, ProcessingStatus::AwaitingReview);

    // parse reused existing rows, match re-validated instead of redoing
    let second_items: Vec<_> = store
        .list_items(bom_id)
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(first_items, second_items);

    // no duplicate POs for an unchanged matched set
    let second_pos = store.list_pos(bom_id);
    assert_eq!(first_pos.len(), second_pos.len());
    let first_ids: Vec<_> = first_pos.iter().map(|po| po.id).collect();
    let second_ids: Vec<_> = second_pos.iter().map(|po| po.id).collect();
    assert_eq!(first_ids, second_ids);
}

#[test]
fn test_parse_failure_persists_and_new_run_recovers() -> Result<()> {
    let store = Arc::new(EntityStore::new());
    let bom_id = new_bom(&store);

    let broken = pipeline_with(
        &store,
        StubParser::failing(ParserError::Malformed("row 3 has no quantity".to_string())),
        TableMatcher {
            by_part: HashMap::new(),
        },
        test_config(),
    );
    let err = broken.process(bom_id).unwrap_err();
    assert!(matches!(err, WorkflowError::Parse(_)));

    // failed runs stay inspectable
    let bom = store.get_bom(bom_id)?;
    assert_eq!(bom.processing_status, ProcessingStatus::Failed);
    let message = bom.processing_error.unwrap();
    assert!(message.contains("row 3 has no quantity"));
    let task = latest_task(&store, bom_id).unwrap();
    assert_eq!(task.state.status_str(), "failed");

    // retry is an explicit new run with the slot free again
    let fixed = pipeline_with(
        &store,
        StubParser::with_items(vec![raw(1, "P1", "2")]),
        TableMatcher {
            by_part: HashMap::from([("P1".to_string(), vec![candidate(1, 0.95, "4.00")])]),
        },
        test_config(),
    );
    let outcome = fixed.process(bom_id)?;
    assert_eq!(outcome.status, ProcessingStatus::Completed);
    let bom = store.get_bom(bom_id)?;
    assert!(bom.processing_error.is_none());
    assert_eq!(bom.total_cost, Some(dec("8.00")));
    Ok(())
}

#[test]
fn test_unsupported_format_is_bounded_to_parse() {
    let store = Arc::new(EntityStore::new());
    let bom_id = new_bom(&store);

    let pipeline = pipeline_with(
        &store,
        StubParser::failing(ParserError::UnsupportedFormat(".docx".to_string())),
        TableMatcher {
            by_part: HashMap::new(),
        },
        test_config(),
    );
    let err = pipeline.process(bom_id).unwrap_err();
    assert!(matches!(err, WorkflowError::UnsupportedFormat(_)));
    assert_eq!(
        store.get_bom(bom_id).unwrap().processing_status,
        ProcessingStatus::Failed
    );
}

#[test]
fn test_matcher_retries_through_transient_outage() {
    let store = Arc::new(EntityStore::new());
    let bom_id = new_bom(&store);

    let matcher = FlakyMatcher {
        inner: TableMatcher {
            by_part: HashMap::from([("P1".to_string(), vec![candidate(1, 0.9, "5.00")])]),
        },
        failures_remaining: AtomicU32::new(2),
    };
    let pipeline = pipeline_with(
        &store,
        StubParser::with_items(vec![raw(1, "P1", "1")]),
        matcher,
        test_config(),
    );

    let outcome = pipeline.process(bom_id).unwrap();
    assert_eq!(outcome.status, ProcessingStatus::Completed);
    assert_eq!(store.get_bom(bom_id).unwrap().matched_items, 1);
}

#[test]
fn test_matcher_outage_fails_run_after_retries() {
    let store = Arc::new(EntityStore::new());
    let bom_id = new_bom(&store);

    let matcher = FlakyMatcher {
        inner: TableMatcher {
            by_part: HashMap::new(),
        },
        failures_remaining: AtomicU32::new(10),
    };
    let pipeline = pipeline_with(
        &store,
        StubParser::with_items(vec![raw(1, "P1", "1")]),
        matcher,
        test_config(),
    );

    let err = pipeline.process(bom_id).unwrap_err();
    assert!(matches!(err, WorkflowError::MatchingUnavailable(_)));
    let bom = store.get_bom(bom_id).unwrap();
    assert_eq!(bom.processing_status, ProcessingStatus::Failed);
    assert!(bom.processing_error.unwrap().contains("search index offline"));
}

#[test]
fn test_cancel_stops_at_stage_boundary() {
    let store = Arc::new(EntityStore::new());
    let (pipeline, bom_id) = ten_item_fixture(&store);

    let task_id = pipeline.start_run(bom_id).unwrap();
    assert!(pipeline.cancel(task_id).unwrap());

    let outcome = pipeline.run(task_id).unwrap();
    assert!(outcome.cancelled);
    // nothing ran: document still pending, not failed
    let bom = store.get_bom(bom_id).unwrap();
    assert_eq!(bom.processing_status, ProcessingStatus::Pending);
    assert!(store.list_items(bom_id).is_empty());
    assert!(store.get_task(task_id).unwrap().is_cancelled());

    // a cancelled task frees the slot for a fresh run
    let outcome = pipeline.process(bom_id).unwrap();
    assert!(!outcome.cancelled);

    // cancelling a finished task is a no-op
    assert!(!pipeline.cancel(outcome.task_id).unwrap());
}

#[test]
fn test_progress_is_monotonic_under_concurrent_polling() {
    let store = Arc::new(EntityStore::new());
    let (pipeline, bom_id) = ten_item_fixture(&store);
    let pipeline = Arc::new(pipeline);

    let task_id = pipeline.start_run(bom_id).unwrap();
    let runner = {
        let pipeline = pipeline.clone();
        std::thread::spawn(move || pipeline.run(task_id))
    };

    let mut samples = Vec::new();
    loop {
        let task = store.get_task(task_id).unwrap();
        samples.push(task.progress);
        if task.state.is_terminal() {
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    runner.join().unwrap().unwrap();

    assert!(
        samples.windows(2).all(|pair| pair[0] <= pair[1]),
        "progress regressed: {:?}",
        samples
    );
    assert_eq!(store.get_task(task_id).unwrap().progress, 100.0);
}

// ----------------------------------------------------------------------
// Review queue
// ----------------------------------------------------------------------

#[test]
fn test_resolve_item_confirms_and_recomputes() {
    let store = Arc::new(EntityStore::new());
    let (pipeline, bom_id) = ten_item_fixture(&store);
    pipeline.process(bom_id).unwrap();

    let review = ReviewQueue::new(store.clone());
    let queue = review.queue(bom_id).unwrap();
    let target = queue[0].clone();

    // pick the runner-up supplier; its quoted price comes along
    let resolved = review
        .resolve_item(
            target.id,
            ItemResolution::SelectSupplier {
                supplier_id: SupplierId::new(5),
                supplier_part_id: None,
                unit_cost: None,
            },
        )
        .unwrap();
    assert_eq!(resolved.status, ItemStatus::Confirmed);
    assert_eq!(resolved.match_method, Some(MatchMethod::Manual));
    assert_eq!(resolved.match_confidence, Some(1.0));
    assert_eq!(resolved.review_reason, None);
    assert_eq!(resolved.matched_supplier_id, Some(SupplierId::new(5)));
    assert_eq!(resolved.unit_cost, Some(dec("9.50")));
    assert_eq!(resolved.extended_cost, Some(dec("9.50")));

    // aggregates follow the human override
    let bom = store.get_bom(bom_id).unwrap();
    assert_eq!(bom.matched_items, 7);
    assert_eq!(bom.total_cost, Some(dec("89.50")));
    assert_eq!(review.queue(bom_id).unwrap().len(), 2);

    // the match review record is decided
    let pending = store.list_approvals(Some(ApprovalStatus::Pending));
    assert_eq!(pending.len(), 2);
}

#[test]
fn test_manual_price_overrides_supplier_price() {
    let store = Arc::new(EntityStore::new());
    let bom_id = new_bom(&store);
    let pipeline = pipeline_with(
        &store,
        StubParser::with_items(vec![raw(1, "P1", "4")]),
        TableMatcher {
            by_part: HashMap::from([("P1".to_string(), vec![candidate(1, 0.5, "2.50")])]),
        },
        test_config(),
    );
    pipeline.process(bom_id).unwrap();

    let review = ReviewQueue::new(store.clone());
    let item = review.queue(bom_id).unwrap().remove(0);
    assert_eq!(item.extended_cost, Some(dec("10.00")));

    let resolved = review
        .resolve_item(
            item.id,
            ItemResolution::ManualPrice {
                unit_cost: dec("3.00"),
            },
        )
        .unwrap();
    assert_eq!(resolved.unit_cost, Some(dec("3.00")));
    assert_eq!(resolved.extended_cost, Some(dec("12.00")));
    assert_eq!(
        store.get_bom(bom_id).unwrap().total_cost,
        Some(dec("12.00"))
    );

    // re-resolution is a correction, not an error
    let corrected = review
        .resolve_item(
            resolved.id,
            ItemResolution::ManualPrice {
                unit_cost: dec("2.75"),
            },
        )
        .unwrap();
    assert_eq!(corrected.extended_cost, Some(dec("11.00")));
    assert_eq!(
        store.get_bom(bom_id).unwrap().total_cost,
        Some(dec("11.00"))
    );
}

// ----------------------------------------------------------------------
// PO generation
// ----------------------------------------------------------------------

#[test]
fn test_generation_is_idempotent_by_content() {
    let store = Arc::new(EntityStore::new());
    let (pipeline, bom_id) = ten_item_fixture(&store);
    pipeline.process(bom_id).unwrap();

    let aggregator = PoAggregator::new(store.clone(), test_config());
    let before = store.list_pos(bom_id);

    let report = aggregator.generate_pos(bom_id).unwrap();
    let after = store.list_pos(bom_id);
    assert_eq!(before.len(), after.len());
    assert_eq!(report.created, 0);
    // both POs were auto-approved below the threshold, so they are left
    // untouched rather than rewritten
    assert_eq!(report.skipped, 2);
}

#[test]
fn test_resolved_item_joins_po_on_regeneration() {
    let store = Arc::new(EntityStore::new());
    let (pipeline, bom_id) = ten_item_fixture(&store);
    pipeline.process(bom_id).unwrap();

    let review = ReviewQueue::new(store.clone());
    let target = review.queue(bom_id).unwrap().remove(0);
    review
        .resolve_item(
            target.id,
            ItemResolution::SelectSupplier {
                supplier_id: SupplierId::new(5),
                supplier_part_id: None,
                unit_cost: None,
            },
        )
        .unwrap();

    let aggregator = PoAggregator::new(store.clone(), test_config());
    let report = aggregator.generate_pos(bom_id).unwrap();
    assert_eq!(report.created, 1);

    let new_po = store
        .find_po_for_supplier(bom_id, SupplierId::new(5))
        .unwrap();
    assert_eq!(new_po.item_count(), 1);
    assert_eq!(new_po.items[0].bom_item_id, Some(target.id));
    assert_eq!(new_po.subtotal, dec("9.50"));
}

#[test]
fn test_unpriced_matched_items_are_reported_not_dropped() {
    let store = Arc::new(EntityStore::new());
    let bom_id = new_bom(&store);
    let unpriced_candidate =
        MatchCandidate::new(SupplierId::new(1), 0.95, MatchMethod::Exact);
    let pipeline = pipeline_with(
        &store,
        StubParser::with_items(vec![raw(1, "P1", "3")]),
        TableMatcher {
            by_part: HashMap::from([("P1".to_string(), vec![unpriced_candidate])]),
        },
        test_config(),
    );

    let outcome = pipeline.process(bom_id).unwrap();
    assert_eq!(outcome.status, ProcessingStatus::Completed);
    assert_eq!(outcome.unpriced_items, 1);
    assert!(outcome.purchase_orders.is_empty());
    assert!(store.list_pos(bom_id).is_empty());

    // the item stays matched and flagged for pricing
    let item = store.list_items(bom_id).remove(0);
    assert_eq!(item.status, ItemStatus::Matched);
    assert!(item.unit_cost.is_none());
    assert_eq!(
        store.get_bom(bom_id).unwrap().total_cost,
        Some(BigDecimal::zero())
    );
}

// ----------------------------------------------------------------------
// Approval workflow
// ----------------------------------------------------------------------

fn expensive_fixture(store: &Arc<EntityStore>) -> (Pipeline, BomId) {
    let bom_id = new_bom(store);
    let pipeline = pipeline_with(
        store,
        StubParser::with_items(vec![raw(1, "P1", "2")]),
        TableMatcher {
            by_part: HashMap::from([("P1".to_string(), vec![candidate(1, 0.95, "6000.00")])]),
        },
        test_config(),
    );
    (pipeline, bom_id)
}

#[test]
fn test_po_above_threshold_starts_pending_approval() {
    let store = Arc::new(EntityStore::new());
    let (pipeline, bom_id) = expensive_fixture(&store);

    let outcome = pipeline.process(bom_id).unwrap();
    let po = store.get_po(outcome.purchase_orders[0]).unwrap();
    assert_eq!(po.total, dec("12000.00"));
    assert!(po.requires_approval);
    assert_eq!(po.status, PoStatus::PendingApproval);
    // the gate decision is independently auditable
    assert_eq!(store.list_approvals(Some(ApprovalStatus::Pending)).len(), 1);
}

#[test]
fn test_approve_send_happy_path() {
    let store = Arc::new(EntityStore::new());
    let (pipeline, bom_id) = expensive_fixture(&store);
    let outcome = pipeline.process(bom_id).unwrap();
    let po_id = outcome.purchase_orders[0];

    let workflow = ApprovalWorkflow::new(store.clone(), test_config());
    let po = workflow
        .approve(po_id, ApprovalDecision::approve("sam").with_notes("ok"))
        .unwrap();
    assert_eq!(po.status, PoStatus::Approved);
    assert_eq!(po.approved_by.as_deref(), Some("sam"));
    assert!(po.approved_at.is_some());

    let po = workflow.send(po_id).unwrap();
    assert_eq!(po.status, PoStatus::Sent);
    assert!(po.sent_at.is_some());

    // the audit record carries the decision
    let decided = store.list_approvals(Some(ApprovalStatus::Approved));
    assert_eq!(decided.len(), 1);
    assert_eq!(decided[0].review_notes.as_deref(), Some("ok"));
}

#[test]
fn test_wrong_state_transitions_fail_without_mutation() {
    let store = Arc::new(EntityStore::new());
    let (pipeline, bom_id) = expensive_fixture(&store);
    let outcome = pipeline.process(bom_id).unwrap();
    let po_id = outcome.purchase_orders[0];

    let workflow = ApprovalWorkflow::new(store.clone(), test_config());

    // sending before approval names both states
    let err = workflow.send(po_id).unwrap_err();
    match err {
        WorkflowError::InvalidState {
            expected, actual, ..
        } => {
            assert_eq!(expected, "approved");
            assert_eq!(actual, "pending_approval");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        store.get_po(po_id).unwrap().status,
        PoStatus::PendingApproval
    );

    workflow
        .approve(po_id, ApprovalDecision::approve("sam"))
        .unwrap();
    // approving twice fails: no longer pending
    let err = workflow
        .approve(po_id, ApprovalDecision::approve("sam"))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { .. }));

    // submit is only valid from draft
    let err = workflow.submit(po_id).unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { .. }));
}

#[test]
fn test_reject_returns_po_to_draft_for_rework() {
    let store = Arc::new(EntityStore::new());
    let (pipeline, bom_id) = expensive_fixture(&store);
    let outcome = pipeline.process(bom_id).unwrap();
    let po_id = outcome.purchase_orders[0];

    let workflow = ApprovalWorkflow::new(store.clone(), test_config());
    let po = workflow
        .approve(po_id, ApprovalDecision::reject("price needs negotiation"))
        .unwrap();
    assert_eq!(po.status, PoStatus::Draft);
    assert_eq!(
        po.rejection_reason.as_deref(),
        Some("price needs negotiation")
    );
    assert!(po.approved_by.is_none());
    assert!(po.approved_at.is_none());

    let rejected = store.list_approvals(Some(ApprovalStatus::Rejected));
    assert_eq!(rejected.len(), 1);

    // rework concludes with a fresh submission and a fresh audit record
    let po = workflow.submit(po_id).unwrap();
    assert_eq!(po.status, PoStatus::PendingApproval);
    assert_eq!(store.list_approvals(Some(ApprovalStatus::Pending)).len(), 1);
}

#[test]
fn test_below_threshold_skip_is_explicit_approval() {
    let store = Arc::new(EntityStore::new());
    let bom_id = new_bom(&store);
    let pipeline = pipeline_with(
        &store,
        StubParser::with_items(vec![raw(1, "P1", "1")]),
        TableMatcher {
            by_part: HashMap::from([("P1".to_string(), vec![candidate(1, 0.95, "15.00")])]),
        },
        test_config(),
    );

    let outcome = pipeline.process(bom_id).unwrap();
    let po = store.get_po(outcome.purchase_orders[0]).unwrap();
    assert!(!po.requires_approval);
    assert_eq!(po.status, PoStatus::Approved);
    // the skip still stamps the transition
    assert!(po.approved_at.is_some());
    assert!(po.approved_by.is_none());
    // and creates no pending sign-off
    assert!(store.list_approvals(Some(ApprovalStatus::Pending)).is_empty());
}
