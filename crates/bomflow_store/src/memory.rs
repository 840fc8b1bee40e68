//! Thread-safe in-memory entity store.
//!
//! All operations take `&self` and run under a single lock, so each call is
//! one atomic step: `update_*` closures observe current state and mutate it
//! without any window for a lost update. Ids and PO numbers are assigned
//! here, the way a database would.

use crate::error::StoreError;
use bomflow_schema::{
    format_po_number, ApprovalEntity, ApprovalId, ApprovalRequest, ApprovalStatus, Bom, BomId,
    BomItem, ItemId, ItemStatus, PoId, PoStatus, ProcessingTask, PurchaseOrder, SupplierId, TaskId,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Default)]
struct StoreInner {
    boms: HashMap<BomId, Bom>,
    items: HashMap<ItemId, BomItem>,
    pos: HashMap<PoId, PurchaseOrder>,
    tasks: HashMap<TaskId, ProcessingTask>,
    approvals: HashMap<ApprovalId, ApprovalRequest>,

    next_bom_id: u64,
    next_item_id: u64,
    next_po_id: u64,
    next_task_id: u64,
    po_sequence: u64,
}

/// In-memory entity store. Cheap to share behind an `Arc`.
#[derive(Default)]
pub struct EntityStore {
    inner: RwLock<StoreInner>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------------------
    // BOMs
    // ------------------------------------------------------------------

    /// Insert a new BOM; the store assigns its id.
    pub fn insert_bom(&self, build: impl FnOnce(BomId) -> Bom) -> Bom {
        let mut inner = self.write();
        inner.next_bom_id += 1;
        let id = BomId::new(inner.next_bom_id);
        let bom = build(id);
        debug!(bom_id = %id, name = %bom.name, "inserted BOM");
        inner.boms.insert(id, bom.clone());
        bom
    }

    pub fn get_bom(&self, id: BomId) -> Result<Bom, StoreError> {
        self.read()
            .boms
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("BOM", id))
    }

    /// Atomically read-modify-write one BOM.
    pub fn update_bom<R>(
        &self,
        id: BomId,
        f: impl FnOnce(&mut Bom) -> R,
    ) -> Result<R, StoreError> {
        let mut inner = self.write();
        let bom = inner
            .boms
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("BOM", id))?;
        Ok(f(bom))
    }

    /// Delete a BOM and, cascading, every item it owns.
    pub fn delete_bom(&self, id: BomId) -> Result<(), StoreError> {
        let mut inner = self.write();
        inner
            .boms
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("BOM", id))?;
        inner.items.retain(|_, item| item.bom_id != id);
        debug!(bom_id = %id, "deleted BOM and its items");
        Ok(())
    }

    pub fn list_boms(&self) -> Vec<Bom> {
        let inner = self.read();
        let mut boms: Vec<Bom> = inner.boms.values().cloned().collect();
        boms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        boms
    }

    // ------------------------------------------------------------------
    // BOM items
    // ------------------------------------------------------------------

    /// Replace the full item set of a BOM in one step, assigning item ids.
    /// The builder is called once per row with its index and fresh id.
    /// This is the parse-stage primitive.
    pub fn replace_bom_items(
        &self,
        bom_id: BomId,
        count: usize,
        mut build: impl FnMut(usize, ItemId) -> BomItem,
    ) -> Result<Vec<BomItem>, StoreError> {
        let mut inner = self.write();
        if !inner.boms.contains_key(&bom_id) {
            return Err(StoreError::not_found("BOM", bom_id));
        }

        inner.items.retain(|_, item| item.bom_id != bom_id);

        let mut created = Vec::with_capacity(count);
        for index in 0..count {
            inner.next_item_id += 1;
            let id = ItemId::new(inner.next_item_id);
            let item = build(index, id);
            inner.items.insert(id, item.clone());
            created.push(item);
        }
        debug!(bom_id = %bom_id, count = created.len(), "replaced BOM items");
        Ok(created)
    }

    pub fn get_item(&self, id: ItemId) -> Result<BomItem, StoreError> {
        self.read()
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("BOM item", id))
    }

    /// Atomically read-modify-write one item.
    pub fn update_item<R>(
        &self,
        id: ItemId,
        f: impl FnOnce(&mut BomItem) -> R,
    ) -> Result<R, StoreError> {
        let mut inner = self.write();
        let item = inner
            .items
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("BOM item", id))?;
        Ok(f(item))
    }

    /// All items of a BOM, in line-number order.
    pub fn list_items(&self, bom_id: BomId) -> Vec<BomItem> {
        let inner = self.read();
        let mut items: Vec<BomItem> = inner
            .items
            .values()
            .filter(|item| item.bom_id == bom_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.line_number);
        items
    }

    pub fn list_items_by_status(&self, bom_id: BomId, status: ItemStatus) -> Vec<BomItem> {
        let mut items = self.list_items(bom_id);
        items.retain(|item| item.status == status);
        items
    }

    // ------------------------------------------------------------------
    // Purchase orders
    // ------------------------------------------------------------------

    /// Insert a new PO; the store assigns its id and unique PO number.
    pub fn insert_po(
        &self,
        build: impl FnOnce(PoId, String) -> PurchaseOrder,
    ) -> PurchaseOrder {
        let mut inner = self.write();
        inner.next_po_id += 1;
        inner.po_sequence += 1;
        let id = PoId::new(inner.next_po_id);
        let po_number = format_po_number(Utc::now(), inner.po_sequence);
        let po = build(id, po_number);
        debug!(po_id = %id, po_number = %po.po_number, "inserted purchase order");
        inner.pos.insert(id, po.clone());
        po
    }

    pub fn get_po(&self, id: PoId) -> Result<PurchaseOrder, StoreError> {
        self.read()
            .pos
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("purchase order", id))
    }

    /// Atomically read-modify-write one PO.
    pub fn update_po<R>(
        &self,
        id: PoId,
        f: impl FnOnce(&mut PurchaseOrder) -> R,
    ) -> Result<R, StoreError> {
        let mut inner = self.write();
        let po = inner
            .pos
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("purchase order", id))?;
        Ok(f(po))
    }

    /// The live (non-cancelled) PO for one (BOM, supplier) pair, if any.
    /// Generation keys its upserts on this lookup.
    pub fn find_po_for_supplier(
        &self,
        bom_id: BomId,
        supplier_id: SupplierId,
    ) -> Option<PurchaseOrder> {
        self.read()
            .pos
            .values()
            .find(|po| {
                po.bom_id == Some(bom_id)
                    && po.supplier_id == supplier_id
                    && po.status != PoStatus::Cancelled
            })
            .cloned()
    }

    pub fn list_pos(&self, bom_id: BomId) -> Vec<PurchaseOrder> {
        let inner = self.read();
        let mut pos: Vec<PurchaseOrder> = inner
            .pos
            .values()
            .filter(|po| po.bom_id == Some(bom_id))
            .cloned()
            .collect();
        pos.sort_by(|a, b| a.po_number.cmp(&b.po_number));
        pos
    }

    // ------------------------------------------------------------------
    // Processing tasks
    // ------------------------------------------------------------------

    /// Create a queued task for a BOM.
    ///
    /// This is the at-most-one-active-run primitive: the existence check
    /// and the insert happen under the same lock, so two concurrent
    /// callers cannot both obtain a task for the same BOM.
    pub fn create_task(&self, bom_id: BomId) -> Result<ProcessingTask, StoreError> {
        let mut inner = self.write();
        if !inner.boms.contains_key(&bom_id) {
            return Err(StoreError::not_found("BOM", bom_id));
        }
        if let Some(active) = inner
            .tasks
            .values()
            .find(|task| task.bom_id == bom_id && task.state.is_active())
        {
            return Err(StoreError::RunActive {
                bom_id,
                task_id: active.id,
            });
        }

        inner.next_task_id += 1;
        let id = TaskId::new(inner.next_task_id);
        let task = ProcessingTask::new(id, bom_id);
        debug!(task_id = %id, bom_id = %bom_id, "created processing task");
        inner.tasks.insert(id, task.clone());
        Ok(task)
    }

    pub fn get_task(&self, id: TaskId) -> Result<ProcessingTask, StoreError> {
        self.read()
            .tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("task", id))
    }

    /// Atomically read-modify-write one task.
    pub fn update_task<R>(
        &self,
        id: TaskId,
        f: impl FnOnce(&mut ProcessingTask) -> R,
    ) -> Result<R, StoreError> {
        let mut inner = self.write();
        let task = inner
            .tasks
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("task", id))?;
        Ok(f(task))
    }

    /// The Queued or Running task for a BOM, if any.
    pub fn active_task(&self, bom_id: BomId) -> Option<ProcessingTask> {
        self.read()
            .tasks
            .values()
            .find(|task| task.bom_id == bom_id && task.state.is_active())
            .cloned()
    }

    /// All tasks for a BOM, newest first.
    pub fn list_tasks(&self, bom_id: BomId) -> Vec<ProcessingTask> {
        let inner = self.read();
        let mut tasks: Vec<ProcessingTask> = inner
            .tasks
            .values()
            .filter(|task| task.bom_id == bom_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        tasks
    }

    // ------------------------------------------------------------------
    // Approval requests
    // ------------------------------------------------------------------

    pub fn insert_approval(&self, request: ApprovalRequest) -> ApprovalRequest {
        let mut inner = self.write();
        debug!(approval_id = %request.id, entity = %request.entity, "inserted approval request");
        inner.approvals.insert(request.id.clone(), request.clone());
        request
    }

    pub fn get_approval(&self, id: &ApprovalId) -> Result<ApprovalRequest, StoreError> {
        self.read()
            .approvals
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("approval request", id))
    }

    /// Atomically read-modify-write one approval request.
    pub fn update_approval<R>(
        &self,
        id: &ApprovalId,
        f: impl FnOnce(&mut ApprovalRequest) -> R,
    ) -> Result<R, StoreError> {
        let mut inner = self.write();
        let request = inner
            .approvals
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("approval request", id))?;
        Ok(f(request))
    }

    /// Approvals filtered by status, newest first.
    pub fn list_approvals(&self, status: Option<ApprovalStatus>) -> Vec<ApprovalRequest> {
        let inner = self.read();
        let mut approvals: Vec<ApprovalRequest> = inner
            .approvals
            .values()
            .filter(|request| status.map(|s| request.status == s).unwrap_or(true))
            .cloned()
            .collect();
        approvals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        approvals
    }

    /// The pending request for an entity, if any. Gated transitions use
    /// this to avoid duplicate requests on re-entry.
    pub fn find_pending_approval(&self, entity: ApprovalEntity) -> Option<ApprovalRequest> {
        self.read()
            .approvals
            .values()
            .find(|request| request.entity == entity && request.is_pending())
            .cloned()
    }
}
