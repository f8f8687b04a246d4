use crate::domain::budget::BudgetLedger;
use crate::domain::compliance::ComplianceLogEntry;
use crate::domain::document::{DocumentType, InvoiceDocument};
use crate::domain::money::{Amount, Balance, Currency};
use crate::domain::party::PartyId;
use crate::domain::payment::{PaymentRecord, PaymentStatus};
use crate::domain::ports::{
    BudgetStore, CasOutcome, ComplianceStore, DocumentStore, InsertOutcome, LedgerStores,
    PaymentRecordStore, WorkItemStore,
};
use crate::domain::work_item::{WorkItem, WorkItemStatus};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Builds the full set of ledger tables backed by process memory.
pub fn in_memory_stores() -> LedgerStores {
    LedgerStores {
        work_items: Arc::new(InMemoryWorkItemStore::new()),
        payments: Arc::new(InMemoryPaymentRecordStore::new()),
        budgets: Arc::new(InMemoryBudgetStore::new()),
        documents: Arc::new(InMemoryDocumentStore::new()),
        compliance: Arc::new(InMemoryComplianceStore::new()),
    }
}

/// A thread-safe in-memory store for work items.
///
/// Status compare-and-swap happens under the write lock, so only one of several
/// concurrent transitions from the same state can win.
#[derive(Default, Clone)]
pub struct InMemoryWorkItemStore {
    items: Arc<RwLock<HashMap<Uuid, WorkItem>>>,
}

impl InMemoryWorkItemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkItemStore for InMemoryWorkItemStore {
    async fn insert(&self, item: WorkItem) -> Result<()> {
        let mut items = self.items.write().await;
        if items.contains_key(&item.id) {
            return Err(EngineError::StorageConflict(format!(
                "work item {} already exists",
                item.id
            )));
        }
        items.insert(item.id, item);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<WorkItem>> {
        let items = self.items.read().await;
        Ok(items.get(&id).cloned())
    }

    async fn compare_and_swap(
        &self,
        expected: WorkItemStatus,
        item: WorkItem,
    ) -> Result<CasOutcome<WorkItem>> {
        let mut items = self.items.write().await;
        let current = items
            .get_mut(&item.id)
            .ok_or_else(|| EngineError::NotFound(format!("work item {}", item.id)))?;
        if current.status != expected {
            return Ok(CasOutcome::Conflict(current.clone()));
        }
        *current = item.clone();
        Ok(CasOutcome::Applied(item))
    }

    async fn get_all(&self) -> Result<Vec<WorkItem>> {
        let items = self.items.read().await;
        let mut all: Vec<WorkItem> = items.values().cloned().collect();
        all.sort_by_key(|item| item.created_at);
        Ok(all)
    }
}

#[derive(Default)]
struct PaymentTables {
    records: HashMap<Uuid, PaymentRecord>,
    /// work_item_id -> payment record id; the uniqueness constraint.
    by_work_item: HashMap<Uuid, Uuid>,
}

/// A thread-safe in-memory store for payment records, unique on work item id.
#[derive(Default, Clone)]
pub struct InMemoryPaymentRecordStore {
    tables: Arc<RwLock<PaymentTables>>,
}

impl InMemoryPaymentRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRecordStore for InMemoryPaymentRecordStore {
    async fn insert_if_absent(&self, record: PaymentRecord) -> Result<InsertOutcome<PaymentRecord>> {
        let mut tables = self.tables.write().await;
        if let Some(existing_id) = tables.by_work_item.get(&record.work_item_id)
            && let Some(existing) = tables.records.get(existing_id)
        {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        tables.by_work_item.insert(record.work_item_id, record.id);
        tables.records.insert(record.id, record.clone());
        Ok(InsertOutcome::Inserted(record))
    }

    async fn get(&self, id: Uuid) -> Result<Option<PaymentRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.records.get(&id).cloned())
    }

    async fn find_by_work_item(&self, work_item_id: Uuid) -> Result<Option<PaymentRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_work_item
            .get(&work_item_id)
            .and_then(|id| tables.records.get(id))
            .cloned())
    }

    async fn compare_and_swap(
        &self,
        expected: PaymentStatus,
        record: PaymentRecord,
    ) -> Result<CasOutcome<PaymentRecord>> {
        let mut tables = self.tables.write().await;
        let current = tables
            .records
            .get_mut(&record.id)
            .ok_or_else(|| EngineError::NotFound(format!("payment record {}", record.id)))?;
        if current.status != expected {
            return Ok(CasOutcome::Conflict(current.clone()));
        }
        *current = record.clone();
        Ok(CasOutcome::Applied(record))
    }

    async fn get_all(&self) -> Result<Vec<PaymentRecord>> {
        let tables = self.tables.read().await;
        let mut all: Vec<PaymentRecord> = tables.records.values().cloned().collect();
        all.sort_by_key(|record| record.scheduled_at);
        Ok(all)
    }
}

/// A thread-safe in-memory store for per-business budget ledgers.
#[derive(Default, Clone)]
pub struct InMemoryBudgetStore {
    ledgers: Arc<RwLock<HashMap<PartyId, BudgetLedger>>>,
}

impl InMemoryBudgetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BudgetStore for InMemoryBudgetStore {
    async fn get(&self, business_id: &PartyId) -> Result<Option<BudgetLedger>> {
        let ledgers = self.ledgers.read().await;
        Ok(ledgers.get(business_id).cloned())
    }

    async fn set_cap(&self, business_id: &PartyId, cap: Option<Balance>) -> Result<BudgetLedger> {
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers
            .entry(business_id.clone())
            .or_insert_with(|| BudgetLedger::new(business_id.clone()));
        ledger.cap = cap;
        Ok(ledger.clone())
    }

    async fn apply_spend(
        &self,
        business_id: &PartyId,
        payment_record_id: Uuid,
        amount: Amount,
        currency: &Currency,
    ) -> Result<bool> {
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers
            .entry(business_id.clone())
            .or_insert_with(|| BudgetLedger::new(business_id.clone()));
        ledger.apply_spend(payment_record_id, amount, currency)
    }
}

#[derive(Default)]
struct DocumentTables {
    documents: HashMap<(Uuid, DocumentType), InvoiceDocument>,
    counters: HashMap<String, u64>,
    assigned: HashMap<Uuid, u64>,
}

/// A thread-safe in-memory store for invoice documents and their period counters.
#[derive(Default, Clone)]
pub struct InMemoryDocumentStore {
    tables: Arc<RwLock<DocumentTables>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn sequence_for(&self, payment_record_id: Uuid, period: &str) -> Result<u64> {
        let mut tables = self.tables.write().await;
        if let Some(sequence) = tables.assigned.get(&payment_record_id) {
            return Ok(*sequence);
        }
        let counter = tables.counters.entry(period.to_string()).or_insert(0);
        *counter += 1;
        let sequence = *counter;
        tables.assigned.insert(payment_record_id, sequence);
        Ok(sequence)
    }

    async fn insert_if_absent(&self, document: InvoiceDocument) -> Result<InsertOutcome<InvoiceDocument>> {
        let mut tables = self.tables.write().await;
        let key = (document.payment_record_id, document.document_type);
        if let Some(existing) = tables.documents.get(&key) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        tables.documents.insert(key, document.clone());
        Ok(InsertOutcome::Inserted(document))
    }

    async fn find(
        &self,
        payment_record_id: Uuid,
        document_type: DocumentType,
    ) -> Result<Option<InvoiceDocument>> {
        let tables = self.tables.read().await;
        Ok(tables
            .documents
            .get(&(payment_record_id, document_type))
            .cloned())
    }

    async fn for_payment(&self, payment_record_id: Uuid) -> Result<Vec<InvoiceDocument>> {
        let tables = self.tables.read().await;
        Ok(DocumentType::ALL
            .iter()
            .filter_map(|document_type| {
                tables
                    .documents
                    .get(&(payment_record_id, *document_type))
                    .cloned()
            })
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<InvoiceDocument>> {
        let tables = self.tables.read().await;
        let mut all: Vec<InvoiceDocument> = tables.documents.values().cloned().collect();
        all.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(all)
    }
}

/// A thread-safe in-memory append-only compliance log.
#[derive(Default, Clone)]
pub struct InMemoryComplianceStore {
    entries: Arc<RwLock<HashMap<Uuid, ComplianceLogEntry>>>,
}

impl InMemoryComplianceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ComplianceStore for InMemoryComplianceStore {
    async fn insert_if_absent(&self, entry: ComplianceLogEntry) -> Result<InsertOutcome<ComplianceLogEntry>> {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(&entry.payment_record_id) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        entries.insert(entry.payment_record_id, entry.clone());
        Ok(InsertOutcome::Inserted(entry))
    }

    async fn get(&self, payment_record_id: Uuid) -> Result<Option<ComplianceLogEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&payment_record_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<ComplianceLogEntry>> {
        let entries = self.entries.read().await;
        let mut all: Vec<ComplianceLogEntry> = entries.values().cloned().collect();
        all.sort_by_key(|entry| entry.recorded_at);
        Ok(all)
    }
}
