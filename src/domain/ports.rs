use super::budget::BudgetLedger;
use super::compliance::ComplianceLogEntry;
use super::document::{DocumentType, InvoiceDocument};
use super::events::EngagementEvent;
use super::money::{Amount, Balance, Currency};
use super::party::PartyId;
use super::payment::{GatewayIntentStatus, PaymentRecord, PaymentStatus};
use super::work_item::{WorkItem, WorkItemStatus};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Result of an insert guarded by a natural-key uniqueness constraint.
#[derive(Debug, PartialEq, Clone)]
pub enum InsertOutcome<T> {
    Inserted(T),
    /// Another writer got there first; carries the row that won.
    Existing(T),
}

impl<T> InsertOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            InsertOutcome::Inserted(row) | InsertOutcome::Existing(row) => row,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Result of a status-guarded update.
#[derive(Debug, PartialEq, Clone)]
pub enum CasOutcome<T> {
    Applied(T),
    /// The stored status no longer matched; carries the current row.
    Conflict(T),
}

#[async_trait]
pub trait WorkItemStore: Send + Sync {
    async fn insert(&self, item: WorkItem) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<WorkItem>>;
    /// Replaces the stored item only if its status still equals `expected`.
    async fn compare_and_swap(
        &self,
        expected: WorkItemStatus,
        item: WorkItem,
    ) -> Result<CasOutcome<WorkItem>>;
    async fn get_all(&self) -> Result<Vec<WorkItem>>;
}

#[async_trait]
pub trait PaymentRecordStore: Send + Sync {
    /// Inserts unless a record for the same work item already exists.
    async fn insert_if_absent(&self, record: PaymentRecord) -> Result<InsertOutcome<PaymentRecord>>;
    async fn get(&self, id: Uuid) -> Result<Option<PaymentRecord>>;
    async fn find_by_work_item(&self, work_item_id: Uuid) -> Result<Option<PaymentRecord>>;
    /// Replaces the stored record only if its status still equals `expected`.
    async fn compare_and_swap(
        &self,
        expected: PaymentStatus,
        record: PaymentRecord,
    ) -> Result<CasOutcome<PaymentRecord>>;
    async fn get_all(&self) -> Result<Vec<PaymentRecord>>;
}

#[async_trait]
pub trait BudgetStore: Send + Sync {
    async fn get(&self, business_id: &PartyId) -> Result<Option<BudgetLedger>>;
    /// Creates the ledger if needed and sets (or clears) its cap.
    async fn set_cap(&self, business_id: &PartyId, cap: Option<Balance>) -> Result<BudgetLedger>;
    /// Atomic, idempotent increment keyed by payment record id. Returns `false`
    /// when the payment had already been applied.
    async fn apply_spend(
        &self,
        business_id: &PartyId,
        payment_record_id: Uuid,
        amount: Amount,
        currency: &Currency,
    ) -> Result<bool>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the sequence number assigned to this payment record, atomically
    /// incrementing the `period` counter the first time it is asked.
    async fn sequence_for(&self, payment_record_id: Uuid, period: &str) -> Result<u64>;
    /// Inserts unless a document of the same (payment record, type) exists.
    async fn insert_if_absent(&self, document: InvoiceDocument) -> Result<InsertOutcome<InvoiceDocument>>;
    async fn find(
        &self,
        payment_record_id: Uuid,
        document_type: DocumentType,
    ) -> Result<Option<InvoiceDocument>>;
    async fn for_payment(&self, payment_record_id: Uuid) -> Result<Vec<InvoiceDocument>>;
    async fn get_all(&self) -> Result<Vec<InvoiceDocument>>;
}

#[async_trait]
pub trait ComplianceStore: Send + Sync {
    async fn insert_if_absent(&self, entry: ComplianceLogEntry) -> Result<InsertOutcome<ComplianceLogEntry>>;
    async fn get(&self, payment_record_id: Uuid) -> Result<Option<ComplianceLogEntry>>;
    async fn get_all(&self) -> Result<Vec<ComplianceLogEntry>>;
}

/// Metadata attached to every gateway intent.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentMetadata {
    pub work_item_id: Uuid,
    pub contractor_id: PartyId,
    pub business_id: PartyId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIntentRequest {
    pub amount: Amount,
    pub currency: Currency,
    /// Repeating a create with the same key must return the same intent.
    pub idempotency_key: String,
    pub metadata: IntentMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayIntent {
    pub intent_id: String,
    pub client_secret: String,
    pub status: GatewayIntentStatus,
}

/// The gateway's authoritative view of an intent.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentSnapshot {
    pub intent_id: String,
    pub status: GatewayIntentStatus,
    /// Only used to cross-check the ledger amount, never to size a charge.
    pub settled_amount: Option<Decimal>,
    pub currency: Currency,
    pub processor_reference: Option<String>,
}

/// Boundary to the external payment processor.
///
/// Implementations report transport failures as `EngineError::GatewayUnavailable`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<GatewayIntent>;
    async fn get_intent(&self, intent_id: &str) -> Result<IntentSnapshot>;
}

#[async_trait]
pub trait PartyDirectory: Send + Sync {
    async fn contractor_exists(&self, contractor_id: &PartyId) -> Result<bool>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: EngagementEvent) -> Result<()>;
}

pub type WorkItemStoreRef = Arc<dyn WorkItemStore>;
pub type PaymentRecordStoreRef = Arc<dyn PaymentRecordStore>;
pub type BudgetStoreRef = Arc<dyn BudgetStore>;
pub type DocumentStoreRef = Arc<dyn DocumentStore>;
pub type ComplianceStoreRef = Arc<dyn ComplianceStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type PartyDirectoryRef = Arc<dyn PartyDirectory>;
pub type NotifierRef = Arc<dyn Notifier>;

/// The five logical tables of the ledger store, each behind its own port.
#[derive(Clone)]
pub struct LedgerStores {
    pub work_items: WorkItemStoreRef,
    pub payments: PaymentRecordStoreRef,
    pub budgets: BudgetStoreRef,
    pub documents: DocumentStoreRef,
    pub compliance: ComplianceStoreRef,
}

impl LedgerStores {
    /// Uses one backend for every table, as the RocksDB store does.
    pub fn from_backend<S>(backend: S) -> Self
    where
        S: WorkItemStore
            + PaymentRecordStore
            + BudgetStore
            + DocumentStore
            + ComplianceStore
            + Clone
            + 'static,
    {
        Self {
            work_items: Arc::new(backend.clone()),
            payments: Arc::new(backend.clone()),
            budgets: Arc::new(backend.clone()),
            documents: Arc::new(backend.clone()),
            compliance: Arc::new(backend),
        }
    }
}
