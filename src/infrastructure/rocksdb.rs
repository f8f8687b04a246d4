use crate::domain::budget::BudgetLedger;
use crate::domain::compliance::ComplianceLogEntry;
use crate::domain::document::{DocumentType, InvoiceDocument};
use crate::domain::money::{Amount, Balance, Currency};
use crate::domain::party::PartyId;
use crate::domain::payment::{PaymentRecord, PaymentStatus};
use crate::domain::ports::{
    BudgetStore, CasOutcome, ComplianceStore, DocumentStore, InsertOutcome, PaymentRecordStore,
    WorkItemStore,
};
use crate::domain::work_item::{WorkItem, WorkItemStatus};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for work items, keyed by work item id.
pub const CF_WORK_ITEMS: &str = "work_items";
/// Column Family for payment records, keyed by payment record id.
pub const CF_PAYMENT_RECORDS: &str = "payment_records";
/// Unique index: work item id -> payment record id.
pub const CF_PAYMENTS_BY_WORK_ITEM: &str = "payment_records_by_work_item";
/// Column Family for budget ledgers, keyed by business id.
pub const CF_BUDGETS: &str = "budget_ledger";
/// Column Family for invoice documents, keyed by (payment record id, document type).
pub const CF_DOCUMENTS: &str = "invoice_documents";
/// Period counters and per-payment sequence assignments.
pub const CF_SEQUENCES: &str = "invoice_sequences";
/// Column Family for the compliance log, keyed by payment record id.
pub const CF_COMPLIANCE: &str = "compliance_log";

const ALL_CFS: [&str; 7] = [
    CF_WORK_ITEMS,
    CF_PAYMENT_RECORDS,
    CF_PAYMENTS_BY_WORK_ITEM,
    CF_BUDGETS,
    CF_DOCUMENTS,
    CF_SEQUENCES,
    CF_COMPLIANCE,
];

/// A persistent ledger store implementation using RocksDB.
///
/// Every table lives in its own Column Family. RocksDB holds an exclusive lock on
/// the database directory, so this process is the only writer; read-modify-write
/// sequences (compare-and-swap, insert-if-absent, counter increments) are
/// serialized through `write_lock`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating any
    /// missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            EngineError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn scan_json<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    fn get_u64(&self, cf_name: &str, key: &[u8]) -> Result<Option<u64>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|e| EngineError::InternalError(Box::new(e)))?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    fn document_key(payment_record_id: Uuid, document_type: DocumentType) -> Vec<u8> {
        let mut key = payment_record_id.as_bytes().to_vec();
        key.extend_from_slice(document_type.as_str().as_bytes());
        key
    }
}

#[async_trait]
impl WorkItemStore for RocksDBStore {
    async fn insert(&self, item: WorkItem) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = item.id.as_bytes();
        if self.get_json::<WorkItem>(CF_WORK_ITEMS, key)?.is_some() {
            return Err(EngineError::StorageConflict(format!(
                "work item {} already exists",
                item.id
            )));
        }
        self.put_json(CF_WORK_ITEMS, key, &item)
    }

    async fn get(&self, id: Uuid) -> Result<Option<WorkItem>> {
        self.get_json(CF_WORK_ITEMS, id.as_bytes())
    }

    async fn compare_and_swap(
        &self,
        expected: WorkItemStatus,
        item: WorkItem,
    ) -> Result<CasOutcome<WorkItem>> {
        let _guard = self.write_lock.lock().await;
        let current: WorkItem = self
            .get_json(CF_WORK_ITEMS, item.id.as_bytes())?
            .ok_or_else(|| EngineError::NotFound(format!("work item {}", item.id)))?;
        if current.status != expected {
            return Ok(CasOutcome::Conflict(current));
        }
        self.put_json(CF_WORK_ITEMS, item.id.as_bytes(), &item)?;
        Ok(CasOutcome::Applied(item))
    }

    async fn get_all(&self) -> Result<Vec<WorkItem>> {
        let mut all: Vec<WorkItem> = self.scan_json(CF_WORK_ITEMS)?;
        all.sort_by_key(|item| item.created_at);
        Ok(all)
    }
}

#[async_trait]
impl PaymentRecordStore for RocksDBStore {
    async fn insert_if_absent(&self, record: PaymentRecord) -> Result<InsertOutcome<PaymentRecord>> {
        let _guard = self.write_lock.lock().await;
        let index = self.cf(CF_PAYMENTS_BY_WORK_ITEM)?;
        if let Some(existing_id) = self.db.get_cf(index, record.work_item_id.as_bytes())?
            && let Some(existing) = self.get_json::<PaymentRecord>(CF_PAYMENT_RECORDS, &existing_id)?
        {
            return Ok(InsertOutcome::Existing(existing));
        }

        // Record first: an index entry must never point at a missing record.
        self.put_json(CF_PAYMENT_RECORDS, record.id.as_bytes(), &record)?;
        self.db
            .put_cf(index, record.work_item_id.as_bytes(), record.id.as_bytes())?;
        Ok(InsertOutcome::Inserted(record))
    }

    async fn get(&self, id: Uuid) -> Result<Option<PaymentRecord>> {
        self.get_json(CF_PAYMENT_RECORDS, id.as_bytes())
    }

    async fn find_by_work_item(&self, work_item_id: Uuid) -> Result<Option<PaymentRecord>> {
        let index = self.cf(CF_PAYMENTS_BY_WORK_ITEM)?;
        match self.db.get_cf(index, work_item_id.as_bytes())? {
            Some(record_id) => self.get_json(CF_PAYMENT_RECORDS, &record_id),
            None => Ok(None),
        }
    }

    async fn compare_and_swap(
        &self,
        expected: PaymentStatus,
        record: PaymentRecord,
    ) -> Result<CasOutcome<PaymentRecord>> {
        let _guard = self.write_lock.lock().await;
        let current: PaymentRecord = self
            .get_json(CF_PAYMENT_RECORDS, record.id.as_bytes())?
            .ok_or_else(|| EngineError::NotFound(format!("payment record {}", record.id)))?;
        if current.status != expected {
            return Ok(CasOutcome::Conflict(current));
        }
        self.put_json(CF_PAYMENT_RECORDS, record.id.as_bytes(), &record)?;
        Ok(CasOutcome::Applied(record))
    }

    async fn get_all(&self) -> Result<Vec<PaymentRecord>> {
        let mut all: Vec<PaymentRecord> = self.scan_json(CF_PAYMENT_RECORDS)?;
        all.sort_by_key(|record| record.scheduled_at);
        Ok(all)
    }
}

#[async_trait]
impl BudgetStore for RocksDBStore {
    async fn get(&self, business_id: &PartyId) -> Result<Option<BudgetLedger>> {
        self.get_json(CF_BUDGETS, business_id.as_str().as_bytes())
    }

    async fn set_cap(&self, business_id: &PartyId, cap: Option<Balance>) -> Result<BudgetLedger> {
        let _guard = self.write_lock.lock().await;
        let key = business_id.as_str().as_bytes();
        let mut ledger = self
            .get_json::<BudgetLedger>(CF_BUDGETS, key)?
            .unwrap_or_else(|| BudgetLedger::new(business_id.clone()));
        ledger.cap = cap;
        self.put_json(CF_BUDGETS, key, &ledger)?;
        Ok(ledger)
    }

    async fn apply_spend(
        &self,
        business_id: &PartyId,
        payment_record_id: Uuid,
        amount: Amount,
        currency: &Currency,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let key = business_id.as_str().as_bytes();
        let mut ledger = self
            .get_json::<BudgetLedger>(CF_BUDGETS, key)?
            .unwrap_or_else(|| BudgetLedger::new(business_id.clone()));
        if !ledger.apply_spend(payment_record_id, amount, currency)? {
            return Ok(false);
        }
        self.put_json(CF_BUDGETS, key, &ledger)?;
        Ok(true)
    }
}

#[async_trait]
impl DocumentStore for RocksDBStore {
    async fn sequence_for(&self, payment_record_id: Uuid, period: &str) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let assignment_key = format!("payment:{payment_record_id}");
        if let Some(sequence) = self.get_u64(CF_SEQUENCES, assignment_key.as_bytes())? {
            return Ok(sequence);
        }

        let counter_key = format!("period:{period}");
        let sequence = self
            .get_u64(CF_SEQUENCES, counter_key.as_bytes())?
            .unwrap_or(0)
            + 1;

        // Counter before assignment: an interrupted write skips a number, never reuses one.
        let cf = self.cf(CF_SEQUENCES)?;
        self.db.put_cf(cf, counter_key.as_bytes(), sequence.to_be_bytes())?;
        self.db.put_cf(cf, assignment_key.as_bytes(), sequence.to_be_bytes())?;
        Ok(sequence)
    }

    async fn insert_if_absent(&self, document: InvoiceDocument) -> Result<InsertOutcome<InvoiceDocument>> {
        let _guard = self.write_lock.lock().await;
        let key = Self::document_key(document.payment_record_id, document.document_type);
        if let Some(existing) = self.get_json::<InvoiceDocument>(CF_DOCUMENTS, &key)? {
            return Ok(InsertOutcome::Existing(existing));
        }
        self.put_json(CF_DOCUMENTS, &key, &document)?;
        Ok(InsertOutcome::Inserted(document))
    }

    async fn find(
        &self,
        payment_record_id: Uuid,
        document_type: DocumentType,
    ) -> Result<Option<InvoiceDocument>> {
        self.get_json(CF_DOCUMENTS, &Self::document_key(payment_record_id, document_type))
    }

    async fn for_payment(&self, payment_record_id: Uuid) -> Result<Vec<InvoiceDocument>> {
        let mut documents = Vec::new();
        for document_type in DocumentType::ALL {
            if let Some(document) =
                self.get_json(CF_DOCUMENTS, &Self::document_key(payment_record_id, document_type))?
            {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    async fn get_all(&self) -> Result<Vec<InvoiceDocument>> {
        let mut all: Vec<InvoiceDocument> = self.scan_json(CF_DOCUMENTS)?;
        all.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(all)
    }
}

#[async_trait]
impl ComplianceStore for RocksDBStore {
    async fn insert_if_absent(&self, entry: ComplianceLogEntry) -> Result<InsertOutcome<ComplianceLogEntry>> {
        let _guard = self.write_lock.lock().await;
        let key = entry.payment_record_id.as_bytes();
        if let Some(existing) = self.get_json::<ComplianceLogEntry>(CF_COMPLIANCE, key)? {
            return Ok(InsertOutcome::Existing(existing));
        }
        self.put_json(CF_COMPLIANCE, key, &entry)?;
        Ok(InsertOutcome::Inserted(entry))
    }

    async fn get(&self, payment_record_id: Uuid) -> Result<Option<ComplianceLogEntry>> {
        self.get_json(CF_COMPLIANCE, payment_record_id.as_bytes())
    }

    async fn get_all(&self) -> Result<Vec<ComplianceLogEntry>> {
        let mut all: Vec<ComplianceLogEntry> = self.scan_json(CF_COMPLIANCE)?;
        all.sort_by_key(|entry| entry.recorded_at);
        Ok(all)
    }
}
