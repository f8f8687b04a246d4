#![allow(dead_code)]

use async_trait::async_trait;
use engagement_ledger::application::engine::Engine;
use engagement_ledger::application::payments::FinalizeOutcome;
use engagement_ledger::config::{EngineConfig, RetryPolicy};
use engagement_ledger::domain::document::{DocumentType, InvoiceDocument};
use engagement_ledger::domain::party::PartyId;
use engagement_ledger::domain::ports::{DocumentStore, InsertOutcome, LedgerStores};
use engagement_ledger::domain::work_item::{Decision, ProposalDetails, WorkItem};
use engagement_ledger::error::{EngineError, Result};
use engagement_ledger::infrastructure::directory::InMemoryDirectory;
use engagement_ledger::infrastructure::gateway::SimulatedGateway;
use engagement_ledger::infrastructure::in_memory::{InMemoryDocumentStore, in_memory_stores};
use engagement_ledger::infrastructure::notifier::RecordingNotifier;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

pub const BUSINESS: &str = "acme";
pub const CONTRACTOR: &str = "jo";

pub struct Harness {
    pub engine: Engine,
    pub gateway: SimulatedGateway,
    pub directory: InMemoryDirectory,
    pub notifier: RecordingNotifier,
}

pub fn business() -> PartyId {
    PartyId::from(BUSINESS)
}

pub fn contractor() -> PartyId {
    PartyId::from(CONTRACTOR)
}

/// Background bookkeeping retries with millisecond backoff.
pub fn fast_retry(max_attempts: u32) -> EngineConfig {
    EngineConfig {
        bookkeeping_retry: RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
        },
        ..EngineConfig::default()
    }
}

/// Refuses the next `failures` document inserts, then behaves. Counts every
/// insert it is asked to make.
#[derive(Clone, Default)]
pub struct FlakyDocumentStore {
    inner: InMemoryDocumentStore,
    failures: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl FlakyDocumentStore {
    pub fn failing(failures: usize) -> Self {
        let store = Self::default();
        store.failures.store(failures, Ordering::SeqCst);
        store
    }

    pub fn recover(&self) {
        self.failures.store(0, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn stores(&self) -> LedgerStores {
        LedgerStores {
            documents: Arc::new(self.clone()),
            ..in_memory_stores()
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyDocumentStore {
    async fn sequence_for(&self, payment_record_id: Uuid, period: &str) -> Result<u64> {
        self.inner.sequence_for(payment_record_id, period).await
    }

    async fn insert_if_absent(&self, document: InvoiceDocument) -> Result<InsertOutcome<InvoiceDocument>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refused {
            return Err(EngineError::StorageConflict("injected write failure".to_string()));
        }
        self.inner.insert_if_absent(document).await
    }

    async fn find(
        &self,
        payment_record_id: Uuid,
        document_type: DocumentType,
    ) -> Result<Option<InvoiceDocument>> {
        self.inner.find(payment_record_id, document_type).await
    }

    async fn for_payment(&self, payment_record_id: Uuid) -> Result<Vec<InvoiceDocument>> {
        self.inner.for_payment(payment_record_id).await
    }

    async fn get_all(&self) -> Result<Vec<InvoiceDocument>> {
        self.inner.get_all().await
    }
}

pub async fn harness() -> Harness {
    harness_with(in_memory_stores(), EngineConfig::default()).await
}

pub async fn harness_with(stores: LedgerStores, config: EngineConfig) -> Harness {
    let gateway = SimulatedGateway::new();
    let directory = InMemoryDirectory::new();
    directory.register_contractor(contractor()).await;
    let notifier = RecordingNotifier::new();
    let engine = Engine::new(
        stores,
        Arc::new(gateway.clone()),
        Arc::new(directory.clone()),
        Arc::new(notifier.clone()),
        config,
    );
    Harness {
        engine,
        gateway,
        directory,
        notifier,
    }
}

impl Harness {
    pub async fn propose(&self, amount: Decimal, currency: &str) -> WorkItem {
        self.engine
            .engagement
            .propose(
                business(),
                contractor(),
                amount,
                currency,
                ProposalDetails {
                    title: "Brand refresh".to_string(),
                    description: "Logo and palette".to_string(),
                    due_date: None,
                },
            )
            .await
            .unwrap()
    }

    /// Proposed, accepted and delivered: ready for the business to decide.
    pub async fn in_review(&self, amount: Decimal, currency: &str) -> WorkItem {
        let item = self.propose(amount, currency).await;
        self.engine
            .engagement
            .respond(item.id, &contractor(), Decision::Accept)
            .await
            .unwrap();
        self.engine
            .engagement
            .submit_deliverable(
                item.id,
                &contractor(),
                vec![format!("s3://deliverables/{}/v1.zip", item.id)],
                Some("first cut".to_string()),
            )
            .await
            .unwrap()
    }

    pub async fn intent_id(&self, work_item_id: Uuid) -> String {
        self.engine
            .stores
            .payments
            .find_by_work_item(work_item_id)
            .await
            .unwrap()
            .and_then(|record| record.gateway_intent_id)
            .unwrap()
    }

    /// Settles the current intent at the gateway and delivers the webhook once.
    pub async fn settle(&self, work_item_id: Uuid) -> Result<FinalizeOutcome> {
        let intent = self.intent_id(work_item_id).await;
        self.gateway.settle(&intent).await?;
        self.engine.payments.finalize_payment(work_item_id, &intent).await
    }
}
