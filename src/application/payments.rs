use super::budget::BudgetLedgerService;
use super::compliance::ComplianceRecorder;
use super::documents::InvoiceGenerator;
use super::notify_quietly;
use crate::config::{EngineConfig, RetryPolicy};
use crate::domain::budget::BudgetCheck;
use crate::domain::document::DocumentType;
use crate::domain::events::EngagementEvent;
use crate::domain::payment::{GatewayIntentStatus, PaymentIntentRef, PaymentRecord, PaymentStatus};
use crate::domain::ports::{
    CasOutcome, CreateIntentRequest, InsertOutcome, IntentMetadata, IntentSnapshot, NotifierRef,
    PaymentGatewayRef, PaymentRecordStoreRef, WorkItemStoreRef,
};
use crate::domain::work_item::{WorkItem, WorkItemStatus};
use crate::error::{EngineError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How an attempt to start payment for an approved work item ended.
///
/// Approval itself has already been committed by the time this is produced; a
/// `Deferred` payment never reverts it.
#[derive(Debug)]
pub enum PaymentInitiation {
    Initiated(PaymentIntentRef),
    AlreadyPaid,
    Deferred(EngineError),
}

impl PaymentInitiation {
    pub fn user_message(&self) -> &'static str {
        match self {
            PaymentInitiation::Initiated(_) => "payment processing",
            PaymentInitiation::AlreadyPaid => "paid",
            PaymentInitiation::Deferred(EngineError::InsufficientBudget { .. }) => {
                "payment pending — awaiting funds"
            }
            PaymentInitiation::Deferred(_) => "payment failed — retry available",
        }
    }

    pub fn intent(&self) -> Option<&PaymentIntentRef> {
        match self {
            PaymentInitiation::Initiated(intent) => Some(intent),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum FinalizeOutcome {
    Completed(PaymentRecord),
    /// The record was already completed; downstream bookkeeping was replayed.
    AlreadyCompleted(PaymentRecord),
    /// The gateway has not reached a terminal state yet.
    Pending(PaymentRecord),
    Failed(PaymentRecord),
}

impl FinalizeOutcome {
    pub fn record(&self) -> &PaymentRecord {
        match self {
            FinalizeOutcome::Completed(record)
            | FinalizeOutcome::AlreadyCompleted(record)
            | FinalizeOutcome::Pending(record)
            | FinalizeOutcome::Failed(record) => record,
        }
    }
}

/// Payment state of one work item as shown to its business.
#[derive(Debug, PartialEq, Clone)]
pub struct PaymentStatusView {
    pub work_item_id: Uuid,
    pub work_item_status: WorkItemStatus,
    pub payment: Option<PaymentRecord>,
    pub message: &'static str,
}

/// Post-settlement side effects, each idempotent on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookkeepingStep {
    BudgetSpend,
    BusinessInvoice,
    ContractorReceipt,
    ComplianceEntry,
}

impl BookkeepingStep {
    pub const ALL: [BookkeepingStep; 4] = [
        BookkeepingStep::BudgetSpend,
        BookkeepingStep::BusinessInvoice,
        BookkeepingStep::ContractorReceipt,
        BookkeepingStep::ComplianceEntry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookkeepingStep::BudgetSpend => "budget_spend",
            BookkeepingStep::BusinessInvoice => "business_invoice",
            BookkeepingStep::ContractorReceipt => "contractor_receipt",
            BookkeepingStep::ComplianceEntry => "compliance_entry",
        }
    }
}

/// Turns one approved work item into exactly one completed payment record.
///
/// The work item's stored amount is the only amount ever sent to the gateway, and
/// the gateway's settled amount is only ever compared against it. Concurrent
/// callers are arbitrated by the store: the unique work-item key on payment
/// records and status compare-and-swap on every update.
#[derive(Clone)]
pub struct PaymentIntentController {
    work_items: WorkItemStoreRef,
    payments: PaymentRecordStoreRef,
    gateway: PaymentGatewayRef,
    budget: BudgetLedgerService,
    invoices: InvoiceGenerator,
    compliance: ComplianceRecorder,
    notifier: NotifierRef,
    gateway_timeout: Duration,
    retry: RetryPolicy,
}

impl PaymentIntentController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        work_items: WorkItemStoreRef,
        payments: PaymentRecordStoreRef,
        gateway: PaymentGatewayRef,
        budget: BudgetLedgerService,
        invoices: InvoiceGenerator,
        compliance: ComplianceRecorder,
        notifier: NotifierRef,
        config: &EngineConfig,
    ) -> Self {
        Self {
            work_items,
            payments,
            gateway,
            budget,
            invoices,
            compliance,
            notifier,
            gateway_timeout: config.gateway_timeout,
            retry: config.bookkeeping_retry,
        }
    }

    /// Budget gate followed by `ensure_payment_intent`. Never fails: anything that
    /// stops money from moving is reported as `Deferred`.
    pub async fn initiate(&self, work_item_id: Uuid) -> PaymentInitiation {
        match self.try_initiate(work_item_id).await {
            Ok(initiation) => initiation,
            Err(err) => {
                warn!(work_item = %work_item_id, error = %err, "payment deferred");
                PaymentInitiation::Deferred(err)
            }
        }
    }

    async fn try_initiate(&self, work_item_id: Uuid) -> Result<PaymentInitiation> {
        let item = self.load_work_item(work_item_id).await?;
        if item.status == WorkItemStatus::Paid {
            return Ok(PaymentInitiation::AlreadyPaid);
        }
        // Only a fresh money movement is gated; an in-flight one is simply re-entered.
        let in_flight = self
            .payments
            .find_by_work_item(work_item_id)
            .await?
            .is_some_and(|record| record.status != PaymentStatus::Failed);
        if !in_flight {
            self.budget
                .ensure_within(&item.business_id, item.amount, &item.currency)
                .await?;
        }
        Ok(PaymentInitiation::Initiated(
            self.ensure_payment_intent(work_item_id).await?,
        ))
    }

    /// Creates or retrieves the single payment intent for this work item.
    pub async fn ensure_payment_intent(&self, work_item_id: Uuid) -> Result<PaymentIntentRef> {
        let item = self.load_work_item(work_item_id).await?;
        if !matches!(item.status, WorkItemStatus::Approved | WorkItemStatus::Paid) {
            return Err(item.invalid("start payment for"));
        }

        let record = match self.payments.find_by_work_item(work_item_id).await? {
            Some(record) => record,
            None if item.status == WorkItemStatus::Approved => {
                match self
                    .payments
                    .insert_if_absent(PaymentRecord::for_work_item(&item))
                    .await?
                {
                    InsertOutcome::Inserted(record) => {
                        info!(work_item = %item.id, payment_record = %record.id, amount = %record.amount, "payment record created");
                        record
                    }
                    InsertOutcome::Existing(record) => {
                        debug!(work_item = %item.id, payment_record = %record.id, "payment already in progress");
                        return Ok(record.intent_ref());
                    }
                }
            }
            None => {
                return Err(EngineError::internal(format!(
                    "work item {} is paid but has no payment record",
                    item.id
                )));
            }
        };

        self.advance_intent(record).await
    }

    async fn advance_intent(&self, mut record: PaymentRecord) -> Result<PaymentIntentRef> {
        if record.review_hold.is_some() {
            return Err(EngineError::PaymentOnHold(record.id));
        }
        match record.status {
            PaymentStatus::Completed => return Ok(record.intent_ref()),
            PaymentStatus::Pending if record.gateway_intent_id.is_none() => {}
            PaymentStatus::Pending | PaymentStatus::Processing if record.has_live_intent() => {
                return Ok(record.intent_ref());
            }
            PaymentStatus::Pending | PaymentStatus::Processing | PaymentStatus::Failed => {
                let expected = record.status;
                record.reopen();
                match self.payments.compare_and_swap(expected, record).await? {
                    CasOutcome::Applied(reopened) => {
                        info!(work_item = %reopened.work_item_id, attempt = reopened.attempt, "payment reopened");
                        record = reopened;
                    }
                    CasOutcome::Conflict(current) => return Ok(current.intent_ref()),
                }
            }
        }
        self.request_intent(record).await
    }

    async fn request_intent(&self, mut record: PaymentRecord) -> Result<PaymentIntentRef> {
        let request = CreateIntentRequest {
            amount: record.amount,
            currency: record.currency.clone(),
            idempotency_key: record.idempotency_key(),
            metadata: IntentMetadata {
                work_item_id: record.work_item_id,
                contractor_id: record.contractor_id.clone(),
                business_id: record.business_id.clone(),
            },
        };
        let intent = match self.call_gateway(self.gateway.create_intent(request)).await {
            Ok(intent) => intent,
            Err(err) => {
                warn!(
                    work_item = %record.work_item_id,
                    payment_record = %record.id,
                    error = %err,
                    "gateway intent creation failed, record left pending"
                );
                return Err(err);
            }
        };

        record.gateway_intent_id = Some(intent.intent_id);
        record.gateway_client_secret = Some(intent.client_secret);
        record.gateway_intent_status = Some(intent.status);
        record.status = PaymentStatus::Processing;
        match self
            .payments
            .compare_and_swap(PaymentStatus::Pending, record)
            .await?
        {
            CasOutcome::Applied(record) => {
                info!(
                    work_item = %record.work_item_id,
                    payment_record = %record.id,
                    intent = record.gateway_intent_id.as_deref().unwrap_or_default(),
                    "payment intent attached"
                );
                Ok(record.intent_ref())
            }
            CasOutcome::Conflict(current) => Ok(current.intent_ref()),
        }
    }

    /// Confirms settlement of `gateway_intent_id` and completes the payment once.
    ///
    /// Safe to call any number of times, in any order, for webhook redelivery or
    /// polling: a completed record only replays its idempotent bookkeeping.
    pub async fn finalize_payment(&self, work_item_id: Uuid, gateway_intent_id: &str) -> Result<FinalizeOutcome> {
        let record = self
            .payments
            .find_by_work_item(work_item_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("payment record for work item {work_item_id}")))?;
        if record.gateway_intent_id.as_deref() != Some(gateway_intent_id) {
            error!(
                work_item = %work_item_id,
                stored = ?record.gateway_intent_id,
                received = gateway_intent_id,
                "intent does not belong to this work item"
            );
            return Err(EngineError::IntentMismatch {
                work_item: work_item_id,
                stored: record.gateway_intent_id,
                received: gateway_intent_id.to_string(),
            });
        }
        if record.status == PaymentStatus::Completed {
            self.settle_downstream(&record).await?;
            return Ok(FinalizeOutcome::AlreadyCompleted(record));
        }
        if record.review_hold.is_some() {
            return Err(EngineError::PaymentOnHold(record.id));
        }

        let snapshot = self
            .call_gateway(self.gateway.get_intent(gateway_intent_id))
            .await?;
        match snapshot.status {
            GatewayIntentStatus::Succeeded => self.complete(record, snapshot).await,
            status if status.is_unsuccessful() => self.fail(record, status).await,
            status => self.refresh_intent_status(record, status).await,
        }
    }

    async fn complete(&self, mut record: PaymentRecord, snapshot: IntentSnapshot) -> Result<FinalizeOutcome> {
        let settled = snapshot.settled_amount.unwrap_or(Decimal::ZERO);
        if settled != record.amount.value() || snapshot.currency != record.currency {
            let mismatch = EngineError::AmountMismatch {
                payment_record: record.id,
                expected: record.amount.value(),
                settled,
                currency: record.currency.to_string(),
            };
            error!(
                payment_record = %record.id,
                expected = %record.amount,
                %settled,
                settled_currency = %snapshot.currency,
                "settled amount does not match ledger, payment held for review"
            );
            let expected = record.status;
            record.review_hold = Some(mismatch.to_string());
            record.gateway_intent_status = Some(snapshot.status);
            if let Err(err) = self.payments.compare_and_swap(expected, record).await {
                warn!(error = %err, "could not persist review hold");
            }
            return Err(mismatch);
        }

        let expected = record.status;
        record.status = PaymentStatus::Completed;
        record.completed_at = Some(Utc::now());
        record.processor_reference = snapshot.processor_reference;
        record.gateway_intent_status = Some(GatewayIntentStatus::Succeeded);
        let record = match self.payments.compare_and_swap(expected, record).await? {
            CasOutcome::Applied(record) => {
                info!(
                    work_item = %record.work_item_id,
                    payment_record = %record.id,
                    amount = %record.amount,
                    currency = %record.currency,
                    "payment completed"
                );
                record
            }
            CasOutcome::Conflict(current) if current.status == PaymentStatus::Completed => {
                self.settle_downstream(&current).await?;
                return Ok(FinalizeOutcome::AlreadyCompleted(current));
            }
            CasOutcome::Conflict(current) => {
                return Err(EngineError::StorageConflict(format!(
                    "payment record {} moved to {} during finalization",
                    current.id, current.status
                )));
            }
        };

        self.settle_downstream(&record).await?;
        notify_quietly(
            &self.notifier,
            EngagementEvent::PaymentCompleted {
                work_item_id: record.work_item_id,
                payment_record_id: record.id,
                contractor_id: record.contractor_id.clone(),
                amount: record.amount,
                currency: record.currency.clone(),
            },
        )
        .await;
        Ok(FinalizeOutcome::Completed(record))
    }

    async fn fail(&self, mut record: PaymentRecord, status: GatewayIntentStatus) -> Result<FinalizeOutcome> {
        let expected = record.status;
        record.status = PaymentStatus::Failed;
        record.gateway_intent_status = Some(status);
        match self.payments.compare_and_swap(expected, record).await? {
            CasOutcome::Applied(record) if expected == PaymentStatus::Failed => {
                debug!(payment_record = %record.id, ?status, "failure already recorded");
                Ok(FinalizeOutcome::Failed(record))
            }
            CasOutcome::Applied(record) => {
                warn!(work_item = %record.work_item_id, payment_record = %record.id, ?status, "payment failed at gateway");
                notify_quietly(
                    &self.notifier,
                    EngagementEvent::PaymentFailed {
                        work_item_id: record.work_item_id,
                        payment_record_id: record.id,
                        business_id: record.business_id.clone(),
                    },
                )
                .await;
                Ok(FinalizeOutcome::Failed(record))
            }
            CasOutcome::Conflict(current) => Ok(Self::outcome_for(current)),
        }
    }

    async fn refresh_intent_status(&self, mut record: PaymentRecord, status: GatewayIntentStatus) -> Result<FinalizeOutcome> {
        if record.gateway_intent_status == Some(status) {
            return Ok(FinalizeOutcome::Pending(record));
        }
        let expected = record.status;
        record.gateway_intent_status = Some(status);
        match self.payments.compare_and_swap(expected, record).await? {
            CasOutcome::Applied(record) => Ok(FinalizeOutcome::Pending(record)),
            CasOutcome::Conflict(current) => Ok(Self::outcome_for(current)),
        }
    }

    fn outcome_for(record: PaymentRecord) -> FinalizeOutcome {
        match record.status {
            PaymentStatus::Completed => FinalizeOutcome::AlreadyCompleted(record),
            PaymentStatus::Failed => FinalizeOutcome::Failed(record),
            PaymentStatus::Pending | PaymentStatus::Processing => FinalizeOutcome::Pending(record),
        }
    }

    /// Budget spend, business invoice, contractor receipt and compliance entry, in
    /// that order, then the work item moves to `paid`. A failed bookkeeping step is
    /// retried in the background and never reverts the completed payment.
    async fn settle_downstream(&self, record: &PaymentRecord) -> Result<()> {
        for step in BookkeepingStep::ALL {
            if let Err(err) = self.run_step(step, record).await {
                warn!(
                    payment_record = %record.id,
                    step = step.as_str(),
                    error = %err,
                    "bookkeeping step failed, retrying in background"
                );
                self.spawn_retry(step, record.clone());
            }
        }
        self.mark_work_item_paid(record).await
    }

    /// Runs every bookkeeping step in the foreground, whatever state the work item
    /// is in, and reports the first failure after all steps have been attempted.
    pub async fn replay_bookkeeping(&self, record: &PaymentRecord) -> Result<()> {
        if record.status != PaymentStatus::Completed {
            return Err(EngineError::PaymentNotCompleted(record.id));
        }
        let mut first_failure = None;
        for step in BookkeepingStep::ALL {
            if let Err(err) = self.run_step(step, record).await {
                warn!(payment_record = %record.id, step = step.as_str(), error = %err, "bookkeeping replay step failed");
                first_failure.get_or_insert(err);
            }
        }
        self.mark_work_item_paid(record).await?;
        first_failure.map_or(Ok(()), Err)
    }

    pub async fn run_step(&self, step: BookkeepingStep, record: &PaymentRecord) -> Result<()> {
        match step {
            BookkeepingStep::BudgetSpend => self
                .budget
                .record_spend(record.id, &record.business_id, record.amount, &record.currency)
                .await
                .map(|_| ()),
            BookkeepingStep::BusinessInvoice => self
                .invoices
                .generate(record.id, DocumentType::BusinessInvoice)
                .await
                .map(|_| ()),
            BookkeepingStep::ContractorReceipt => self
                .invoices
                .generate(record.id, DocumentType::ContractorReceipt)
                .await
                .map(|_| ()),
            BookkeepingStep::ComplianceEntry => self.compliance.record(record.id).await.map(|_| ()),
        }
    }

    fn spawn_retry(&self, step: BookkeepingStep, record: PaymentRecord) {
        let controller = self.clone();
        tokio::spawn(async move {
            for attempt in 1..=controller.retry.max_attempts {
                tokio::time::sleep(controller.retry.backoff(attempt)).await;
                match controller.run_step(step, &record).await {
                    Ok(()) => {
                        info!(payment_record = %record.id, step = step.as_str(), attempt, "bookkeeping retry succeeded");
                        return;
                    }
                    Err(err) => {
                        warn!(payment_record = %record.id, step = step.as_str(), attempt, error = %err, "bookkeeping retry failed");
                    }
                }
            }
            error!(
                payment_record = %record.id,
                step = step.as_str(),
                "bookkeeping retries exhausted, left for reconciliation"
            );
        });
    }

    async fn mark_work_item_paid(&self, record: &PaymentRecord) -> Result<()> {
        let mut item = self.load_work_item(record.work_item_id).await?;
        if item.status == WorkItemStatus::Paid {
            return Ok(());
        }
        item.mark_paid(record.completed_at.unwrap_or_else(Utc::now))?;
        match self
            .work_items
            .compare_and_swap(WorkItemStatus::Approved, item)
            .await?
        {
            CasOutcome::Applied(item) => {
                info!(work_item = %item.id, "work item paid");
                Ok(())
            }
            CasOutcome::Conflict(current) if current.status == WorkItemStatus::Paid => Ok(()),
            CasOutcome::Conflict(current) => Err(current.invalid("mark paid")),
        }
    }

    pub async fn payment_status(&self, work_item_id: Uuid) -> Result<PaymentStatusView> {
        let item = self.load_work_item(work_item_id).await?;
        let payment = self.payments.find_by_work_item(work_item_id).await?;
        let message = match (&item.status, &payment) {
            (WorkItemStatus::Paid, _) => "paid",
            (WorkItemStatus::Approved, Some(record)) if record.review_hold.is_some() => {
                "payment on hold — under review"
            }
            (WorkItemStatus::Approved, Some(record)) => match record.status {
                PaymentStatus::Completed => "paid",
                PaymentStatus::Processing => "payment processing",
                PaymentStatus::Pending | PaymentStatus::Failed => "payment failed — retry available",
            },
            (WorkItemStatus::Approved, None) => {
                match self
                    .budget
                    .check_and_reserve(&item.business_id, item.amount, &item.currency)
                    .await?
                {
                    BudgetCheck::Insufficient { .. } => "payment pending — awaiting funds",
                    BudgetCheck::Within { .. } | BudgetCheck::CurrencyMismatch { .. } => {
                        "payment failed — retry available"
                    }
                }
            }
            _ => "no payment due",
        };
        Ok(PaymentStatusView {
            work_item_id,
            work_item_status: item.status,
            payment,
            message,
        })
    }

    pub async fn load_work_item(&self, work_item_id: Uuid) -> Result<WorkItem> {
        self.work_items
            .get(work_item_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("work item {work_item_id}")))
    }

    async fn call_gateway<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::GatewayUnavailable(format!(
                "no response within {:?}",
                self.gateway_timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine::Engine;
    use crate::domain::party::PartyId;
    use crate::domain::work_item::{Decision, ProposalDetails};
    use crate::infrastructure::directory::InMemoryDirectory;
    use crate::infrastructure::gateway::SimulatedGateway;
    use crate::infrastructure::in_memory::in_memory_stores;
    use crate::infrastructure::notifier::LogNotifier;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn approved_item(config: EngineConfig) -> (Engine, SimulatedGateway, WorkItem) {
        let gateway = SimulatedGateway::new();
        let directory = InMemoryDirectory::new();
        directory.register_contractor(PartyId::from("dev")).await;
        let engine = Engine::new(
            in_memory_stores(),
            Arc::new(gateway.clone()),
            Arc::new(directory),
            Arc::new(LogNotifier),
            config,
        );
        let biz = PartyId::from("biz");
        let dev = PartyId::from("dev");
        let item = engine
            .engagement
            .propose(
                biz.clone(),
                dev.clone(),
                dec!(80),
                "USD",
                ProposalDetails {
                    title: "Landing page".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        engine.engagement.respond(item.id, &dev, Decision::Accept).await.unwrap();
        engine
            .engagement
            .submit_deliverable(item.id, &dev, vec!["https://staging.example".to_string()], None)
            .await
            .unwrap();
        gateway.set_unavailable(true).await;
        let outcome = engine.engagement.approve(item.id, &biz).await.unwrap();
        gateway.set_unavailable(false).await;
        (engine, gateway, outcome.work_item)
    }

    #[test]
    fn test_user_messages() {
        let budget = PaymentInitiation::Deferred(EngineError::InsufficientBudget {
            business: "biz".to_string(),
            cap: dec!(100),
            used: dec!(90),
            requested: dec!(20),
        });
        assert_eq!(budget.user_message(), "payment pending — awaiting funds");

        let offline = PaymentInitiation::Deferred(EngineError::GatewayUnavailable("down".to_string()));
        assert_eq!(offline.user_message(), "payment failed — retry available");
        assert_eq!(PaymentInitiation::AlreadyPaid.user_message(), "paid");
    }

    #[tokio::test]
    async fn test_gateway_timeout_leaves_record_pending() {
        let config = EngineConfig {
            gateway_timeout: Duration::from_millis(20),
            ..EngineConfig::default()
        };
        let (engine, gateway, item) = approved_item(config).await;
        gateway.set_latency(Some(Duration::from_millis(200))).await;

        let err = engine.payments.ensure_payment_intent(item.id).await.unwrap_err();
        assert!(matches!(err, EngineError::GatewayUnavailable(_)));
        assert!(err.is_retryable());

        let view = engine.payments.payment_status(item.id).await.unwrap();
        assert_eq!(view.work_item_status, WorkItemStatus::Approved);
        assert_eq!(view.payment.unwrap().status, PaymentStatus::Pending);
        assert_eq!(view.message, "payment failed — retry available");
    }

    #[tokio::test]
    async fn test_pending_record_reuses_idempotency_key() {
        let (engine, gateway, item) = approved_item(EngineConfig::default()).await;

        let first = engine.payments.ensure_payment_intent(item.id).await.unwrap();
        let second = engine.payments.ensure_payment_intent(item.id).await.unwrap();
        assert_eq!(first.gateway_intent_id, second.gateway_intent_id);
        assert_eq!(first.status, PaymentStatus::Processing);
        assert_eq!(gateway.intents_created().await, 1);
    }

    #[tokio::test]
    async fn test_ensure_refuses_unapproved_item() {
        let (engine, _, _) = approved_item(EngineConfig::default()).await;
        let other = engine
            .engagement
            .propose(
                PartyId::from("biz"),
                PartyId::from("dev"),
                dec!(5),
                "USD",
                ProposalDetails {
                    title: "Typo fix".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = engine.payments.ensure_payment_intent(other.id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransitionError {
                current: WorkItemStatus::Proposed,
                ..
            }
        ));
    }
}
