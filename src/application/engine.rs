use super::budget::BudgetLedgerService;
use super::compliance::ComplianceRecorder;
use super::documents::InvoiceGenerator;
use super::engagement::WorkEngagementService;
use super::payments::PaymentIntentController;
use super::reconcile::Reconciler;
use crate::config::EngineConfig;
use crate::domain::ports::{LedgerStores, NotifierRef, PartyDirectoryRef, PaymentGatewayRef};

/// The main entry point of the engagement ledger.
///
/// `Engine` owns the storage backends and the external collaborators and wires
/// every service onto the same instances, so callers only ever construct this.
#[derive(Clone)]
pub struct Engine {
    pub engagement: WorkEngagementService,
    pub payments: PaymentIntentController,
    pub budget: BudgetLedgerService,
    pub invoices: InvoiceGenerator,
    pub compliance: ComplianceRecorder,
    pub reconciler: Reconciler,
    pub stores: LedgerStores,
    pub config: EngineConfig,
}

impl Engine {
    pub fn new(
        stores: LedgerStores,
        gateway: PaymentGatewayRef,
        directory: PartyDirectoryRef,
        notifier: NotifierRef,
        config: EngineConfig,
    ) -> Self {
        let budget = BudgetLedgerService::new(stores.budgets.clone());
        let invoices = InvoiceGenerator::new(stores.payments.clone(), stores.documents.clone(), &config);
        let compliance = ComplianceRecorder::new(
            stores.payments.clone(),
            stores.work_items.clone(),
            stores.compliance.clone(),
            &config,
        );
        let payments = PaymentIntentController::new(
            stores.work_items.clone(),
            stores.payments.clone(),
            gateway,
            budget.clone(),
            invoices.clone(),
            compliance.clone(),
            notifier.clone(),
            &config,
        );
        let engagement = WorkEngagementService::new(
            stores.work_items.clone(),
            directory,
            payments.clone(),
            notifier,
        );
        let reconciler = Reconciler::new(stores.payments.clone(), payments.clone());

        Self {
            engagement,
            payments,
            budget,
            invoices,
            compliance,
            reconciler,
            stores,
            config,
        }
    }
}
