use super::payments::{FinalizeOutcome, PaymentIntentController};
use crate::domain::payment::PaymentStatus;
use crate::domain::ports::PaymentRecordStoreRef;
use serde::Serialize;
use tracing::{info, warn};

/// Counts of what one reconciliation pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub examined: usize,
    pub completed: usize,
    pub replayed: usize,
    pub reinitiated: usize,
    pub still_pending: usize,
    pub failed: usize,
    pub on_hold: usize,
    pub errors: usize,
}

/// Resolves payment records left behind by timeouts, lost webhooks and crashes.
///
/// Everything it does goes through the controller's idempotent operations, so a
/// pass can run at any time and any number of times.
#[derive(Clone)]
pub struct Reconciler {
    payments: PaymentRecordStoreRef,
    controller: PaymentIntentController,
}

impl Reconciler {
    pub fn new(payments: PaymentRecordStoreRef, controller: PaymentIntentController) -> Self {
        Self {
            payments,
            controller,
        }
    }

    pub async fn reconcile(&self) -> crate::error::Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for record in self.payments.get_all().await? {
            report.examined += 1;
            if record.review_hold.is_some() {
                report.on_hold += 1;
                continue;
            }

            match (record.status, record.gateway_intent_id.as_deref()) {
                (PaymentStatus::Failed, _) => report.failed += 1,
                // Every pass; each step is a no-op once it has been written.
                (PaymentStatus::Completed, Some(_)) => {
                    match self.controller.replay_bookkeeping(&record).await {
                        Ok(()) => report.replayed += 1,
                        Err(err) => {
                            warn!(payment_record = %record.id, error = %err, "bookkeeping replay failed");
                            report.errors += 1;
                        }
                    }
                }
                (PaymentStatus::Completed, None) => {}
                (_, Some(intent_id)) => {
                    match self.controller.finalize_payment(record.work_item_id, intent_id).await {
                        Ok(FinalizeOutcome::Completed(_)) => report.completed += 1,
                        Ok(FinalizeOutcome::AlreadyCompleted(_)) => report.replayed += 1,
                        Ok(FinalizeOutcome::Pending(_)) => report.still_pending += 1,
                        Ok(FinalizeOutcome::Failed(_)) => report.failed += 1,
                        Err(err) => {
                            warn!(payment_record = %record.id, error = %err, "reconcile finalize failed");
                            report.errors += 1;
                        }
                    }
                }
                (_, None) => match self.controller.ensure_payment_intent(record.work_item_id).await {
                    Ok(_) => report.reinitiated += 1,
                    Err(err) => {
                        warn!(payment_record = %record.id, error = %err, "reconcile could not attach intent");
                        report.errors += 1;
                    }
                },
            }
        }

        info!(?report, "reconciliation finished");
        Ok(report)
    }
}
