use crate::domain::budget::{BudgetCheck, BudgetLedger};
use crate::domain::money::{Amount, Balance, Currency};
use crate::domain::party::PartyId;
use crate::domain::ports::BudgetStoreRef;
use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

/// Tracks each business's completed spend against an optional cap.
///
/// The check is advisory: it reads the ledger without reserving anything, so a
/// burst of concurrent approvals for one business can overshoot the cap by the
/// payments that were in flight together. Only money movement is gated; approval
/// of work never is.
#[derive(Clone)]
pub struct BudgetLedgerService {
    budgets: BudgetStoreRef,
}

impl BudgetLedgerService {
    pub fn new(budgets: BudgetStoreRef) -> Self {
        Self { budgets }
    }

    /// Read-only pre-payment gate.
    pub async fn check_and_reserve(
        &self,
        business_id: &PartyId,
        amount: Amount,
        currency: &Currency,
    ) -> Result<BudgetCheck> {
        let check = match self.budgets.get(business_id).await? {
            Some(ledger) => ledger.check(amount, currency),
            None => BudgetCheck::Within { remaining: None },
        };
        debug!(business = %business_id, %amount, %currency, ?check, "budget check");
        Ok(check)
    }

    /// Same gate, expressed as an error for callers that propagate with `?`.
    pub async fn ensure_within(&self, business_id: &PartyId, amount: Amount, currency: &Currency) -> Result<()> {
        match self.check_and_reserve(business_id, amount, currency).await? {
            BudgetCheck::Within { .. } => Ok(()),
            BudgetCheck::Insufficient {
                cap,
                used,
                requested,
            } => Err(EngineError::InsufficientBudget {
                business: business_id.to_string(),
                cap: cap.0,
                used: used.0,
                requested: requested.value(),
            }),
            BudgetCheck::CurrencyMismatch { ledger, requested } => Err(EngineError::ValidationError(format!(
                "Budget ledger for {business_id} is kept in {ledger}, payment is in {requested}"
            ))),
        }
    }

    /// Idempotent increment keyed by payment record id.
    pub async fn record_spend(
        &self,
        payment_record_id: Uuid,
        business_id: &PartyId,
        amount: Amount,
        currency: &Currency,
    ) -> Result<bool> {
        let applied = self
            .budgets
            .apply_spend(business_id, payment_record_id, amount, currency)
            .await?;
        if applied {
            info!(business = %business_id, payment_record = %payment_record_id, %amount, "budget spend recorded");
        } else {
            debug!(payment_record = %payment_record_id, "budget spend already recorded");
        }
        Ok(applied)
    }

    /// Sets or clears the cap, creating the ledger on first use.
    pub async fn configure(&self, business_id: &PartyId, cap: Option<Decimal>) -> Result<BudgetLedger> {
        if let Some(cap) = cap
            && cap < Decimal::ZERO
        {
            return Err(EngineError::ValidationError(
                "Budget cap must not be negative".to_string(),
            ));
        }
        let ledger = self.budgets.set_cap(business_id, cap.map(Balance::new)).await?;
        info!(business = %business_id, cap = ?ledger.cap, "budget configured");
        Ok(ledger)
    }

    pub async fn ledger(&self, business_id: &PartyId) -> Result<Option<BudgetLedger>> {
        self.budgets.get(business_id).await
    }
}
