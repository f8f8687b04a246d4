use super::money::{Amount, Balance, Currency};
use super::party::PartyId;
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Per-business running total of completed spend against an optional cap.
///
/// A ledger holds one currency, pinned by the first spend applied to it; no FX is
/// performed. `used` only grows through [`BudgetLedger::apply_spend`], once per
/// payment record.
///
/// The set of applied payment record ids lives on the ledger row itself so the
/// increment and its idempotency guard are persisted in the same write.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct BudgetLedger {
    pub business_id: PartyId,
    pub cap: Option<Balance>,
    pub used: Balance,
    #[serde(default)]
    pub currency: Option<Currency>,
    pub period_started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub applied_payments: BTreeSet<Uuid>,
}

/// Result of the advisory pre-payment budget check.
#[derive(Debug, PartialEq, Clone)]
pub enum BudgetCheck {
    /// `remaining` is `None` when the business has no cap.
    Within { remaining: Option<Balance> },
    Insufficient {
        cap: Balance,
        used: Balance,
        requested: Amount,
    },
    /// The ledger is kept in another currency.
    CurrencyMismatch { ledger: Currency, requested: Currency },
}

impl BudgetLedger {
    pub fn new(business_id: PartyId) -> Self {
        let now = Utc::now();
        Self {
            business_id,
            cap: None,
            used: Balance::ZERO,
            currency: None,
            period_started_at: now,
            updated_at: now,
            applied_payments: BTreeSet::new(),
        }
    }

    pub fn check(&self, amount: Amount, currency: &Currency) -> BudgetCheck {
        if let Some(ledger) = &self.currency
            && ledger != currency
        {
            return BudgetCheck::CurrencyMismatch {
                ledger: ledger.clone(),
                requested: currency.clone(),
            };
        }
        match self.cap {
            Some(cap) if self.used + Balance::from(amount) > cap => BudgetCheck::Insufficient {
                cap,
                used: self.used,
                requested: amount,
            },
            Some(cap) => BudgetCheck::Within {
                remaining: Some(cap - self.used),
            },
            None => BudgetCheck::Within { remaining: None },
        }
    }

    /// Adds a completed payment to `used`. Returns `false` if this payment record
    /// was already applied.
    ///
    /// The cap is not consulted; it only gates the start of a payment. Spend in a
    /// currency other than the ledger's is refused and leaves the ledger untouched.
    pub fn apply_spend(
        &mut self,
        payment_record_id: Uuid,
        amount: Amount,
        currency: &Currency,
    ) -> Result<bool, EngineError> {
        if self.applied_payments.contains(&payment_record_id) {
            return Ok(false);
        }
        if let Some(ledger) = &self.currency
            && ledger != currency
        {
            return Err(EngineError::ValidationError(format!(
                "Budget ledger for {} is kept in {ledger}, payment {payment_record_id} is in {currency}",
                self.business_id
            )));
        }
        self.applied_payments.insert(payment_record_id);
        self.currency = Some(currency.clone());
        self.used += Balance::from(amount);
        self.updated_at = Utc::now();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn gbp() -> Currency {
        Currency::new("GBP").unwrap()
    }

    #[test]
    fn test_check_without_cap() {
        let ledger = BudgetLedger::new(PartyId::from("biz"));
        assert_eq!(
            ledger.check(Amount::new(dec!(1000000)).unwrap(), &gbp()),
            BudgetCheck::Within { remaining: None }
        );
    }

    #[test]
    fn test_check_over_cap() {
        let mut ledger = BudgetLedger::new(PartyId::from("biz"));
        ledger.cap = Some(Balance::new(dec!(100.00)));
        ledger.used = Balance::new(dec!(90.00));

        assert!(matches!(
            ledger.check(Amount::new(dec!(20.00)).unwrap(), &gbp()),
            BudgetCheck::Insufficient { .. }
        ));
        assert_eq!(
            ledger.check(Amount::new(dec!(10.00)).unwrap(), &gbp()),
            BudgetCheck::Within {
                remaining: Some(Balance::new(dec!(10.00)))
            }
        );
    }

    #[test]
    fn test_apply_spend_is_idempotent() {
        let mut ledger = BudgetLedger::new(PartyId::from("biz"));
        let payment = Uuid::new_v4();
        assert!(ledger.apply_spend(payment, Amount::new(dec!(500)).unwrap(), &gbp()).unwrap());
        assert!(!ledger.apply_spend(payment, Amount::new(dec!(500)).unwrap(), &gbp()).unwrap());
        assert_eq!(ledger.used, Balance::new(dec!(500)));
        assert_eq!(ledger.currency, Some(gbp()));
    }

    #[test]
    fn test_other_currency_is_refused() {
        let mut ledger = BudgetLedger::new(PartyId::from("biz"));
        ledger.cap = Some(Balance::new(dec!(1000)));
        let jpy = Currency::new("JPY").unwrap();
        assert!(ledger.apply_spend(Uuid::new_v4(), Amount::new(dec!(400)).unwrap(), &gbp()).unwrap());

        let err = ledger
            .apply_spend(Uuid::new_v4(), Amount::new(dec!(90000)).unwrap(), &jpy)
            .unwrap_err();
        assert!(matches!(err, EngineError::ValidationError(_)));
        assert_eq!(ledger.used, Balance::new(dec!(400)));
        assert_eq!(ledger.applied_payments.len(), 1);
        assert_eq!(
            ledger.check(Amount::new(dec!(1)).unwrap(), &jpy),
            BudgetCheck::CurrencyMismatch {
                ledger: gbp(),
                requested: jpy,
            }
        );
    }
}
