use super::money::{Amount, Currency};
use super::party::PartyId;
use super::work_item::WorkItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Record exists but no gateway intent is attached yet.
    Pending,
    /// A gateway intent is attached and money movement is in flight.
    Processing,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a payment intent as reported by the gateway.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GatewayIntentStatus {
    RequiresPaymentMethod,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
}

impl GatewayIntentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GatewayIntentStatus::Succeeded | GatewayIntentStatus::Canceled | GatewayIntentStatus::Failed
        )
    }

    /// Terminal without money having moved; a new intent may be requested.
    pub fn is_unsuccessful(self) -> bool {
        matches!(self, GatewayIntentStatus::Canceled | GatewayIntentStatus::Failed)
    }
}

/// One attempted-or-completed money movement tied to exactly one work item.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentRecord {
    pub id: Uuid,
    /// Unique across all payment records.
    pub work_item_id: Uuid,
    pub business_id: PartyId,
    pub contractor_id: PartyId,
    /// Copied from the work item when the record is created, never from client input.
    pub amount: Amount,
    pub currency: Currency,
    pub status: PaymentStatus,
    /// Starts at 1; bumped each time a failed record is reopened with a fresh intent.
    pub attempt: u32,
    pub gateway_intent_id: Option<String>,
    pub gateway_client_secret: Option<String>,
    pub gateway_intent_status: Option<GatewayIntentStatus>,
    pub processor_reference: Option<String>,
    /// Set when an integrity check failed. Money movement halts until cleared by an operator.
    pub review_hold: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    pub fn for_work_item(item: &WorkItem) -> Self {
        Self {
            id: Uuid::new_v4(),
            work_item_id: item.id,
            business_id: item.business_id.clone(),
            contractor_id: item.contractor_id.clone(),
            amount: item.amount,
            currency: item.currency.clone(),
            status: PaymentStatus::Pending,
            attempt: 1,
            gateway_intent_id: None,
            gateway_client_secret: None,
            gateway_intent_status: None,
            processor_reference: None,
            review_hold: None,
            scheduled_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Key handed to the gateway so a repeated create returns the same intent.
    pub fn idempotency_key(&self) -> String {
        if self.attempt <= 1 {
            self.work_item_id.to_string()
        } else {
            format!("{}:{}", self.work_item_id, self.attempt)
        }
    }

    /// An intent that can still settle: attached and not terminally unsuccessful.
    pub fn has_live_intent(&self) -> bool {
        self.gateway_intent_id.is_some()
            && !self
                .gateway_intent_status
                .is_some_and(GatewayIntentStatus::is_unsuccessful)
    }

    /// Clears the previous intent so a new one can be requested.
    pub fn reopen(&mut self) {
        self.status = PaymentStatus::Pending;
        self.attempt += 1;
        self.gateway_intent_id = None;
        self.gateway_client_secret = None;
        self.gateway_intent_status = None;
        self.scheduled_at = Utc::now();
    }

    pub fn intent_ref(&self) -> PaymentIntentRef {
        PaymentIntentRef {
            payment_record_id: self.id,
            gateway_intent_id: self.gateway_intent_id.clone(),
            client_secret: self.gateway_client_secret.clone(),
            status: self.status,
            intent_status: self.gateway_intent_status,
        }
    }
}

/// What callers of `ensure_payment_intent` receive.
///
/// `gateway_intent_id` is `None` only when another request created the record and
/// is still talking to the gateway.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct PaymentIntentRef {
    pub payment_record_id: Uuid,
    pub gateway_intent_id: Option<String>,
    pub client_secret: Option<String>,
    pub status: PaymentStatus,
    pub intent_status: Option<GatewayIntentStatus>,
}
