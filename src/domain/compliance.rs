use super::money::{Amount, Balance, Currency};
use super::party::PartyId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What caused the money to move.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerEvent {
    WorkItemApproved { approved_by: PartyId },
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ComplianceAmounts {
    pub gross: Amount,
    pub platform_fee: Balance,
    pub net: Balance,
    pub currency: Currency,
}

/// Append-only audit row, one per completed payment record.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ComplianceLogEntry {
    pub id: Uuid,
    pub payment_record_id: Uuid,
    pub work_item_id: Uuid,
    pub business_id: PartyId,
    pub contractor_id: PartyId,
    pub amounts: ComplianceAmounts,
    pub trigger_event: TriggerEvent,
    pub approval_timestamp: DateTime<Utc>,
    pub payment_timestamp: DateTime<Utc>,
    pub gateway_intent_id: String,
    pub processor_reference: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
