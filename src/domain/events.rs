use super::money::{Amount, Currency};
use super::party::PartyId;
use serde::Serialize;
use uuid::Uuid;

/// Fire-and-forget events handed to the notification service.
#[derive(Debug, Serialize, PartialEq, Clone)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EngagementEvent {
    WorkItemApproved {
        work_item_id: Uuid,
        business_id: PartyId,
        contractor_id: PartyId,
    },
    PaymentCompleted {
        work_item_id: Uuid,
        payment_record_id: Uuid,
        contractor_id: PartyId,
        amount: Amount,
        currency: Currency,
    },
    PaymentFailed {
        work_item_id: Uuid,
        payment_record_id: Uuid,
        business_id: PartyId,
    },
}

impl EngagementEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngagementEvent::WorkItemApproved { .. } => "workItemApproved",
            EngagementEvent::PaymentCompleted { .. } => "paymentCompleted",
            EngagementEvent::PaymentFailed { .. } => "paymentFailed",
        }
    }

    pub fn work_item_id(&self) -> Uuid {
        match self {
            EngagementEvent::WorkItemApproved { work_item_id, .. }
            | EngagementEvent::PaymentCompleted { work_item_id, .. }
            | EngagementEvent::PaymentFailed { work_item_id, .. } => *work_item_id,
        }
    }
}
