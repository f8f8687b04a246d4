use crate::config::EngineConfig;
use crate::domain::compliance::{ComplianceAmounts, ComplianceLogEntry, TriggerEvent};
use crate::domain::payment::PaymentStatus;
use crate::domain::ports::{ComplianceStoreRef, InsertOutcome, PaymentRecordStoreRef, WorkItemStoreRef};
use crate::error::{EngineError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

/// Writes one immutable audit row per completed payment.
#[derive(Clone)]
pub struct ComplianceRecorder {
    payments: PaymentRecordStoreRef,
    work_items: WorkItemStoreRef,
    compliance: ComplianceStoreRef,
    fee_rate: Decimal,
}

impl ComplianceRecorder {
    pub fn new(
        payments: PaymentRecordStoreRef,
        work_items: WorkItemStoreRef,
        compliance: ComplianceStoreRef,
        config: &EngineConfig,
    ) -> Self {
        Self {
            payments,
            work_items,
            compliance,
            fee_rate: config.platform_fee_rate,
        }
    }

    /// Returns the entry for this payment record, writing it on first call.
    pub async fn record(&self, payment_record_id: Uuid) -> Result<ComplianceLogEntry> {
        if let Some(existing) = self.compliance.get(payment_record_id).await? {
            return Ok(existing);
        }

        let record = self
            .payments
            .get(payment_record_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("payment record {payment_record_id}")))?;
        if record.status != PaymentStatus::Completed {
            return Err(EngineError::PaymentNotCompleted(record.id));
        }
        let item = self
            .work_items
            .get(record.work_item_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("work item {}", record.work_item_id)))?;
        let (Some(approved_by), Some(approved_at)) = (item.approved_by.clone(), item.approved_at) else {
            return Err(EngineError::internal(format!(
                "work item {} has a completed payment but no approval",
                item.id
            )));
        };

        let (platform_fee, net) = record.amount.split_fee(self.fee_rate);
        let entry = ComplianceLogEntry {
            id: Uuid::new_v4(),
            payment_record_id: record.id,
            work_item_id: record.work_item_id,
            business_id: record.business_id.clone(),
            contractor_id: record.contractor_id.clone(),
            amounts: ComplianceAmounts {
                gross: record.amount,
                platform_fee,
                net,
                currency: record.currency.clone(),
            },
            trigger_event: TriggerEvent::WorkItemApproved { approved_by },
            approval_timestamp: approved_at,
            payment_timestamp: record.completed_at.unwrap_or(record.scheduled_at),
            gateway_intent_id: record.gateway_intent_id.clone().unwrap_or_default(),
            processor_reference: record.processor_reference.clone(),
            recorded_at: Utc::now(),
        };

        match self.compliance.insert_if_absent(entry).await? {
            InsertOutcome::Inserted(entry) => {
                info!(payment_record = %entry.payment_record_id, work_item = %entry.work_item_id, "compliance entry recorded");
                Ok(entry)
            }
            InsertOutcome::Existing(entry) => Ok(entry),
        }
    }

    pub async fn entry_for(&self, payment_record_id: Uuid) -> Result<Option<ComplianceLogEntry>> {
        self.compliance.get(payment_record_id).await
    }

    pub async fn entries(&self) -> Result<Vec<ComplianceLogEntry>> {
        self.compliance.get_all().await
    }
}
