use crate::config::EngineConfig;
use crate::domain::document::{
    AmountBreakdown, DocumentType, InvoiceDocument, document_number, sequence_period,
};
use crate::domain::payment::PaymentStatus;
use crate::domain::ports::{DocumentStoreRef, InsertOutcome, PaymentRecordStoreRef};
use crate::error::{EngineError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

/// Issues the business invoice and the contractor receipt for a completed payment.
///
/// Each `(payment record, document type)` pair is generated independently and
/// idempotently, so a failure after the first document is written never
/// duplicates it on retry. Both documents share one sequence number allocated
/// per payment record within the calendar month of completion.
#[derive(Clone)]
pub struct InvoiceGenerator {
    payments: PaymentRecordStoreRef,
    documents: DocumentStoreRef,
    fee_rate: Decimal,
    prefix: String,
    suffix: String,
}

impl InvoiceGenerator {
    pub fn new(payments: PaymentRecordStoreRef, documents: DocumentStoreRef, config: &EngineConfig) -> Self {
        Self {
            payments,
            documents,
            fee_rate: config.platform_fee_rate,
            prefix: config.invoice_prefix.clone(),
            suffix: config.receipt_suffix.clone(),
        }
    }

    /// Returns the id of the document for this pair, creating it on first call.
    pub async fn generate(&self, payment_record_id: Uuid, document_type: DocumentType) -> Result<Uuid> {
        if let Some(existing) = self.documents.find(payment_record_id, document_type).await? {
            return Ok(existing.id);
        }

        let record = self
            .payments
            .get(payment_record_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("payment record {payment_record_id}")))?;
        if record.status != PaymentStatus::Completed {
            return Err(EngineError::PaymentNotCompleted(record.id));
        }
        let completed_at = record
            .completed_at
            .ok_or(EngineError::PaymentNotCompleted(record.id))?;

        let period = sequence_period(completed_at);
        let sequence = self.documents.sequence_for(record.id, &period).await?;
        let (issued_to, counterparty) = match document_type {
            DocumentType::BusinessInvoice => (record.business_id.clone(), record.contractor_id.clone()),
            DocumentType::ContractorReceipt => (record.contractor_id.clone(), record.business_id.clone()),
        };

        let document = InvoiceDocument {
            id: Uuid::new_v4(),
            payment_record_id: record.id,
            document_type,
            sequence,
            number: document_number(&self.prefix, &self.suffix, &period, sequence, document_type),
            period,
            currency: record.currency.clone(),
            breakdown: AmountBreakdown::for_audience(document_type, record.amount, self.fee_rate),
            issued_to,
            counterparty,
            issued_at: Utc::now(),
        };

        match self.documents.insert_if_absent(document).await? {
            InsertOutcome::Inserted(document) => {
                info!(
                    payment_record = %record.id,
                    document_type = %document_type,
                    number = %document.number,
                    "document issued"
                );
                Ok(document.id)
            }
            InsertOutcome::Existing(document) => Ok(document.id),
        }
    }

    pub async fn documents_for(&self, payment_record_id: Uuid) -> Result<Vec<InvoiceDocument>> {
        self.documents.for_payment(payment_record_id).await
    }
}
