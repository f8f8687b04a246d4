use super::money::{Amount, Balance, Currency};
use super::party::PartyId;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    BusinessInvoice,
    ContractorReceipt,
}

impl DocumentType {
    pub const ALL: [DocumentType; 2] = [DocumentType::BusinessInvoice, DocumentType::ContractorReceipt];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::BusinessInvoice => "business_invoice",
            DocumentType::ContractorReceipt => "contractor_receipt",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amounts shown to each audience. The business is shown what it paid; only the
/// contractor sees the platform fee broken out.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "audience", rename_all = "snake_case")]
pub enum AmountBreakdown {
    BusinessInvoice {
        gross: Amount,
    },
    ContractorReceipt {
        gross: Amount,
        platform_fee: Balance,
        net: Balance,
    },
}

impl AmountBreakdown {
    pub fn for_audience(document_type: DocumentType, gross: Amount, fee_rate: rust_decimal::Decimal) -> Self {
        match document_type {
            DocumentType::BusinessInvoice => AmountBreakdown::BusinessInvoice { gross },
            DocumentType::ContractorReceipt => {
                let (platform_fee, net) = gross.split_fee(fee_rate);
                AmountBreakdown::ContractorReceipt {
                    gross,
                    platform_fee,
                    net,
                }
            }
        }
    }

    pub fn document_type(&self) -> DocumentType {
        match self {
            AmountBreakdown::BusinessInvoice { .. } => DocumentType::BusinessInvoice,
            AmountBreakdown::ContractorReceipt { .. } => DocumentType::ContractorReceipt,
        }
    }

    pub fn gross(&self) -> Amount {
        match self {
            AmountBreakdown::BusinessInvoice { gross } => *gross,
            AmountBreakdown::ContractorReceipt { gross, .. } => *gross,
        }
    }
}

/// A generated financial record. Never mutated once stored.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct InvoiceDocument {
    pub id: Uuid,
    pub payment_record_id: Uuid,
    pub document_type: DocumentType,
    /// Raw counter value within `period`, shared by both documents of a payment.
    pub sequence: u64,
    pub period: String,
    /// Human-readable number, e.g. `INV-202610-00007` or `INV-202610-00007-R`.
    pub number: String,
    pub currency: Currency,
    pub breakdown: AmountBreakdown,
    /// The party this document is addressed to.
    pub issued_to: PartyId,
    pub counterparty: PartyId,
    pub issued_at: DateTime<Utc>,
}

/// Calendar-month scope of the invoice counter, e.g. `2026-10`.
pub fn sequence_period(at: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", at.year(), at.month())
}

/// Formats the shared number for one audience. The receipt is the invoice number
/// plus a fixed suffix so the two stay visibly linked.
pub fn document_number(
    prefix: &str,
    suffix: &str,
    period: &str,
    sequence: u64,
    document_type: DocumentType,
) -> String {
    let compact: String = period.chars().filter(char::is_ascii_digit).collect();
    let base = format!("{prefix}-{compact}-{sequence:05}");
    match document_type {
        DocumentType::BusinessInvoice => base,
        DocumentType::ContractorReceipt => format!("{base}-{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_period_is_calendar_month() {
        let at = Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap();
        assert_eq!(sequence_period(at), "2026-03");
    }

    #[test]
    fn test_numbers_are_linked() {
        let invoice = document_number("INV", "R", "2026-10", 7, DocumentType::BusinessInvoice);
        let receipt = document_number("INV", "R", "2026-10", 7, DocumentType::ContractorReceipt);
        assert_eq!(invoice, "INV-202610-00007");
        assert_eq!(receipt, "INV-202610-00007-R");
        assert!(receipt.starts_with(&invoice));
    }

    #[test]
    fn test_business_invoice_hides_fee() {
        let gross = Amount::new(dec!(500)).unwrap();
        let invoice = AmountBreakdown::for_audience(DocumentType::BusinessInvoice, gross, dec!(0.10));
        assert_eq!(invoice, AmountBreakdown::BusinessInvoice { gross });

        let json = serde_json::to_value(&invoice).unwrap();
        assert_eq!(json["audience"], "business_invoice");
        assert!(json.get("platform_fee").is_none());
    }

    #[test]
    fn test_contractor_receipt_breakdown() {
        let gross = Amount::new(dec!(500)).unwrap();
        let receipt = AmountBreakdown::for_audience(DocumentType::ContractorReceipt, gross, dec!(0.10));
        match &receipt {
            AmountBreakdown::ContractorReceipt {
                platform_fee, net, ..
            } => {
                assert_eq!(*platform_fee, Balance::new(dec!(50)));
                assert_eq!(*net, Balance::new(dec!(450)));
            }
            other => panic!("unexpected breakdown {other:?}"),
        }
        assert_eq!(receipt.document_type(), DocumentType::ContractorReceipt);
    }
}
