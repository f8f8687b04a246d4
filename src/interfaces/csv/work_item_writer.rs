use crate::domain::payment::PaymentRecord;
use crate::domain::work_item::WorkItem;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct WorkItemRow<'a> {
    work_item: String,
    title: &'a str,
    business: &'a str,
    contractor: &'a str,
    amount: Decimal,
    currency: &'a str,
    status: &'static str,
    payment: &'static str,
}

/// Writes the final state of work items as CSV, one row per item.
///
/// `payment` is the status of the item's payment record, or `none`.
pub struct WorkItemWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> WorkItemWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_work_items<'a>(
        &mut self,
        rows: impl IntoIterator<Item = (&'a WorkItem, Option<&'a PaymentRecord>)>,
    ) -> Result<()> {
        let mut wrote_any = false;
        for (item, payment) in rows {
            self.writer.serialize(WorkItemRow {
                work_item: item.id.to_string(),
                title: &item.title,
                business: item.business_id.as_str(),
                contractor: item.contractor_id.as_str(),
                amount: item.amount.value(),
                currency: item.currency.as_str(),
                status: item.status.as_str(),
                payment: payment.map(|record| record.status.as_str()).unwrap_or("none"),
            })?;
            wrote_any = true;
        }
        if !wrote_any {
            self.writer.write_record([
                "work_item",
                "title",
                "business",
                "contractor",
                "amount",
                "currency",
                "status",
                "payment",
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
