//! Application layer orchestrating the engagement lifecycle.
//!
//! `Engine` wires the services together. The engagement service owns the work
//! item state machine and hands approved items to the payment intent controller,
//! which in turn drives the budget ledger, the document generator and the
//! compliance recorder once money has settled.

pub mod budget;
pub mod compliance;
pub mod documents;
pub mod engagement;
pub mod engine;
pub mod payments;
pub mod reconcile;

use crate::domain::events::EngagementEvent;
use crate::domain::ports::NotifierRef;
use tracing::warn;

/// Delivers an event, logging and swallowing any failure.
pub(crate) async fn notify_quietly(notifier: &NotifierRef, event: EngagementEvent) {
    let name = event.name();
    let work_item = event.work_item_id();
    if let Err(err) = notifier.notify(event).await {
        warn!(event = name, %work_item, error = %err, "notification failed");
    }
}
