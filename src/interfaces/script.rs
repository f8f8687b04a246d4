use super::csv::command_reader::{ScriptCommand, ScriptOp};
use crate::application::engine::Engine;
use crate::domain::compliance::ComplianceLogEntry;
use crate::domain::document::InvoiceDocument;
use crate::domain::party::PartyId;
use crate::domain::payment::PaymentRecord;
use crate::domain::work_item::{Decision, ProposalDetails, WorkItem};
use crate::error::{EngineError, Result};
use crate::infrastructure::directory::InMemoryDirectory;
use crate::infrastructure::gateway::SimulatedGateway;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Everything issued after settlement, as written by `--export`.
#[derive(Debug, Serialize)]
pub struct LedgerExport {
    pub documents: Vec<InvoiceDocument>,
    pub compliance: Vec<ComplianceLogEntry>,
}

/// Replays command scripts against an engine wired to the simulated gateway.
///
/// `settle` and `fail` play the processor's part: they drive the work item's
/// current intent to a terminal state and then deliver the webhook.
pub struct ScriptRunner {
    engine: Engine,
    gateway: SimulatedGateway,
    directory: InMemoryDirectory,
    refs: HashMap<String, Uuid>,
}

impl ScriptRunner {
    pub fn new(engine: Engine, gateway: SimulatedGateway, directory: InMemoryDirectory) -> Self {
        Self {
            engine,
            gateway,
            directory,
            refs: HashMap::new(),
        }
    }

    pub async fn run(&mut self, command: ScriptCommand) -> Result<()> {
        match command.op {
            ScriptOp::Contractor => {
                let contractor = required(command.contractor.or(command.actor), "contractor")?;
                self.directory.register_contractor(PartyId::new(contractor)).await;
            }
            ScriptOp::Budget => {
                let business = PartyId::new(required(command.business.or(command.actor), "business")?);
                self.engine.budget.configure(&business, command.amount).await?;
            }
            ScriptOp::Propose => {
                let reference = required(command.reference, "ref")?;
                if self.refs.contains_key(&reference) {
                    return Err(EngineError::ValidationError(format!(
                        "Reference {reference} is already in use"
                    )));
                }
                let item = self
                    .engine
                    .engagement
                    .propose(
                        PartyId::new(required(command.business.or(command.actor), "business")?),
                        PartyId::new(required(command.contractor, "contractor")?),
                        required(command.amount, "amount")?,
                        &required(command.currency, "currency")?,
                        ProposalDetails {
                            title: command.detail.unwrap_or_default(),
                            ..Default::default()
                        },
                    )
                    .await?;
                self.refs.insert(reference, item.id);
            }
            ScriptOp::Revise => {
                let id = self.work_item_id(&command)?;
                self.engine
                    .engagement
                    .revise_terms(
                        id,
                        &actor(&command)?,
                        required(command.amount, "amount")?,
                        &required(command.currency, "currency")?,
                    )
                    .await?;
            }
            ScriptOp::Accept | ScriptOp::Decline => {
                let id = self.work_item_id(&command)?;
                let decision = if command.op == ScriptOp::Accept {
                    Decision::Accept
                } else {
                    Decision::Decline
                };
                self.engine
                    .engagement
                    .respond(id, &actor(&command)?, decision)
                    .await?;
            }
            ScriptOp::Submit => {
                let id = self.work_item_id(&command)?;
                let evidence = command
                    .detail
                    .as_deref()
                    .unwrap_or_default()
                    .split(';')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(String::from)
                    .collect();
                self.engine
                    .engagement
                    .submit_deliverable(id, &actor(&command)?, evidence, None)
                    .await?;
            }
            ScriptOp::Approve => {
                let id = self.work_item_id(&command)?;
                let outcome = self.engine.engagement.approve(id, &actor(&command)?).await?;
                info!(work_item = %id, payment = outcome.payment_message(), "work approved");
            }
            ScriptOp::Reject => {
                let id = self.work_item_id(&command)?;
                self.engine
                    .engagement
                    .reject(id, &actor(&command)?, command.detail.as_deref().unwrap_or_default())
                    .await?;
            }
            ScriptOp::Settle => {
                let id = self.work_item_id(&command)?;
                let intent = self.current_intent(id).await?;
                match command.amount {
                    Some(amount) => self.gateway.settle_with_amount(&intent, amount).await?,
                    None => self.gateway.settle(&intent).await?,
                }
                self.engine.payments.finalize_payment(id, &intent).await?;
            }
            ScriptOp::Fail => {
                let id = self.work_item_id(&command)?;
                let intent = self.current_intent(id).await?;
                self.gateway.fail(&intent).await?;
                self.engine.payments.finalize_payment(id, &intent).await?;
            }
            ScriptOp::Retry => {
                let id = self.work_item_id(&command)?;
                let initiation = self
                    .engine
                    .engagement
                    .retry_payment(id, &actor(&command)?)
                    .await?;
                info!(work_item = %id, payment = initiation.user_message(), "payment retried");
            }
            ScriptOp::Reconcile => {
                self.engine.reconciler.reconcile().await?;
            }
        }
        Ok(())
    }

    /// Final work items with their payment records, in creation order.
    pub async fn work_items(&self) -> Result<Vec<(WorkItem, Option<PaymentRecord>)>> {
        let mut items = self.engine.engagement.list().await?;
        items.sort_by_key(|item| item.created_at);
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let payment = self.engine.stores.payments.find_by_work_item(item.id).await?;
            rows.push((item, payment));
        }
        Ok(rows)
    }

    pub async fn export(&self) -> Result<LedgerExport> {
        Ok(LedgerExport {
            documents: self.engine.stores.documents.get_all().await?,
            compliance: self.engine.compliance.entries().await?,
        })
    }

    fn work_item_id(&self, command: &ScriptCommand) -> Result<Uuid> {
        let reference = command
            .reference
            .as_deref()
            .ok_or_else(|| EngineError::ValidationError("Missing ref".to_string()))?;
        self.refs
            .get(reference)
            .copied()
            .ok_or_else(|| EngineError::NotFound(format!("work item reference {reference}")))
    }

    async fn current_intent(&self, work_item_id: Uuid) -> Result<String> {
        self.engine
            .stores
            .payments
            .find_by_work_item(work_item_id)
            .await?
            .and_then(|record| record.gateway_intent_id)
            .ok_or_else(|| EngineError::NotFound(format!("payment intent for work item {work_item_id}")))
    }
}

fn required<T>(value: Option<T>, column: &str) -> Result<T> {
    value.ok_or_else(|| EngineError::ValidationError(format!("Missing {column}")))
}

fn actor(command: &ScriptCommand) -> Result<PartyId> {
    required(command.actor.as_deref(), "actor").map(PartyId::from)
}
