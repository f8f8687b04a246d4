use super::notify_quietly;
use super::payments::{PaymentInitiation, PaymentIntentController, PaymentStatusView};
use crate::domain::events::EngagementEvent;
use crate::domain::money::{Amount, Currency};
use crate::domain::party::PartyId;
use crate::domain::ports::{CasOutcome, NotifierRef, PartyDirectoryRef, WorkItemStoreRef};
use crate::domain::work_item::{Decision, Deliverable, ProposalDetails, WorkItem, WorkItemStatus};
use crate::error::{EngineError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

const MAX_CAS_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Business,
    Contractor,
}

/// Result of `approve`: the committed work item plus how payment initiation went.
#[derive(Debug)]
pub struct ApprovalOutcome {
    pub work_item: WorkItem,
    pub payment: PaymentInitiation,
}

impl ApprovalOutcome {
    /// What the approving business sees for the payment, next to "work approved".
    pub fn payment_message(&self) -> &'static str {
        self.payment.user_message()
    }
}

/// The work item state machine and its per-operation authorization.
///
/// Every transition is committed with a compare-and-swap on the status the
/// transition was validated against, so concurrent duplicates resolve to one
/// winner. Losers re-read and either observe that their decision already holds
/// (idempotent success) or fail naming the state they found.
#[derive(Clone)]
pub struct WorkEngagementService {
    work_items: WorkItemStoreRef,
    directory: PartyDirectoryRef,
    payments: PaymentIntentController,
    notifier: NotifierRef,
}

impl WorkEngagementService {
    pub fn new(
        work_items: WorkItemStoreRef,
        directory: PartyDirectoryRef,
        payments: PaymentIntentController,
        notifier: NotifierRef,
    ) -> Self {
        Self {
            work_items,
            directory,
            payments,
            notifier,
        }
    }

    pub async fn propose(
        &self,
        business_id: PartyId,
        contractor_id: PartyId,
        amount: Decimal,
        currency: &str,
        details: ProposalDetails,
    ) -> Result<WorkItem> {
        let amount = Amount::new(amount)?;
        let currency = Currency::new(currency)?;
        if !self.directory.contractor_exists(&contractor_id).await? {
            return Err(EngineError::ValidationError(format!(
                "Contractor {contractor_id} does not exist"
            )));
        }
        let item = WorkItem::propose(business_id, contractor_id, amount, currency, details)?;
        self.work_items.insert(item.clone()).await?;
        info!(
            work_item = %item.id,
            business = %item.business_id,
            contractor = %item.contractor_id,
            %amount,
            currency = %item.currency,
            "work item proposed"
        );
        Ok(item)
    }

    pub async fn revise_terms(
        &self,
        work_item_id: Uuid,
        actor: &PartyId,
        amount: Decimal,
        currency: &str,
    ) -> Result<WorkItem> {
        let amount = Amount::new(amount)?;
        let currency = Currency::new(currency)?;
        let (item, _) = self
            .commit(
                work_item_id,
                actor,
                Role::Business,
                "revise terms of",
                |_| false,
                |item| item.revise_terms(amount, currency.clone()),
            )
            .await?;
        info!(work_item = %item.id, amount = %item.amount, currency = %item.currency, "terms revised");
        Ok(item)
    }

    /// Repeating a decision that already holds is a success returning the current item.
    pub async fn respond(&self, work_item_id: Uuid, actor: &PartyId, decision: Decision) -> Result<WorkItem> {
        let (item, applied) = self
            .commit(
                work_item_id,
                actor,
                Role::Contractor,
                "respond to",
                |item| match decision {
                    Decision::Accept => item.status.is_post_acceptance(),
                    Decision::Decline => item.status == WorkItemStatus::Declined,
                },
                |item| item.respond(decision),
            )
            .await?;
        if applied {
            info!(work_item = %item.id, status = %item.status, "proposal answered");
        } else {
            debug!(work_item = %item.id, status = %item.status, "decision already applied");
        }
        Ok(item)
    }

    pub async fn submit_deliverable(
        &self,
        work_item_id: Uuid,
        actor: &PartyId,
        evidence_urls: Vec<String>,
        note: Option<String>,
    ) -> Result<WorkItem> {
        if evidence_urls.iter().all(|url| url.trim().is_empty()) {
            return Err(EngineError::ValidationError(
                "A deliverable needs at least one evidence reference".to_string(),
            ));
        }
        let deliverable = Deliverable {
            evidence_urls,
            note,
            submitted_at: Utc::now(),
        };
        let (item, _) = self
            .commit(
                work_item_id,
                actor,
                Role::Contractor,
                "submit deliverable for",
                |_| false,
                |item| item.submit(deliverable.clone()),
            )
            .await?;
        info!(work_item = %item.id, submissions = item.deliverables.len(), "deliverable submitted");
        Ok(item)
    }

    /// Commits `approved` first, then starts payment. The approval stands whatever
    /// the payment outcome.
    pub async fn approve(&self, work_item_id: Uuid, actor: &PartyId) -> Result<ApprovalOutcome> {
        let approver = actor.clone();
        let (item, applied) = self
            .commit(
                work_item_id,
                actor,
                Role::Business,
                "approve",
                |item| matches!(item.status, WorkItemStatus::Approved | WorkItemStatus::Paid),
                |item| item.approve(approver.clone()),
            )
            .await?;

        if applied {
            info!(work_item = %item.id, approver = %actor, "work approved");
            notify_quietly(
                &self.notifier,
                EngagementEvent::WorkItemApproved {
                    work_item_id: item.id,
                    business_id: item.business_id.clone(),
                    contractor_id: item.contractor_id.clone(),
                },
            )
            .await;
        }

        let payment = if item.status == WorkItemStatus::Paid {
            PaymentInitiation::AlreadyPaid
        } else {
            self.payments.initiate(item.id).await
        };
        Ok(ApprovalOutcome {
            work_item: item,
            payment,
        })
    }

    pub async fn reject(&self, work_item_id: Uuid, actor: &PartyId, reason: &str) -> Result<WorkItem> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::ValidationError(
                "A rejection needs a reason".to_string(),
            ));
        }
        let (item, _) = self
            .commit(
                work_item_id,
                actor,
                Role::Business,
                "reject",
                |item| item.status == WorkItemStatus::Rejected,
                |item| item.reject(reason.to_string()),
            )
            .await?;
        info!(work_item = %item.id, "work rejected");
        Ok(item)
    }

    /// Re-runs payment initiation for an approved but unpaid item. Callable any
    /// number of times.
    pub async fn retry_payment(&self, work_item_id: Uuid, actor: &PartyId) -> Result<PaymentInitiation> {
        let item = self.get(work_item_id).await?;
        Self::authorize(&item, actor, Role::Business, "retry payment for")?;
        match item.status {
            WorkItemStatus::Paid => Ok(PaymentInitiation::AlreadyPaid),
            WorkItemStatus::Approved => Ok(self.payments.initiate(item.id).await),
            _ => Err(item.invalid("retry payment for")),
        }
    }

    pub async fn payment_status(&self, work_item_id: Uuid) -> Result<PaymentStatusView> {
        self.payments.payment_status(work_item_id).await
    }

    pub async fn get(&self, work_item_id: Uuid) -> Result<WorkItem> {
        self.payments.load_work_item(work_item_id).await
    }

    pub async fn list(&self) -> Result<Vec<WorkItem>> {
        self.work_items.get_all().await
    }

    fn authorize(item: &WorkItem, actor: &PartyId, role: Role, action: &'static str) -> Result<()> {
        let allowed = match role {
            Role::Business => item.is_business(actor),
            Role::Contractor => item.is_contractor(actor),
        };
        if allowed {
            Ok(())
        } else {
            Err(EngineError::UnauthorizedActor {
                actor: actor.to_string(),
                action,
                work_item: item.id,
            })
        }
    }

    /// Load, authorize, apply, compare-and-swap. Returns the stored item and
    /// whether this call performed the transition.
    async fn commit<Done, Apply>(
        &self,
        work_item_id: Uuid,
        actor: &PartyId,
        role: Role,
        action: &'static str,
        already_applied: Done,
        apply: Apply,
    ) -> Result<(WorkItem, bool)>
    where
        Done: Fn(&WorkItem) -> bool + Send + Sync,
        Apply: Fn(&mut WorkItem) -> Result<()> + Send + Sync,
    {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let item = self.get(work_item_id).await?;
            Self::authorize(&item, actor, role, action)?;
            if already_applied(&item) {
                return Ok((item, false));
            }

            let expected = item.status;
            let mut next = item;
            apply(&mut next)?;
            match self.work_items.compare_and_swap(expected, next).await? {
                CasOutcome::Applied(item) => return Ok((item, true)),
                CasOutcome::Conflict(current) => {
                    debug!(work_item = %work_item_id, current = %current.status, "lost status race, re-reading");
                }
            }
        }
        Err(EngineError::StorageConflict(format!(
            "work item {work_item_id} kept changing during {action}"
        )))
    }
}
