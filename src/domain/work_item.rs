use super::money::{Amount, Currency};
use super::party::PartyId;
use crate::error::EngineError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Proposed,
    Accepted,
    Declined,
    InReview,
    Rejected,
    Approved,
    Paid,
}

impl WorkItemStatus {
    /// The complete transition table. Anything not listed here is rejected.
    pub fn can_transition_to(self, next: WorkItemStatus) -> bool {
        use WorkItemStatus::*;
        matches!(
            (self, next),
            (Proposed, Accepted)
                | (Proposed, Declined)
                | (Accepted, InReview)
                | (Rejected, InReview)
                | (InReview, Approved)
                | (InReview, Rejected)
                | (Approved, Paid)
        )
    }

    /// True once the contractor has accepted, whatever happened afterwards.
    pub fn is_post_acceptance(self) -> bool {
        !matches!(self, WorkItemStatus::Proposed | WorkItemStatus::Declined)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkItemStatus::Proposed => "proposed",
            WorkItemStatus::Accepted => "accepted",
            WorkItemStatus::Declined => "declined",
            WorkItemStatus::InReview => "in_review",
            WorkItemStatus::Rejected => "rejected",
            WorkItemStatus::Approved => "approved",
            WorkItemStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The contractor's answer to a proposal.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Decline,
}

impl Decision {
    pub fn target(self) -> WorkItemStatus {
        match self {
            Decision::Accept => WorkItemStatus::Accepted,
            Decision::Decline => WorkItemStatus::Declined,
        }
    }
}

/// Reference to delivered evidence held by the object storage service.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Deliverable {
    pub evidence_urls: Vec<String>,
    pub note: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Descriptive fields supplied by the business when proposing work.
#[derive(Debug, Clone, Default)]
pub struct ProposalDetails {
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
}

/// A unit of paid work between one business and one contractor.
///
/// `amount` is the trusted amount: every payment, invoice and integrity check is
/// sized from it. It can only change through [`WorkItem::revise_terms`] while the
/// item is still `proposed`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct WorkItem {
    pub id: Uuid,
    pub business_id: PartyId,
    pub contractor_id: PartyId,
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub amount: Amount,
    pub currency: Currency,
    pub status: WorkItemStatus,
    /// Every submission, oldest first. Resubmission after rejection appends.
    pub deliverables: Vec<Deliverable>,
    pub rejection_reason: Option<String>,
    pub approved_by: Option<PartyId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn propose(
        business_id: PartyId,
        contractor_id: PartyId,
        amount: Amount,
        currency: Currency,
        details: ProposalDetails,
    ) -> Result<Self, EngineError> {
        if details.title.trim().is_empty() {
            return Err(EngineError::ValidationError(
                "Work item title must not be empty".to_string(),
            ));
        }
        if business_id == contractor_id {
            return Err(EngineError::ValidationError(
                "A business cannot engage itself as contractor".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            business_id,
            contractor_id,
            title: details.title,
            description: details.description,
            due_date: details.due_date,
            amount,
            currency,
            status: WorkItemStatus::Proposed,
            deliverables: Vec::new(),
            rejection_reason: None,
            approved_by: None,
            approved_at: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_contractor(&self, actor: &PartyId) -> bool {
        &self.contractor_id == actor
    }

    pub fn is_business(&self, actor: &PartyId) -> bool {
        &self.business_id == actor
    }

    fn transition(&mut self, next: WorkItemStatus, attempted: &'static str) -> Result<(), EngineError> {
        if !self.status.can_transition_to(next) {
            return Err(self.invalid(attempted));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn invalid(&self, attempted: &'static str) -> EngineError {
        EngineError::InvalidTransitionError {
            work_item: self.id,
            current: self.status,
            attempted,
        }
    }

    pub fn revise_terms(&mut self, amount: Amount, currency: Currency) -> Result<(), EngineError> {
        if self.status != WorkItemStatus::Proposed {
            return Err(self.invalid("revise terms of"));
        }
        self.amount = amount;
        self.currency = currency;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn respond(&mut self, decision: Decision) -> Result<(), EngineError> {
        self.transition(decision.target(), "respond to")
    }

    pub fn submit(&mut self, deliverable: Deliverable) -> Result<(), EngineError> {
        self.transition(WorkItemStatus::InReview, "submit deliverable for")?;
        self.deliverables.push(deliverable);
        Ok(())
    }

    pub fn approve(&mut self, approver: PartyId) -> Result<(), EngineError> {
        self.transition(WorkItemStatus::Approved, "approve")?;
        self.approved_by = Some(approver);
        self.approved_at = Some(self.updated_at);
        Ok(())
    }

    pub fn reject(&mut self, reason: String) -> Result<(), EngineError> {
        self.transition(WorkItemStatus::Rejected, "reject")?;
        self.rejection_reason = Some(reason);
        Ok(())
    }

    pub fn mark_paid(&mut self, paid_at: DateTime<Utc>) -> Result<(), EngineError> {
        self.transition(WorkItemStatus::Paid, "mark paid")?;
        self.paid_at = Some(paid_at);
        Ok(())
    }
}
