mod common;

use common::{business, contractor, harness};
use engagement_ledger::application::payments::{FinalizeOutcome, PaymentInitiation};
use engagement_ledger::domain::document::{AmountBreakdown, DocumentType};
use engagement_ledger::domain::events::EngagementEvent;
use engagement_ledger::domain::money::Balance;
use engagement_ledger::domain::payment::PaymentStatus;
use engagement_ledger::domain::work_item::{Decision, WorkItemStatus};
use engagement_ledger::error::EngineError;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_full_lifecycle_to_paid() {
    let h = harness().await;
    let item = h.in_review(dec!(500), "GBP").await;

    let outcome = h.engine.engagement.approve(item.id, &business()).await.unwrap();
    assert_eq!(outcome.work_item.status, WorkItemStatus::Approved);
    let intent = outcome.payment.intent().cloned().unwrap();
    assert_eq!(intent.status, PaymentStatus::Processing);

    let finalized = h.settle(item.id).await.unwrap();
    assert!(matches!(finalized, FinalizeOutcome::Completed(_)));

    let item = h.engine.engagement.get(item.id).await.unwrap();
    assert_eq!(item.status, WorkItemStatus::Paid);
    assert!(item.paid_at.is_some());

    let record = finalized.record().clone();
    assert_eq!(record.status, PaymentStatus::Completed);
    assert_eq!(record.amount.value(), dec!(500));
    assert!(record.processor_reference.is_some());

    let documents = h.engine.invoices.documents_for(record.id).await.unwrap();
    assert_eq!(documents.len(), 2);
    let invoice = documents
        .iter()
        .find(|doc| doc.document_type == DocumentType::BusinessInvoice)
        .unwrap();
    let receipt = documents
        .iter()
        .find(|doc| doc.document_type == DocumentType::ContractorReceipt)
        .unwrap();
    assert_eq!(invoice.issued_to, business());
    assert_eq!(receipt.issued_to, contractor());
    assert_eq!(invoice.sequence, receipt.sequence);
    assert!(invoice.number.starts_with("INV-"));
    assert!(receipt.number.ends_with("-R"));
    match &receipt.breakdown {
        AmountBreakdown::ContractorReceipt { platform_fee, net, .. } => {
            assert_eq!(*platform_fee, Balance::new(dec!(50.00)));
            assert_eq!(*net, Balance::new(dec!(450.00)));
        }
        other => panic!("unexpected breakdown {other:?}"),
    }

    let entries = h.engine.compliance.entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payment_record_id, record.id);
    assert_eq!(entries[0].amounts.gross.value(), dec!(500));

    let ledger = h.engine.budget.ledger(&business()).await.unwrap().unwrap();
    assert_eq!(ledger.used, Balance::new(dec!(500)));
}

#[tokio::test]
async fn test_declined_item_refuses_further_work() {
    let h = harness().await;
    let item = h.propose(dec!(100), "GBP").await;
    h.engine
        .engagement
        .respond(item.id, &contractor(), Decision::Decline)
        .await
        .unwrap();

    let submit = h
        .engine
        .engagement
        .submit_deliverable(item.id, &contractor(), vec!["s3://late.zip".to_string()], None)
        .await
        .unwrap_err();
    assert!(submit.to_string().contains("declined"));
    assert!(matches!(
        submit,
        EngineError::InvalidTransitionError {
            current: WorkItemStatus::Declined,
            ..
        }
    ));

    let approve = h.engine.engagement.approve(item.id, &business()).await.unwrap_err();
    assert!(matches!(
        approve,
        EngineError::InvalidTransitionError {
            current: WorkItemStatus::Declined,
            ..
        }
    ));

    // Declining again is an idempotent success.
    let again = h
        .engine
        .engagement
        .respond(item.id, &contractor(), Decision::Decline)
        .await
        .unwrap();
    assert_eq!(again.status, WorkItemStatus::Declined);
}

#[tokio::test]
async fn test_reject_then_resubmit_then_pay() {
    let h = harness().await;
    let item = h.in_review(dec!(75.50), "EUR").await;

    let rejected = h
        .engine
        .engagement
        .reject(item.id, &business(), "Palette does not match the brief")
        .await
        .unwrap();
    assert_eq!(rejected.status, WorkItemStatus::Rejected);
    assert_eq!(
        rejected.rejection_reason.as_deref(),
        Some("Palette does not match the brief")
    );

    let resubmitted = h
        .engine
        .engagement
        .submit_deliverable(item.id, &contractor(), vec!["s3://v2.zip".to_string()], None)
        .await
        .unwrap();
    assert_eq!(resubmitted.status, WorkItemStatus::InReview);
    assert_eq!(resubmitted.deliverables.len(), 2);

    let outcome = h.engine.engagement.approve(item.id, &business()).await.unwrap();
    assert!(matches!(outcome.payment, PaymentInitiation::Initiated(_)));
    h.settle(item.id).await.unwrap();
    assert_eq!(
        h.engine.engagement.get(item.id).await.unwrap().status,
        WorkItemStatus::Paid
    );
}

#[tokio::test]
async fn test_only_business_may_approve_or_reject() {
    let h = harness().await;
    let item = h.in_review(dec!(10), "USD").await;

    let approve = h.engine.engagement.approve(item.id, &contractor()).await.unwrap_err();
    assert!(matches!(approve, EngineError::UnauthorizedActor { .. }));
    let reject = h
        .engine
        .engagement
        .reject(item.id, &contractor(), "nope")
        .await
        .unwrap_err();
    assert!(matches!(reject, EngineError::UnauthorizedActor { .. }));
    assert_eq!(
        h.engine.engagement.get(item.id).await.unwrap().status,
        WorkItemStatus::InReview
    );
}

#[tokio::test]
async fn test_approve_after_paid_reports_already_paid() {
    let h = harness().await;
    let item = h.in_review(dec!(40), "USD").await;
    h.engine.engagement.approve(item.id, &business()).await.unwrap();
    h.settle(item.id).await.unwrap();

    let again = h.engine.engagement.approve(item.id, &business()).await.unwrap();
    assert!(matches!(again.payment, PaymentInitiation::AlreadyPaid));
    assert_eq!(again.work_item.status, WorkItemStatus::Paid);

    let view = h.engine.engagement.payment_status(item.id).await.unwrap();
    assert_eq!(view.message, "paid");
}

#[tokio::test]
async fn test_notifications_follow_the_lifecycle() {
    let h = harness().await;
    let item = h.in_review(dec!(60), "USD").await;
    h.engine.engagement.approve(item.id, &business()).await.unwrap();
    h.settle(item.id).await.unwrap();

    let names: Vec<&str> = h
        .notifier
        .events()
        .await
        .iter()
        .map(EngagementEvent::name)
        .collect();
    assert_eq!(names, vec!["workItemApproved", "paymentCompleted"]);
}
