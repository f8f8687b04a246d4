mod common;

use common::{business, harness};
use engagement_ledger::application::payments::{FinalizeOutcome, PaymentInitiation};
use engagement_ledger::domain::events::EngagementEvent;
use engagement_ledger::domain::money::Balance;
use engagement_ledger::domain::payment::{GatewayIntentStatus, PaymentStatus};
use engagement_ledger::domain::work_item::WorkItemStatus;
use engagement_ledger::error::EngineError;
use rand::seq::SliceRandom;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_ensure_payment_intent_is_idempotent() {
    let h = harness().await;
    let item = h.in_review(dec!(500), "GBP").await;
    let outcome = h.engine.engagement.approve(item.id, &business()).await.unwrap();
    let first = outcome.payment.intent().cloned().unwrap();

    for _ in 0..5 {
        let again = h.engine.payments.ensure_payment_intent(item.id).await.unwrap();
        assert_eq!(again, first);
    }
    assert_eq!(h.gateway.intents_created().await, 1);
    assert_eq!(h.gateway.intents_for_work_item(item.id).await.len(), 1);
}

#[tokio::test]
async fn test_duplicate_webhooks_settle_once() {
    let h = harness().await;
    let item = h.in_review(dec!(500), "GBP").await;
    h.engine.engagement.approve(item.id, &business()).await.unwrap();
    let intent = h.intent_id(item.id).await;
    h.gateway.settle(&intent).await.unwrap();

    let mut deliveries: Vec<usize> = (0..12).collect();
    deliveries.shuffle(&mut rand::thread_rng());
    let mut completed = 0;
    for _ in deliveries {
        match h.engine.payments.finalize_payment(item.id, &intent).await.unwrap() {
            FinalizeOutcome::Completed(_) => completed += 1,
            FinalizeOutcome::AlreadyCompleted(_) => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(completed, 1);

    let record = h
        .engine
        .stores
        .payments
        .find_by_work_item(item.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.engine.invoices.documents_for(record.id).await.unwrap().len(), 2);
    assert_eq!(h.engine.compliance.entries().await.unwrap().len(), 1);
    let ledger = h.engine.budget.ledger(&business()).await.unwrap().unwrap();
    assert_eq!(ledger.used, Balance::new(dec!(500)));

    let completions = h
        .notifier
        .events()
        .await
        .into_iter()
        .filter(|event| matches!(event, EngagementEvent::PaymentCompleted { .. }))
        .count();
    assert_eq!(completions, 1);
}

#[tokio::test]
async fn test_amount_mismatch_halts_payment() {
    let h = harness().await;
    let item = h.in_review(dec!(500), "GBP").await;
    h.engine.engagement.approve(item.id, &business()).await.unwrap();
    let intent = h.intent_id(item.id).await;
    h.gateway.settle_with_amount(&intent, dec!(5)).await.unwrap();

    let err = h
        .engine
        .payments
        .finalize_payment(item.id, &intent)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::AmountMismatch {
            expected,
            settled,
            ..
        } if expected == dec!(500) && settled == dec!(5)
    ));
    assert!(!err.is_retryable());

    let record = h
        .engine
        .stores
        .payments
        .find_by_work_item(item.id)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(record.status, PaymentStatus::Completed);
    assert!(record.review_hold.is_some());
    assert_eq!(
        h.engine.engagement.get(item.id).await.unwrap().status,
        WorkItemStatus::Approved
    );
    assert!(h.engine.compliance.entries().await.unwrap().is_empty());

    let hold = h.engine.payments.ensure_payment_intent(item.id).await.unwrap_err();
    assert!(matches!(hold, EngineError::PaymentOnHold(id) if id == record.id));
    let retry = h.engine.engagement.retry_payment(item.id, &business()).await.unwrap();
    assert!(matches!(retry, PaymentInitiation::Deferred(EngineError::PaymentOnHold(_))));
    let view = h.engine.engagement.payment_status(item.id).await.unwrap();
    assert_eq!(view.message, "payment on hold — under review");
}

#[tokio::test]
async fn test_foreign_intent_is_rejected() {
    let h = harness().await;
    let first = h.in_review(dec!(20), "USD").await;
    let second = h.in_review(dec!(30), "USD").await;
    h.engine.engagement.approve(first.id, &business()).await.unwrap();
    h.engine.engagement.approve(second.id, &business()).await.unwrap();
    let foreign = h.intent_id(second.id).await;
    h.gateway.settle(&foreign).await.unwrap();

    let err = h
        .engine
        .payments
        .finalize_payment(first.id, &foreign)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::IntentMismatch { .. }));
    assert_eq!(
        h.engine.engagement.get(first.id).await.unwrap().status,
        WorkItemStatus::Approved
    );
}

#[tokio::test]
async fn test_gateway_outage_never_reverts_approval() {
    let h = harness().await;
    let item = h.in_review(dec!(120), "USD").await;
    h.gateway.set_unavailable(true).await;

    let outcome = h.engine.engagement.approve(item.id, &business()).await.unwrap();
    assert_eq!(outcome.work_item.status, WorkItemStatus::Approved);
    assert!(matches!(
        outcome.payment,
        PaymentInitiation::Deferred(EngineError::GatewayUnavailable(_))
    ));
    assert_eq!(outcome.payment_message(), "payment failed — retry available");

    let record = h
        .engine
        .stores
        .payments
        .find_by_work_item(item.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Pending);
    assert!(record.gateway_intent_id.is_none());

    // Still down: retrying is safe and changes nothing.
    let retry = h.engine.engagement.retry_payment(item.id, &business()).await.unwrap();
    assert!(matches!(retry, PaymentInitiation::Deferred(_)));

    h.gateway.set_unavailable(false).await;
    let retry = h.engine.engagement.retry_payment(item.id, &business()).await.unwrap();
    let intent = retry.intent().cloned().unwrap();
    assert_eq!(intent.payment_record_id, record.id);
    assert_eq!(h.gateway.intents_created().await, 1);

    h.settle(item.id).await.unwrap();
    assert_eq!(
        h.engine.engagement.get(item.id).await.unwrap().status,
        WorkItemStatus::Paid
    );
}

#[tokio::test]
async fn test_failed_intent_can_be_retried_with_new_intent() {
    let h = harness().await;
    let item = h.in_review(dec!(90), "USD").await;
    h.engine.engagement.approve(item.id, &business()).await.unwrap();
    let first_intent = h.intent_id(item.id).await;
    h.gateway.fail(&first_intent).await.unwrap();

    let outcome = h
        .engine
        .payments
        .finalize_payment(item.id, &first_intent)
        .await
        .unwrap();
    let failed = match outcome {
        FinalizeOutcome::Failed(record) => record,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(failed.gateway_intent_status, Some(GatewayIntentStatus::Failed));
    let view = h.engine.engagement.payment_status(item.id).await.unwrap();
    assert_eq!(view.message, "payment failed — retry available");

    let retry = h.engine.engagement.retry_payment(item.id, &business()).await.unwrap();
    let second_intent = retry.intent().and_then(|i| i.gateway_intent_id.clone()).unwrap();
    assert_ne!(second_intent, first_intent);

    let record = h
        .engine
        .stores
        .payments
        .find_by_work_item(item.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.id, failed.id);
    assert_eq!(record.attempt, 2);

    h.settle(item.id).await.unwrap();
    assert_eq!(h.engine.compliance.entries().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_redelivered_failure_notifies_once() {
    let h = harness().await;
    let item = h.in_review(dec!(35), "USD").await;
    h.engine.engagement.approve(item.id, &business()).await.unwrap();
    let intent = h.intent_id(item.id).await;
    h.gateway.fail(&intent).await.unwrap();

    for _ in 0..3 {
        let outcome = h
            .engine
            .payments
            .finalize_payment(item.id, &intent)
            .await
            .unwrap();
        assert!(matches!(outcome, FinalizeOutcome::Failed(_)));
    }

    let failures = h
        .notifier
        .events()
        .await
        .into_iter()
        .filter(|event| matches!(event, EngagementEvent::PaymentFailed { .. }))
        .count();
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn test_non_terminal_status_only_refreshes() {
    let h = harness().await;
    let item = h.in_review(dec!(15), "USD").await;
    h.engine.engagement.approve(item.id, &business()).await.unwrap();
    let intent = h.intent_id(item.id).await;
    h.gateway.mark_processing(&intent).await.unwrap();

    let outcome = h
        .engine
        .payments
        .finalize_payment(item.id, &intent)
        .await
        .unwrap();
    match outcome {
        FinalizeOutcome::Pending(record) => {
            assert_eq!(record.status, PaymentStatus::Processing);
            assert_eq!(record.gateway_intent_status, Some(GatewayIntentStatus::Processing));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_finalize_without_record_is_not_found() {
    let h = harness().await;
    let item = h.in_review(dec!(15), "USD").await;
    let err = h
        .engine
        .payments
        .finalize_payment(item.id, "pi_unknown")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
