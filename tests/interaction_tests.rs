//! Confirmation gate integration tests.

use std::sync::Arc;
use std::time::Duration;

use quill::pipeline::{
    InteractionBroker, InteractionOutcome, TimeoutAction, UserResponse,
};

const TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::test]
async fn response_resolves_exactly_once() {
    let broker = InteractionBroker::new();
    let (id, _rx) = broker.register("read_note");

    assert!(broker.handle_user_response(&id, UserResponse::Confirm));
    assert!(!broker.handle_user_response(&id, UserResponse::Confirm));
    assert!(!broker.handle_user_response("interaction_bogus", UserResponse::Confirm));
}

#[tokio::test]
async fn confirm_wins_the_race() {
    let broker = Arc::new(InteractionBroker::new());
    let (id, rx) = broker.register("read_note");

    let waiter = {
        let broker = broker.clone();
        let id = id.clone();
        tokio::spawn(async move {
            broker
                .await_confirmation(&id, rx, TIMEOUT, TimeoutAction::Execute)
                .await
        })
    };
    tokio::task::yield_now().await;

    assert!(broker.handle_user_response(&id, UserResponse::Confirm));
    assert_eq!(waiter.await.unwrap(), InteractionOutcome::Confirmed);
    assert!(broker.pending_interactions().is_empty());
}

#[tokio::test]
async fn response_sent_before_the_wait_still_lands() {
    let broker = InteractionBroker::new();
    let (id, rx) = broker.register("read_note");

    assert!(broker.handle_user_response(&id, UserResponse::Cancel));
    let outcome = broker
        .await_confirmation(&id, rx, TIMEOUT, TimeoutAction::Execute)
        .await;
    assert_eq!(outcome, InteractionOutcome::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn timeout_executes_by_default() {
    let broker = Arc::new(InteractionBroker::new());
    let (id, rx) = broker.register("read_note");

    let outcome = broker
        .await_confirmation(&id, rx, TIMEOUT, TimeoutAction::Execute)
        .await;
    assert_eq!(outcome, InteractionOutcome::TimeoutExecuted);

    // The deadline removed the entry; a late response is ignored.
    assert!(!broker.handle_user_response(&id, UserResponse::Cancel));
}

#[tokio::test(start_paused = true)]
async fn timeout_can_be_configured_to_cancel() {
    let broker = InteractionBroker::new();
    let (id, rx) = broker.register("attribute_search");

    let outcome = broker
        .await_confirmation(&id, rx, TIMEOUT, TimeoutAction::Cancel)
        .await;
    assert_eq!(outcome, InteractionOutcome::TimeoutCancelled);
}

#[tokio::test]
async fn cancel_all_resolves_every_pending_wait() {
    let broker = Arc::new(InteractionBroker::new());
    let (id_a, rx_a) = broker.register("read_note");
    let (id_b, rx_b) = broker.register("attribute_search");
    assert_eq!(broker.pending_interactions().len(), 2);

    let wait = |id: String, rx| {
        let broker = broker.clone();
        tokio::spawn(async move {
            broker
                .await_confirmation(&id, rx, TIMEOUT, TimeoutAction::Execute)
                .await
        })
    };
    let waiter_a = wait(id_a.clone(), rx_a);
    let waiter_b = wait(id_b.clone(), rx_b);
    tokio::task::yield_now().await;

    broker.cancel_all();
    assert_eq!(waiter_a.await.unwrap(), InteractionOutcome::Cancelled);
    assert_eq!(waiter_b.await.unwrap(), InteractionOutcome::Cancelled);
    assert!(broker.pending_interactions().is_empty());

    // Late responses after teardown are ignored.
    assert!(!broker.handle_user_response(&id_a, UserResponse::Confirm));
    assert!(!broker.handle_user_response(&id_b, UserResponse::Confirm));
}

#[tokio::test]
async fn pending_listing_reports_tool_names() {
    let broker = InteractionBroker::new();
    let (_id, _rx) = broker.register("protected_note");
    let pending = broker.pending_interactions();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].tool_name, "protected_note");
}
