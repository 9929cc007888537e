mod common;

use std::time::Duration;

use common::TestContext;
use uuid::Uuid;
use visitpay::{
    client::{Backoff, PollOutcome, ReconcileClient, RetryPolicy, TerminalAction},
    domain::UserRole,
    payments::{
        fake::{subscription, succeeded_charge},
        FakeOperation, SubscriptionState, META_USER_ID,
    },
};

fn policy(max_attempts: u32, escalate_after: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        interval: Duration::from_millis(5),
        backoff: Backoff::Fixed,
        escalate_after,
        terminal: TerminalAction::ProceedOptimistically,
    }
}

/// Serves the app on an ephemeral port and returns a client logged in as `user_id`.
async fn serve(ctx: &TestContext, user_id: Uuid) -> anyhow::Result<ReconcileClient> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = ctx.router(None);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let (_, token) = ctx.services.auth_service.create_session(user_id, 1).await?;
    Ok(ReconcileClient::new(&format!("http://{}", addr), "session", &token)?)
}

#[tokio::test]
async fn test_foreign_subscription_fails_without_retrying() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let owner = ctx.user(UserRole::Senior, None).await?;
    let intruder = ctx.user(UserRole::Senior, None).await?;
    let plan = ctx.plan("basic", 7500, 0).await?;
    ctx.gateway
        .add_subscription(subscription("sub_x", SubscriptionState::Active, owner.id, plan.id, None))
        .await;

    let client = serve(&ctx, intruder.id).await?;
    let outcome = client.await_membership("sub_x", &policy(5, 0)).await;

    match outcome {
        PollOutcome::Failed(e) => assert_eq!(e.code(), Some("forbidden")),
        other => panic!("expected a hard failure, got {:?}", other),
    }
    assert_eq!(ctx.gateway.calls(FakeOperation::RetrieveSubscription).await, 1);

    Ok(())
}

#[tokio::test]
async fn test_misprovisioned_subscription_fails_without_retrying() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let senior = ctx.user(UserRole::Senior, None).await?;
    let plan = ctx.plan("basic", 7500, 0).await?;
    let mut sub = subscription("sub_x", SubscriptionState::Active, senior.id, plan.id, None);
    sub.metadata.remove(META_USER_ID);
    ctx.gateway.add_subscription(sub).await;

    let client = serve(&ctx, senior.id).await?;
    let outcome = client.await_membership("sub_x", &policy(5, 0)).await;

    match outcome {
        PollOutcome::Failed(e) => assert_eq!(e.code(), Some("invalid_state")),
        other => panic!("expected a hard failure, got {:?}", other),
    }
    assert_eq!(ctx.gateway.calls(FakeOperation::RetrieveSubscription).await, 1);

    Ok(())
}

#[tokio::test]
async fn test_unready_subscription_is_polled_until_exhausted() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let senior = ctx.user(UserRole::Senior, None).await?;
    let plan = ctx.plan("basic", 7500, 0).await?;
    ctx.gateway
        .add_subscription(subscription(
            "sub_x",
            SubscriptionState::IncompleteExpired,
            senior.id,
            plan.id,
            None,
        ))
        .await;

    let client = serve(&ctx, senior.id).await?;
    let outcome = client.await_membership("sub_x", &policy(3, 0)).await;

    assert!(matches!(
        outcome,
        PollOutcome::Exhausted(TerminalAction::ProceedOptimistically)
    ));
    assert_eq!(ctx.gateway.calls(FakeOperation::RetrieveSubscription).await, 3);

    Ok(())
}

#[tokio::test]
async fn test_payment_is_found_after_escalating() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let senior = ctx.user(UserRole::Senior, None).await?;
    let specialist = ctx.user(UserRole::Specialist, None).await?;
    let appointment = ctx.appointment(&senior, &specialist).await?;
    ctx.gateway
        .add_charge(succeeded_charge("ch_1", appointment.id, 16264, None))
        .await;

    let client = serve(&ctx, senior.id).await?;
    let outcome = client
        .await_payment(appointment.id, Some("ch_1"), &policy(4, 2), Duration::ZERO)
        .await;

    match outcome {
        PollOutcome::Completed(payment) => {
            assert_eq!(payment.appointment_id, appointment.id);
            assert_eq!(payment.stripe_charge_id.as_deref(), Some("ch_1"));
        }
        other => panic!("expected the payment, got {:?}", other),
    }
    assert_eq!(ctx.gateway.calls(FakeOperation::RetrieveCharge).await, 1);

    Ok(())
}

#[tokio::test]
async fn test_unknown_appointment_fails_on_first_probe() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let senior = ctx.user(UserRole::Senior, None).await?;

    let client = serve(&ctx, senior.id).await?;
    let outcome = client
        .await_payment(Uuid::new_v4(), None, &policy(5, 2), Duration::ZERO)
        .await;

    match outcome {
        PollOutcome::Failed(e) => assert_eq!(e.code(), Some("not_found")),
        other => panic!("expected a hard failure, got {:?}", other),
    }
    assert_eq!(ctx.gateway.total_calls().await, 0);

    Ok(())
}
