mod common;

use chrono::Utc;
use common::TestContext;
use uuid::Uuid;
use visitpay::{
    domain::{MembershipStatus, NewMembership, Payment, PaymentStatus, PayoutBreakdown, UserRole},
    repository::{Insert, MembershipRepository, PaymentRepository, Transition, UserRepository},
};

fn payment(appointment_id: Uuid, requester_id: Uuid, provider_id: Uuid, status: PaymentStatus) -> Payment {
    let now = Utc::now();
    Payment {
        id: Uuid::new_v4(),
        appointment_id,
        requester_id,
        provider_id,
        amount_cents: 16264,
        currency: "usd".to_string(),
        status,
        stripe_charge_id: Some(format!("ch_{}", Uuid::new_v4().simple())),
        stripe_customer_id: None,
        payout: PayoutBreakdown {
            hours_worked: 1.5,
            mileage: 32.0,
            specialist_pay_cents: 6000,
            mileage_pay_cents: 840,
            company_revenue_cents: 8360,
            tax_cents: 1064,
            base_service_cents: 14000,
            travel_fee_cents: 1200,
        },
        paid_at: Some(now),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn test_one_completed_payment_per_appointment() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let senior = ctx.user(UserRole::Senior, None).await?;
    let specialist = ctx.user(UserRole::Specialist, None).await?;
    let appointment = ctx.appointment(&senior, &specialist).await?;
    let repo = &ctx.services.payment_repo;

    let failed = repo
        .create(payment(appointment.id, senior.id, specialist.id, PaymentStatus::Failed))
        .await?;
    assert!(matches!(failed, Insert::Created(_)));

    let first = repo
        .create(payment(appointment.id, senior.id, specialist.id, PaymentStatus::Completed))
        .await?;
    let first = match first {
        Insert::Created(p) => p,
        Insert::AlreadyExists => panic!("first completed payment should insert"),
    };

    let second = repo
        .create(payment(appointment.id, senior.id, specialist.id, PaymentStatus::Completed))
        .await?;
    assert_eq!(second, Insert::AlreadyExists);

    let found = repo.find_completed_by_appointment(appointment.id).await?.unwrap();
    assert_eq!(found.id, first.id);
    assert_eq!(found.payout, first.payout);
    assert_eq!(repo.list_by_appointment(appointment.id).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_membership_uniqueness() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let senior = ctx.user(UserRole::Senior, None).await?;
    let plan = ctx.plan("basic", 7500, 0).await?;
    let repo = &ctx.services.membership_repo;

    let new = |subscription_id: &str, status: MembershipStatus| NewMembership {
        user_id: senior.id,
        plan_id: plan.id,
        status,
        stripe_subscription_id: subscription_id.to_string(),
        stripe_customer_id: Some("cus_1".to_string()),
        next_billing_date: None,
        covered_user_ids: vec![senior.id],
    };

    let created = repo.create(new("sub_1", MembershipStatus::Active)).await?;
    let membership = match created {
        Insert::Created(m) => m,
        Insert::AlreadyExists => panic!("first membership should insert"),
    };

    // Same subscription again.
    assert_eq!(repo.create(new("sub_1", MembershipStatus::Pending)).await?, Insert::AlreadyExists);
    // A second active membership for the same user.
    assert_eq!(repo.create(new("sub_2", MembershipStatus::Active)).await?, Insert::AlreadyExists);
    // A pending one is fine.
    assert!(matches!(repo.create(new("sub_3", MembershipStatus::Pending)).await?, Insert::Created(_)));

    let found = repo.find_by_subscription_and_user("sub_1", senior.id).await?.unwrap();
    assert_eq!(found.id, membership.id);
    assert!(repo.find_by_subscription_and_user("sub_1", Uuid::new_v4()).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_membership_transition_is_compare_and_swap() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let senior = ctx.user(UserRole::Senior, None).await?;
    let plan = ctx.plan("basic", 7500, 0).await?;
    let repo = &ctx.services.membership_repo;

    let membership = match repo
        .create(NewMembership {
            user_id: senior.id,
            plan_id: plan.id,
            status: MembershipStatus::Pending,
            stripe_subscription_id: "sub_1".to_string(),
            stripe_customer_id: None,
            next_billing_date: None,
            covered_user_ids: vec![senior.id],
        })
        .await?
    {
        Insert::Created(m) => m,
        Insert::AlreadyExists => panic!("membership should insert"),
    };

    let billing = Utc::now() + chrono::Duration::days(30);
    assert_eq!(
        repo.transition_status(membership.id, MembershipStatus::Pending, MembershipStatus::Active, Some(billing))
            .await?,
        Transition::Applied
    );
    assert_eq!(
        repo.transition_status(membership.id, MembershipStatus::Pending, MembershipStatus::Active, None)
            .await?,
        Transition::Stale
    );

    let stored = repo.find_by_id(membership.id).await?.unwrap();
    assert_eq!(stored.status, MembershipStatus::Active);
    assert!(stored.next_billing_date.is_some());

    Ok(())
}

#[tokio::test]
async fn test_stripe_customer_is_set_once() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let senior = ctx.user(UserRole::Senior, None).await?;
    let repo = &ctx.services.user_repo;

    repo.set_stripe_customer_if_missing(senior.id, "cus_first").await?;
    repo.set_stripe_customer_if_missing(senior.id, "cus_second").await?;

    let stored = repo.find_by_id(senior.id).await?.unwrap();
    assert_eq!(stored.stripe_customer_id.as_deref(), Some("cus_first"));

    Ok(())
}

#[tokio::test]
async fn test_membership_cas_reports_second_active_as_conflict() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let senior = ctx.user(UserRole::Senior, None).await?;
    let plan = ctx.plan("basic", 7500, 0).await?;
    let repo = &ctx.services.membership_repo;

    let membership = |subscription_id: &str, status| NewMembership {
        user_id: senior.id,
        plan_id: plan.id,
        status,
        stripe_subscription_id: subscription_id.to_string(),
        stripe_customer_id: None,
        next_billing_date: None,
        covered_user_ids: vec![senior.id],
    };

    assert!(matches!(
        repo.create(membership("sub_1", MembershipStatus::Active)).await?,
        Insert::Created(_)
    ));
    let pending = match repo.create(membership("sub_2", MembershipStatus::Pending)).await? {
        Insert::Created(m) => m,
        Insert::AlreadyExists => panic!("pending membership should insert"),
    };

    assert_eq!(
        repo.transition_status(pending.id, MembershipStatus::Pending, MembershipStatus::Active, None)
            .await?,
        Transition::Conflict
    );
    let stored = repo.find_by_id(pending.id).await?.unwrap();
    assert_eq!(stored.status, MembershipStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn test_sessions_expire_and_are_cleaned_up() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let senior = ctx.user(UserRole::Senior, None).await?;
    let auth = &ctx.services.auth_service;

    let (_, live) = auth.create_session(senior.id, 1).await?;
    let (_, stale) = auth.create_session(senior.id, -1).await?;

    let session = auth.validate_session(&live).await?.expect("live session validates");
    assert_eq!(session.user_id, senior.id);
    assert!(auth.validate_session(&stale).await?.is_none());
    assert!(auth.validate_session("not-a-token").await?.is_none());

    assert_eq!(auth.cleanup_expired_sessions().await?, 1);
    assert!(auth.validate_session(&live).await?.is_some());

    Ok(())
}
