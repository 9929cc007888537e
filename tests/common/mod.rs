#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::{Duration, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;
use visitpay::{
    api::create_app,
    config::Settings,
    domain::{
        Appointment, CreateAppointmentRequest, CreateUserRequest, LocationType, MembershipPlan,
        UserProfile, UserRole,
    },
    payments::{FakeStripeGateway, PaymentProvider, StripeClient},
    pricing::PricingRates,
    repository::{AppointmentRepository, MembershipRepository, UserRepository},
    service::{ScanLimits, ServiceContext},
};

/// An in-memory database with the real migrations. One connection, so
/// every query sees the same database.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

pub struct TestContext {
    pub pool: SqlitePool,
    pub gateway: Arc<FakeStripeGateway>,
    pub services: ServiceContext,
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        let pool = test_pool().await?;
        let gateway = Arc::new(FakeStripeGateway::new());
        let provider: Arc<dyn PaymentProvider> = gateway.clone();
        let services = ServiceContext::new(
            pool.clone(),
            provider,
            PricingRates::default(),
            ScanLimits::default(),
        );

        Ok(Self { pool, gateway, services })
    }

    /// The HTTP app over the same database and gateway. Webhooks are only
    /// accepted when `stripe` is given.
    pub fn router(&self, stripe: Option<StripeClient>) -> Router {
        let provider: Arc<dyn PaymentProvider> = self.gateway.clone();
        let services = ServiceContext::new(
            self.pool.clone(),
            provider,
            PricingRates::default(),
            ScanLimits::default(),
        );
        create_app(Arc::new(services), stripe.map(Arc::new), Arc::new(Settings::default()))
    }

    pub async fn user(&self, role: UserRole, customer_id: Option<&str>) -> anyhow::Result<UserProfile> {
        let id = Uuid::new_v4();
        let user = self
            .services
            .user_repo
            .create(CreateUserRequest {
                email: format!("{}@example.com", id.simple()),
                full_name: format!("{} user", role.as_str()),
                role,
                stripe_customer_id: customer_id.map(str::to_string),
            })
            .await?;
        Ok(user)
    }

    /// The 90 minute in-person visit 32 miles out, priced for a non-member.
    pub async fn appointment(&self, requester: &UserProfile, specialist: &UserProfile) -> anyhow::Result<Appointment> {
        let appointment = self
            .services
            .appointment_repo
            .create(CreateAppointmentRequest {
                requester_id: requester.id,
                provider_id: specialist.id,
                scheduled_at: Utc::now() + Duration::days(2),
                duration_minutes: 90,
                location_type: LocationType::InPerson,
                base_price_cents: 14000,
                travel_fee_cents: 1200,
                travel_distance_miles: 32.0,
            })
            .await?;
        Ok(appointment)
    }

    pub async fn plan(&self, plan_type: &str, hourly_cents: i64, included_minutes: i64) -> anyhow::Result<MembershipPlan> {
        let plan = self
            .services
            .membership_repo
            .create_plan(MembershipPlan {
                id: Uuid::new_v4(),
                plan_type: plan_type.to_string(),
                name: plan_type.to_uppercase(),
                monthly_price_cents: 4900,
                member_hourly_rate_cents: hourly_cents,
                included_visit_minutes: included_minutes,
                included_minutes_remote_only: true,
                max_covered_people: 1,
                is_active: true,
            })
            .await?;
        Ok(plan)
    }
}
