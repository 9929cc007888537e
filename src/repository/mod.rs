use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod user_repository;
pub mod appointment_repository;
pub mod payment_repository;
pub mod membership_repository;

pub use user_repository::SqliteUserRepository;
pub use appointment_repository::SqliteAppointmentRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use membership_repository::SqliteMembershipRepository;

/// Result of an insert guarded by a unique constraint.
///
/// A concurrent writer that got there first is an expected outcome for
/// reconciliation, so it is reported as a value instead of an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Insert<T> {
    Created(T),
    AlreadyExists,
}

/// Result of a compare-and-swap status change that a unique constraint
/// can refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The stored status was no longer the expected one.
    Stale,
    /// The new status collides with another row, e.g. a second active
    /// membership for the same user.
    Conflict,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, request: CreateUserRequest) -> Result<UserProfile>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>>;
    async fn set_membership(&self, id: Uuid, membership_id: Uuid) -> Result<()>;
    /// Records the provider customer on the profile unless one is already set.
    async fn set_stripe_customer_if_missing(&self, id: Uuid, customer_id: &str) -> Result<()>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn create(&self, request: CreateAppointmentRequest) -> Result<Appointment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>>;
    /// Compare-and-swap status change. Returns false when the stored status
    /// was no longer `expected`, in which case nothing is written.
    async fn transition_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<bool>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Insert<Payment>>;
    async fn find_completed_by_appointment(&self, appointment_id: Uuid) -> Result<Option<Payment>>;
    async fn list_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn create_plan(&self, plan: MembershipPlan) -> Result<MembershipPlan>;
    async fn find_plan(&self, id: Uuid) -> Result<Option<MembershipPlan>>;
    async fn create(&self, membership: NewMembership) -> Result<Insert<Membership>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Membership>>;
    async fn find_by_subscription(&self, subscription_id: &str) -> Result<Option<Membership>>;
    async fn find_by_subscription_and_user(
        &self,
        subscription_id: &str,
        user_id: Uuid,
    ) -> Result<Option<Membership>>;
    async fn find_active_by_user(&self, user_id: Uuid) -> Result<Option<Membership>>;
    /// Compare-and-swap status change. Nothing is written unless the
    /// result is `Applied`.
    async fn transition_status(
        &self,
        id: Uuid,
        expected: MembershipStatus,
        next: MembershipStatus,
        next_billing_date: Option<DateTime<Utc>>,
    ) -> Result<Transition>;
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
