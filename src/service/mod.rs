pub mod charge_discovery;
pub mod membership_sync;
pub mod payment_reconciliation;
pub mod pricing_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::auth::AuthService;
use crate::payments::PaymentProvider;
use crate::pricing::PricingRates;
use membership_sync::MembershipSyncService;
use payment_reconciliation::PaymentReconciliationService;
use pricing_service::PricingService;

pub use membership_sync::SyncOutcome;
pub use payment_reconciliation::{ReconcileOutcome, ScanLimits};

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub appointment_repo: Arc<dyn AppointmentRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub membership_repo: Arc<dyn MembershipRepository>,
    pub auth_service: Arc<AuthService>,
    pub payment_service: Arc<PaymentReconciliationService>,
    pub membership_service: Arc<MembershipSyncService>,
    pub pricing_service: Arc<PricingService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        provider: Arc<dyn PaymentProvider>,
        rates: PricingRates,
        limits: ScanLimits,
    ) -> Self {
        let user_repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let appointment_repo: Arc<dyn AppointmentRepository> =
            Arc::new(SqliteAppointmentRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> = Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let membership_repo: Arc<dyn MembershipRepository> =
            Arc::new(SqliteMembershipRepository::new(db_pool.clone()));

        let auth_service = Arc::new(AuthService::new(db_pool.clone()));

        let payment_service = Arc::new(PaymentReconciliationService::new(
            appointment_repo.clone(),
            payment_repo.clone(),
            user_repo.clone(),
            provider.clone(),
            rates.clone(),
            limits,
        ));
        let membership_service = Arc::new(MembershipSyncService::new(
            membership_repo.clone(),
            user_repo.clone(),
            provider,
        ));
        let pricing_service = Arc::new(PricingService::new(membership_repo.clone(), rates));

        Self {
            user_repo,
            appointment_repo,
            payment_repo,
            membership_repo,
            auth_service,
            payment_service,
            membership_service,
            pricing_service,
            db_pool,
        }
    }
}
