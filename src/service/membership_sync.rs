use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::*,
    error::{AppError, Result},
    payments::{InvoicePaymentState, PaymentProvider, ProviderSubscription, SubscriptionState},
    repository::{Insert, MembershipRepository, Transition, UserRepository},
};

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Created(Membership),
    /// A pending membership moved to active.
    Activated(Membership),
    Unchanged(Membership),
}

impl SyncOutcome {
    pub fn membership(&self) -> &Membership {
        match self {
            SyncOutcome::Created(m) | SyncOutcome::Activated(m) | SyncOutcome::Unchanged(m) => m,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            SyncOutcome::Created(_) => "Membership created",
            SyncOutcome::Activated(_) => "Membership activated",
            SyncOutcome::Unchanged(_) => "Membership already up to date",
        }
    }
}

pub struct MembershipSyncService {
    memberships: Arc<dyn MembershipRepository>,
    users: Arc<dyn UserRepository>,
    provider: Arc<dyn PaymentProvider>,
}

impl MembershipSyncService {
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        users: Arc<dyn UserRepository>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            memberships,
            users,
            provider,
        }
    }

    /// Brings the local membership for a processor subscription in line
    /// with the subscription and its latest invoice.
    ///
    /// Repeated and concurrent calls converge on one row per subscription.
    pub async fn sync_membership(&self, subscription_id: &str, actor: &Actor) -> Result<SyncOutcome> {
        let subscription = self.provider.retrieve_subscription(subscription_id).await?;

        if !subscription.status.is_syncable() {
            return Err(AppError::SubscriptionNotReady(format!(
                "Subscription {} is {}",
                subscription.id,
                subscription.status.as_str()
            )));
        }

        let owner_id = subscription.owner_id().ok_or_else(|| {
            AppError::InvalidState(format!("Subscription {} has no user_id metadata", subscription.id))
        })?;
        let plan_id = subscription.plan_id().ok_or_else(|| {
            AppError::InvalidState(format!(
                "Subscription {} has no membership_plan_id metadata",
                subscription.id
            ))
        })?;

        if let Actor::User { id, .. } = actor {
            if *id != owner_id {
                return Err(AppError::Forbidden);
            }
        }

        let resolved = self.resolve_status(&subscription).await;

        if let Some(existing) = self
            .memberships
            .find_by_subscription_and_user(&subscription.id, owner_id)
            .await?
        {
            return self.apply_status(existing, resolved, &subscription).await;
        }

        if self.memberships.find_plan(plan_id).await?.is_none() {
            return Err(AppError::InvalidState(format!(
                "Subscription {} references unknown plan {}",
                subscription.id, plan_id
            )));
        }

        let new_membership = NewMembership {
            user_id: owner_id,
            plan_id,
            status: resolved,
            stripe_subscription_id: subscription.id.clone(),
            stripe_customer_id: subscription.customer_id.clone(),
            next_billing_date: subscription.current_period_end,
            covered_user_ids: vec![owner_id],
        };

        match self.memberships.create(new_membership).await? {
            Insert::Created(membership) => {
                // A pending membership must not displace an active one on the profile.
                let displaces_active = membership.status != MembershipStatus::Active
                    && self.memberships.find_active_by_user(owner_id).await?.is_some();
                if !displaces_active {
                    self.link_profile(owner_id, &membership).await?;
                }
                tracing::info!(
                    membership_id = %membership.id,
                    subscription_id = %subscription.id,
                    status = membership.status.as_str(),
                    "Membership created"
                );
                Ok(SyncOutcome::Created(membership))
            }
            Insert::AlreadyExists => self.recover_from_conflict(owner_id, resolved, &subscription).await,
        }
    }

    /// Local status for a syncable subscription.
    ///
    /// An incomplete subscription whose invoice cannot be checked counts as
    /// active: callers only sync after the client confirmed payment, so a
    /// missing answer is processor lag. Only an invoice that is known to be
    /// unpaid keeps the membership pending.
    pub async fn resolve_status(&self, subscription: &ProviderSubscription) -> MembershipStatus {
        match subscription.status {
            SubscriptionState::Active | SubscriptionState::Trialing | SubscriptionState::PastDue => {
                MembershipStatus::Active
            }
            SubscriptionState::Incomplete => {
                let invoice_id = match &subscription.latest_invoice_id {
                    Some(id) => id,
                    None => {
                        tracing::warn!(
                            subscription_id = %subscription.id,
                            "Incomplete subscription has no invoice; treating as active"
                        );
                        return MembershipStatus::Active;
                    }
                };

                match self.provider.retrieve_invoice(invoice_id).await {
                    Ok(invoice) => match invoice.payment_state() {
                        InvoicePaymentState::Paid | InvoicePaymentState::Unknown => MembershipStatus::Active,
                        InvoicePaymentState::Unpaid => MembershipStatus::Pending,
                    },
                    Err(e) => {
                        tracing::warn!(
                            subscription_id = %subscription.id,
                            invoice_id = %invoice_id,
                            "Could not check invoice, treating as active: {}",
                            e
                        );
                        MembershipStatus::Active
                    }
                }
            }
            _ => MembershipStatus::Pending,
        }
    }

    async fn apply_status(
        &self,
        existing: Membership,
        resolved: MembershipStatus,
        subscription: &ProviderSubscription,
    ) -> Result<SyncOutcome> {
        if existing.status == resolved {
            return Ok(SyncOutcome::Unchanged(existing));
        }

        if existing.status.is_terminal() {
            tracing::info!(
                membership_id = %existing.id,
                status = existing.status.as_str(),
                "Not reviving a closed membership"
            );
            return Ok(SyncOutcome::Unchanged(existing));
        }

        if !existing.status.can_transition_to(resolved) {
            return Ok(SyncOutcome::Unchanged(existing));
        }

        let transition = self
            .memberships
            .transition_status(existing.id, existing.status, resolved, subscription.current_period_end)
            .await?;

        if transition == Transition::Conflict {
            return Err(self.already_active(existing.user_id).await?);
        }

        let current = self
            .memberships
            .find_by_id(existing.id)
            .await?
            .ok_or_else(|| AppError::Database("Membership disappeared during sync".to_string()))?;

        if transition == Transition::Stale {
            return Ok(SyncOutcome::Unchanged(current));
        }

        self.link_profile(current.user_id, &current).await?;
        tracing::info!(
            membership_id = %current.id,
            from = existing.status.as_str(),
            to = current.status.as_str(),
            "Membership status updated"
        );
        Ok(SyncOutcome::Activated(current))
    }

    /// Another writer inserted first. Return its row, moved forward if
    /// this call saw a newer status.
    async fn recover_from_conflict(
        &self,
        owner_id: Uuid,
        resolved: MembershipStatus,
        subscription: &ProviderSubscription,
    ) -> Result<SyncOutcome> {
        tracing::debug!(subscription_id = %subscription.id, "Lost membership insert race");

        match self.memberships.find_by_subscription(&subscription.id).await? {
            Some(winner) if winner.user_id == owner_id => {
                self.apply_status(winner, resolved, subscription).await
            }
            Some(winner) => Err(AppError::InvalidState(format!(
                "Subscription {} is already linked to user {}",
                subscription.id, winner.user_id
            ))),
            None => Err(self.already_active(owner_id).await?),
        }
    }

    /// The user holds another active membership, so this one cannot become
    /// active too.
    async fn already_active(&self, user_id: Uuid) -> Result<AppError> {
        let active = self.memberships.find_active_by_user(user_id).await?;
        Ok(AppError::InvalidState(format!(
            "User {} already has active membership {}",
            user_id,
            active.map(|m| m.id.to_string()).unwrap_or_default()
        )))
    }

    async fn link_profile(&self, user_id: Uuid, membership: &Membership) -> Result<()> {
        self.users.set_membership(user_id, membership.id).await?;
        if let Some(customer_id) = &membership.stripe_customer_id {
            self.users.set_stripe_customer_if_missing(user_id, customer_id).await?;
        }
        Ok(())
    }
}
