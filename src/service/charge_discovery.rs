//! Finding the processor charge that paid for an appointment.
//!
//! The processor cannot be queried by metadata, so lookups go from the
//! cheapest, most precise source to a bounded scan of recent charges. The
//! first lookup that finds a match wins.

use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    payments::{PaymentProvider, ProviderCharge},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeLookup {
    /// The charge id the client got back from the processor.
    Hint(String),
    /// Recent charges of the requester's processor customer.
    Customer { customer_id: String, limit: u64 },
    /// Recent charges across the whole account.
    Recent { limit: u64 },
}

impl ChargeLookup {
    /// Lookups in the order they should be tried. Sources that are not
    /// available for this request are left out.
    pub fn plan(
        hint: Option<&str>,
        customer_id: Option<&str>,
        customer_limit: u64,
        recent_limit: u64,
    ) -> Vec<ChargeLookup> {
        let mut lookups = Vec::with_capacity(3);
        if let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) {
            lookups.push(ChargeLookup::Hint(hint.to_string()));
        }
        if let Some(customer_id) = customer_id.filter(|c| !c.is_empty()) {
            lookups.push(ChargeLookup::Customer {
                customer_id: customer_id.to_string(),
                limit: customer_limit,
            });
        }
        lookups.push(ChargeLookup::Recent { limit: recent_limit });
        lookups
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChargeLookup::Hint(_) => "charge_hint",
            ChargeLookup::Customer { .. } => "customer_charges",
            ChargeLookup::Recent { .. } => "recent_charges",
        }
    }

    pub async fn find(
        &self,
        provider: &dyn PaymentProvider,
        appointment_id: Uuid,
    ) -> Result<Option<ProviderCharge>> {
        match self {
            ChargeLookup::Hint(charge_id) => {
                let charge = provider.retrieve_charge(charge_id).await?;
                Ok(Some(charge).filter(|c| c.settles(appointment_id)))
            }
            ChargeLookup::Customer { customer_id, limit } => {
                let charges = provider.list_charges(Some(customer_id), *limit).await?;
                Ok(charges.into_iter().find(|c| c.settles(appointment_id)))
            }
            ChargeLookup::Recent { limit } => {
                let charges = provider.list_charges(None, *limit).await?;
                Ok(charges.into_iter().find(|c| c.settles(appointment_id)))
            }
        }
    }
}

/// Runs `lookups` in order and returns the first match.
///
/// A failing lookup is logged and skipped. The call only fails when every
/// lookup failed; finding nothing is `Ok(None)`.
pub async fn discover_charge(
    provider: &dyn PaymentProvider,
    appointment_id: Uuid,
    lookups: &[ChargeLookup],
) -> Result<Option<ProviderCharge>> {
    let mut failures = Vec::new();

    for lookup in lookups {
        match lookup.find(provider, appointment_id).await {
            Ok(Some(charge)) => {
                tracing::debug!(
                    appointment_id = %appointment_id,
                    charge_id = %charge.id,
                    lookup = lookup.name(),
                    "Matched charge"
                );
                return Ok(Some(charge));
            }
            Ok(None) => {
                tracing::debug!(appointment_id = %appointment_id, lookup = lookup.name(), "No matching charge");
            }
            Err(e) => {
                tracing::warn!(
                    appointment_id = %appointment_id,
                    lookup = lookup.name(),
                    "Charge lookup failed: {}",
                    e
                );
                failures.push(format!("{}: {}", lookup.name(), e));
            }
        }
    }

    if !lookups.is_empty() && failures.len() == lookups.len() {
        return Err(AppError::External(format!(
            "All charge lookups failed ({})",
            failures.join("; ")
        )));
    }

    Ok(None)
}
