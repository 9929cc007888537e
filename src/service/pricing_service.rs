use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::LocationType,
    error::{AppError, Result},
    pricing::{calculate_price, PriceBreakdown, PricingRates, TravelFee},
    repository::MembershipRepository,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuoteRequest {
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: i64,
    pub location_type: LocationType,
    pub membership_plan_id: Option<Uuid>,
    #[validate(range(min = 0.0))]
    pub travel_distance_miles: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    #[serde(flatten)]
    pub price: PriceBreakdown,
    pub specialist_reimbursement_cents: i64,
    pub plan_name: Option<String>,
}

pub struct PricingService {
    memberships: Arc<dyn MembershipRepository>,
    rates: PricingRates,
}

impl PricingService {
    pub fn new(memberships: Arc<dyn MembershipRepository>, rates: PricingRates) -> Self {
        Self { memberships, rates }
    }

    pub fn rates(&self) -> &PricingRates {
        &self.rates
    }

    pub async fn quote(&self, request: &QuoteRequest) -> Result<Quote> {
        request
            .validate()
            .map_err(|e| AppError::BadRequest(format!("Invalid quote request: {}", e)))?;

        let plan = match request.membership_plan_id {
            Some(plan_id) => Some(
                self.memberships
                    .find_plan(plan_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Membership plan not found".to_string()))?,
            ),
            None => None,
        };
        let plan = plan.filter(|p| p.is_active);

        let travel =
            TravelFee::for_distance(request.travel_distance_miles.unwrap_or(0.0), &self.rates);

        let price = calculate_price(
            request.duration_minutes,
            request.location_type,
            plan.as_ref(),
            travel.client_fee_cents,
            &self.rates,
        );

        Ok(Quote {
            price,
            specialist_reimbursement_cents: travel.specialist_reimbursement_cents,
            plan_name: plan.map(|p| p.name),
        })
    }
}
