use serde::{Deserialize, Serialize};

use super::PricingRates;

/// Both sides of a trip beyond the free-mile allowance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TravelFee {
    pub client_fee_cents: i64,
    pub specialist_reimbursement_cents: i64,
}

impl TravelFee {
    pub fn for_distance(distance_miles: f64, rates: &PricingRates) -> Self {
        Self {
            client_fee_cents: calculate_travel_fee(distance_miles, rates),
            specialist_reimbursement_cents: calculate_specialist_reimbursement(distance_miles, rates),
        }
    }

    pub fn margin_cents(&self) -> i64 {
        self.client_fee_cents - self.specialist_reimbursement_cents
    }
}

fn extra_miles(distance_miles: f64, rates: &PricingRates) -> f64 {
    if !distance_miles.is_finite() || distance_miles <= rates.included_travel_miles {
        return 0.0;
    }
    distance_miles - rates.included_travel_miles
}

/// Fee billed to the client for miles past the included allowance.
pub fn calculate_travel_fee(distance_miles: f64, rates: &PricingRates) -> i64 {
    (extra_miles(distance_miles, rates) * rates.client_mileage_rate_cents as f64).round() as i64
}

/// Reimbursement paid to the specialist for the same extra miles.
pub fn calculate_specialist_reimbursement(distance_miles: f64, rates: &PricingRates) -> i64 {
    (extra_miles(distance_miles, rates) * rates.specialist_mileage_rate_cents as f64).round() as i64
}
