//! Visit pricing.
//!
//! Everything here is pure: rates come in through [`PricingRates`], amounts
//! are integer cents, and rounding is half-up to the cent.

pub mod travel;

use serde::{Deserialize, Serialize};

use crate::domain::{LocationType, MembershipPlan};

pub use travel::{calculate_specialist_reimbursement, calculate_travel_fee, TravelFee};

/// Rates used by the pricing and payout calculations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PricingRates {
    pub first_hour_cents: i64,
    pub half_hour_block_cents: i64,
    pub tax_rate_bps: i64,
    pub included_travel_miles: f64,
    pub client_mileage_rate_cents: i64,
    pub specialist_mileage_rate_cents: i64,
    pub specialist_hourly_rate_cents: i64,
}

impl Default for PricingRates {
    fn default() -> Self {
        Self {
            first_hour_cents: 9500,
            half_hour_block_cents: 4500,
            tax_rate_bps: 700,
            included_travel_miles: 20.0,
            client_mileage_rate_cents: 100,
            specialist_mileage_rate_cents: 70,
            specialist_hourly_rate_cents: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub service_price_cents: i64,
    pub membership_discount_cents: i64,
    pub free_minutes_applied: i64,
    pub travel_fee_cents: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// Non-member price: the first hour at a flat rate, then 30-minute blocks
/// rounded up.
pub fn standard_price(duration_minutes: i64, rates: &PricingRates) -> i64 {
    if duration_minutes <= 0 {
        return 0;
    }
    if duration_minutes <= 60 {
        return rates.first_hour_cents;
    }

    let extra_minutes = duration_minutes - 60;
    let blocks = (extra_minutes + 29) / 30;
    rates.first_hour_cents + blocks * rates.half_hour_block_cents
}

/// Minutes of the visit covered by the plan at no charge.
pub fn included_minutes(plan: Option<&MembershipPlan>, location_type: LocationType) -> i64 {
    match plan {
        Some(plan) if plan.included_minutes_remote_only && location_type == LocationType::InPerson => 0,
        Some(plan) => plan.included_visit_minutes.max(0),
        None => 0,
    }
}

pub fn calculate_price(
    duration_minutes: i64,
    location_type: LocationType,
    plan: Option<&MembershipPlan>,
    travel_fee_cents: i64,
    rates: &PricingRates,
) -> PriceBreakdown {
    // Plans with an unknown type price like no plan at all.
    let plan = plan.filter(|p| p.tier().is_some());
    let duration = duration_minutes.max(0);
    let standard = standard_price(duration, rates);

    let free_minutes_applied = duration.min(included_minutes(plan, location_type));
    let billable_minutes = (duration - free_minutes_applied).max(0);

    let (service_price_cents, membership_discount_cents) = match plan {
        Some(plan) => {
            let member_price = prorate(billable_minutes, plan.member_hourly_rate_cents);
            (member_price, (standard - member_price).max(0))
        }
        None => (standard, 0),
    };

    let subtotal_cents = service_price_cents + travel_fee_cents.max(0);
    let tax_cents = apply_basis_points(subtotal_cents, rates.tax_rate_bps);

    PriceBreakdown {
        service_price_cents,
        membership_discount_cents,
        free_minutes_applied,
        travel_fee_cents: travel_fee_cents.max(0),
        subtotal_cents,
        tax_cents,
        total_cents: (subtotal_cents + tax_cents).max(0),
    }
}

/// `minutes / 60 × hourly_rate`, rounded half-up.
pub fn prorate(minutes: i64, hourly_rate_cents: i64) -> i64 {
    round_div(minutes as i128 * hourly_rate_cents as i128, 60)
}

pub fn apply_basis_points(amount_cents: i64, bps: i64) -> i64 {
    round_div(amount_cents as i128 * bps as i128, 10_000)
}

fn round_div(numerator: i128, denominator: i128) -> i64 {
    let half = denominator / 2;
    let rounded = if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        -((-numerator + half) / denominator)
    };
    rounded as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn plan(included: i64, remote_only: bool, hourly: i64) -> MembershipPlan {
        MembershipPlan {
            id: Uuid::new_v4(),
            plan_type: "basic".to_string(),
            name: "Basic".to_string(),
            monthly_price_cents: 2900,
            member_hourly_rate_cents: hourly,
            included_visit_minutes: included,
            included_minutes_remote_only: remote_only,
            max_covered_people: 1,
            is_active: true,
        }
    }

    #[test]
    fn test_standard_price_blocks() {
        let rates = PricingRates::default();
        assert_eq!(standard_price(0, &rates), 0);
        assert_eq!(standard_price(-15, &rates), 0);
        assert_eq!(standard_price(1, &rates), 9500);
        assert_eq!(standard_price(60, &rates), 9500);
        assert_eq!(standard_price(61, &rates), 14000);
        assert_eq!(standard_price(90, &rates), 14000);
        assert_eq!(standard_price(91, &rates), 18500);
        assert_eq!(standard_price(120, &rates), 18500);
    }

    #[test]
    fn test_standard_price_is_non_decreasing() {
        let rates = PricingRates::default();
        let mut previous = 0;
        for minutes in 0..=600 {
            let price = standard_price(minutes, &rates);
            assert!(price >= previous, "price dropped at {} minutes", minutes);
            previous = price;
        }
    }

    #[test]
    fn test_non_member_scenario() {
        let rates = PricingRates::default();
        let travel = calculate_travel_fee(32.0, &rates);
        let quote = calculate_price(90, LocationType::Remote, None, travel, &rates);

        assert_eq!(quote.service_price_cents, 14000);
        assert_eq!(quote.membership_discount_cents, 0);
        assert_eq!(quote.travel_fee_cents, 1200);
        assert_eq!(quote.subtotal_cents, 15200);
        assert_eq!(quote.tax_cents, 1064);
        assert_eq!(quote.total_cents, 16264);
    }

    #[test]
    fn test_member_scenario() {
        let rates = PricingRates::default();
        let plan = plan(30, true, 7500);
        let quote = calculate_price(90, LocationType::Remote, Some(&plan), 1200, &rates);

        assert_eq!(quote.free_minutes_applied, 30);
        assert_eq!(quote.service_price_cents, 7500);
        assert_eq!(quote.membership_discount_cents, 6500);
        assert_eq!(quote.subtotal_cents, 8700);
        assert_eq!(quote.tax_cents, 609);
        assert_eq!(quote.total_cents, 9309);
    }

    #[test]
    fn test_remote_only_minutes_skip_in_person_visits() {
        let rates = PricingRates::default();
        let plan = plan(30, true, 7500);
        let quote = calculate_price(90, LocationType::InPerson, Some(&plan), 0, &rates);

        assert_eq!(quote.free_minutes_applied, 0);
        assert_eq!(quote.service_price_cents, 11250);
        assert_eq!(quote.membership_discount_cents, 2750);
    }

    #[test]
    fn test_free_minutes_cover_whole_visit() {
        let rates = PricingRates::default();
        let plan = plan(60, false, 7500);
        for minutes in [1, 30, 45, 60] {
            let quote = calculate_price(minutes, LocationType::InPerson, Some(&plan), 0, &rates);
            assert_eq!(quote.service_price_cents, 0);
            assert_eq!(quote.membership_discount_cents, standard_price(minutes, &rates));
            assert_eq!(quote.total_cents, 0);
        }
    }

    #[test]
    fn test_unknown_plan_type_prices_as_non_member() {
        let rates = PricingRates::default();
        let mut unknown = plan(30, false, 7500);
        unknown.plan_type = "platinum".to_string();

        let quote = calculate_price(90, LocationType::Remote, Some(&unknown), 0, &rates);
        assert_eq!(quote.service_price_cents, 14000);
        assert_eq!(quote.free_minutes_applied, 0);
        assert_eq!(quote.membership_discount_cents, 0);
    }

    #[test]
    fn test_member_rate_above_standard_has_no_negative_discount() {
        let rates = PricingRates::default();
        let pricey = plan(0, false, 20000);
        let quote = calculate_price(60, LocationType::Remote, Some(&pricey), 0, &rates);
        assert_eq!(quote.service_price_cents, 20000);
        assert_eq!(quote.membership_discount_cents, 0);
    }

    #[test]
    fn test_rounding_helpers() {
        assert_eq!(prorate(45, 7500), 5625);
        assert_eq!(prorate(1, 7500), 125);
        assert_eq!(prorate(1, 100), 2);
        assert_eq!(apply_basis_points(15200, 700), 1064);
        assert_eq!(apply_basis_points(8700, 700), 609);
        assert_eq!(apply_basis_points(50, 700), 4);
    }
}
