pub mod memberships;
pub mod payments;
pub mod pricing;
pub mod root;
pub mod webhooks;
