pub mod provider;
pub mod stripe_client;
#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use provider::*;
pub use stripe_client::StripeClient;
#[cfg(any(test, feature = "test-utils"))]
pub use fake::{FakeOperation, FakeStripeGateway};
