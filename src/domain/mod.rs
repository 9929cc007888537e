pub mod appointment;
pub mod payment;
pub mod membership;
pub mod user;

pub use appointment::*;
pub use payment::*;
pub use membership::*;
pub use user::*;
