pub mod cooldowns;
pub mod verified_users;

pub use cooldowns::CooldownTracker;
pub use verified_users::{JsonVerificationStore, VerifiedUsers};
