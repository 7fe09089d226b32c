pub mod general;

pub use general::{help, ping};
