mod amount;

pub mod helpers;
pub mod op;
mod secret;

pub use amount::{Amount, AmountError, FRACTION_DIGITS, MICROS_PER_CENT, MICROS_PER_UNIT};
pub use secret::Secret;
