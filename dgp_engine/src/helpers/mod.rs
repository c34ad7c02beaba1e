mod codes;
mod fingerprint;
mod retry;

pub use codes::{generate_order_code, generate_reference_code, ORDER_CODE_LENGTH};
pub use fingerprint::{allocate_fingerprint, Allocation, MAX_OFFSET_MICROS};
pub use retry::{with_retry, RetryError};
