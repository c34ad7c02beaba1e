use rand::Rng;

use crate::db_types::OrderCode;

pub const ORDER_CODE_LENGTH: usize = 8;
const REFERENCE_CODE_LENGTH: usize = 6;

const ORDER_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
// No 0/O or 1/I, since buyers read these back to us.
const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn random_string<R: Rng + ?Sized>(alphabet: &[u8], len: usize, rng: &mut R) -> String {
    (0..len).map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char).collect()
}

/// A fresh 8-character upper-case alphanumeric order code. Uniqueness is enforced by the order store.
pub fn generate_order_code<R: Rng + ?Sized>(rng: &mut R) -> OrderCode {
    OrderCode::from(random_string(ORDER_CODE_ALPHABET, ORDER_CODE_LENGTH, rng))
}

/// A short human-readable reference quoted with the payment instructions, e.g. `RF-7KQ2MX`.
pub fn generate_reference_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("RF-{}", random_string(REFERENCE_ALPHABET, REFERENCE_CODE_LENGTH, rng))
}
