//! Fingerprint amount allocation.
//!
//! A buyer is asked to pay their order total plus a random offset between 0.000001 and 0.000099. That sub-cent tail
//! is what lets a payment sighting be attributed to exactly one order, so no two live expectations may share it.
use std::collections::HashSet;

use dgp_common::Amount;
use log::*;
use rand::{seq::SliceRandom, Rng};

use crate::db_types::Fingerprint;

/// The largest offset added to a base price, in millionths.
pub const MAX_OFFSET_MICROS: i64 = 99;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub fingerprint: Fingerprint,
    /// Set when every offset was live and the bare base amount was returned.
    pub degraded: bool,
}

/// Picks a fingerprint for `base` that is not in `live`.
///
/// The base is rounded to whole cents first. Offsets are tried in random order, and the first free one wins. If all
/// of them are live, the rounded base itself is returned with `degraded` set. Such an allocation cannot be matched
/// automatically.
pub fn allocate_fingerprint<R: Rng + ?Sized>(base: Amount, live: &HashSet<Fingerprint>, rng: &mut R) -> Allocation {
    let base = base.round_to_cents();
    let mut offsets = (1..=MAX_OFFSET_MICROS).collect::<Vec<i64>>();
    offsets.shuffle(rng);
    match offsets.into_iter().map(|o| Fingerprint::from(base + Amount::from_micros(o))).find(|fp| !live.contains(fp)) {
        Some(fingerprint) => {
            trace!("🧮️ Allocated fingerprint {fingerprint} for base {base}");
            Allocation { fingerprint, degraded: false }
        },
        None => {
            warn!("🧮️ AllocationDegraded. All {MAX_OFFSET_MICROS} offsets for base {base} are live");
            Allocation { fingerprint: Fingerprint::from(base), degraded: true }
        },
    }
}
