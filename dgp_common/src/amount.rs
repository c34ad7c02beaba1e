use std::{
    fmt,
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
    str::FromStr,
};

use serde::{de, de::Visitor, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// The number of fractional digits in the canonical string form of an [`Amount`].
pub const FRACTION_DIGITS: usize = 6;
pub const MICROS_PER_UNIT: i64 = 1_000_000;
pub const MICROS_PER_CENT: i64 = 10_000;

//--------------------------------------       Amount        ---------------------------------------------------------
/// A decimal currency amount, held as a whole number of millionths of a unit.
///
/// Amounts are never represented as floating point numbers. Two amounts are equal iff their canonical strings
/// ([`Amount::to_canonical_string`]) are byte-identical, which is what makes them usable as exact-match ledger keys.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[sqlx(transparent)]
pub struct Amount(i64);

op!(binary Amount, Add, add);
op!(binary Amount, Sub, sub);
op!(inplace Amount, AddAssign, add_assign);
op!(inplace Amount, SubAssign, sub_assign);
op!(unary Amount, Neg, neg);

impl Mul<i64> for Amount {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("An empty string is not an amount")]
    Empty,
    #[error("'{0}' is not a decimal amount")]
    Invalid(String),
    #[error("'{0}' has more than {FRACTION_DIGITS} fractional digits")]
    TooPrecise(String),
    #[error("'{0}' is too large to represent")]
    Overflow(String),
}

impl From<i64> for Amount {
    fn from(micros: i64) -> Self {
        Self(micros)
    }
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(cents * MICROS_PER_CENT)
    }

    pub fn from_units(units: i64) -> Self {
        Self(units * MICROS_PER_UNIT)
    }

    pub fn micros(&self) -> i64 {
        self.0
    }

    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Rounds to the nearest cent, with halves rounded away from zero.
    pub fn round_to_cents(self) -> Self {
        let rem = self.0 % MICROS_PER_CENT;
        let base = self.0 - rem;
        if rem.abs() * 2 >= MICROS_PER_CENT {
            Self(base + rem.signum() * MICROS_PER_CENT)
        } else {
            Self(base)
        }
    }

    pub fn is_cent_aligned(&self) -> bool {
        self.0 % MICROS_PER_CENT == 0
    }

    /// The portion of the amount below one cent, in millionths. Always in `0..MICROS_PER_CENT`.
    pub fn sub_cent_micros(&self) -> i64 {
        self.0.rem_euclid(MICROS_PER_CENT)
    }

    /// The fixed-width representation used for storage and comparison, e.g. `2.000047`.
    pub fn to_canonical_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let unit = MICROS_PER_UNIT.unsigned_abs();
        format!("{sign}{}.{:0width$}", abs / unit, abs % unit, width = FRACTION_DIGITS)
    }

    /// Two-decimal representation for display to humans, e.g. `6.00`. Sub-cent digits are rounded.
    pub fn to_cents_string(&self) -> String {
        let canonical = self.round_to_cents().to_canonical_string();
        canonical[..canonical.len() - (FRACTION_DIGITS - 2)].to_string()
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(AmountError::Invalid(s.to_string()));
        }
        // Zeroes past the last significant digit carry no precision, so "2.0000470" is "2.000047".
        let frac = frac.trim_end_matches('0');
        if frac.len() > FRACTION_DIGITS {
            return Err(AmountError::TooPrecise(s.to_string()));
        }
        let whole = if whole.is_empty() {
            0
        } else {
            whole.parse::<i64>().map_err(|_| AmountError::Overflow(s.to_string()))?
        };
        let frac = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<width$}", width = FRACTION_DIGITS)
                .parse::<i64>()
                .map_err(|_| AmountError::Invalid(s.to_string()))?
        };
        let micros = whole
            .checked_mul(MICROS_PER_UNIT)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(|| AmountError::Overflow(s.to_string()))?;
        Ok(Self(if negative { -micros } else { micros }))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal string with at most 6 fractional digits, or a whole number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        v.checked_mul(MICROS_PER_UNIT).map(Amount).ok_or_else(|| E::custom(AmountError::Overflow(v.to_string())))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        let v = i64::try_from(v).map_err(|_| E::custom(AmountError::Overflow(v.to_string())))?;
        self.visit_i64(v)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn canonical_strings_are_fixed_width() {
        assert_eq!(Amount::from_micros(2_000_047).to_canonical_string(), "2.000047");
        assert_eq!(Amount::from_cents(250).to_canonical_string(), "2.500000");
        assert_eq!(Amount::ZERO.to_canonical_string(), "0.000000");
        assert_eq!(Amount::from_micros(-500_000).to_canonical_string(), "-0.500000");
        assert_eq!(Amount::from_units(12).to_string(), "12.000000");
    }

    #[test]
    fn parsing() {
        assert_eq!("2.000047".parse::<Amount>().unwrap(), Amount::from_micros(2_000_047));
        assert_eq!("2.0000471".parse::<Amount>(), Err(AmountError::TooPrecise("2.0000471".into())));
        assert_eq!(" 2 ".parse::<Amount>().unwrap(), Amount::from_units(2));
        assert_eq!("2.".parse::<Amount>().unwrap(), Amount::from_units(2));
        assert_eq!(".25".parse::<Amount>().unwrap(), Amount::from_cents(25));
        assert_eq!("-1.5".parse::<Amount>().unwrap(), Amount::from_micros(-1_500_000));
        assert_eq!("".parse::<Amount>(), Err(AmountError::Empty));
        assert!(matches!(".".parse::<Amount>(), Err(AmountError::Invalid(_))));
        assert!(matches!("1.2.3".parse::<Amount>(), Err(AmountError::Invalid(_))));
        assert!(matches!("$5".parse::<Amount>(), Err(AmountError::Invalid(_))));
        assert!(matches!("1e3".parse::<Amount>(), Err(AmountError::Invalid(_))));
        assert!(matches!("99999999999999999999".parse::<Amount>(), Err(AmountError::Overflow(_))));
    }

    #[test]
    fn trailing_zeroes_do_not_change_identity() {
        let a = "2.5".parse::<Amount>().unwrap();
        let b = "2.500000".parse::<Amount>().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_canonical_string(), b.to_canonical_string());
        let padded = "2.000047000".parse::<Amount>().unwrap();
        assert_eq!(padded, Amount::from_micros(2_000_047));
        assert_eq!("2.0000470".parse::<Amount>().unwrap(), padded);
        assert_eq!("6.0000000000".parse::<Amount>().unwrap(), Amount::from_units(6));
        assert_eq!("0.10".parse::<Amount>().unwrap(), Amount::from_cents(10));
        assert!(matches!("2.0000471000".parse::<Amount>(), Err(AmountError::TooPrecise(_))));
    }

    #[test]
    fn rounding_to_cents() {
        assert_eq!(Amount::from_micros(2_004_999).round_to_cents(), Amount::from_cents(200));
        assert_eq!(Amount::from_micros(2_005_000).round_to_cents(), Amount::from_cents(201));
        assert_eq!(Amount::from_micros(-2_005_000).round_to_cents(), Amount::from_cents(-201));
        assert_eq!(Amount::from_micros(2_000_047).sub_cent_micros(), 47);
        assert!(Amount::from_cents(199).is_cent_aligned());
        assert!(!Amount::from_micros(1_990_001).is_cent_aligned());
        assert_eq!(Amount::from_micros(5_996_000).to_cents_string(), "6.00");
    }

    #[test]
    fn arithmetic() {
        let mut total = Amount::from_cents(200) * 3;
        assert_eq!(total, Amount::from_units(6));
        total -= Amount::from_cents(50);
        assert_eq!(total.to_string(), "5.500000");
        let sum: Amount = vec![Amount::from_cents(1), Amount::from_cents(2)].into_iter().sum();
        assert_eq!(sum, Amount::from_cents(3));
        assert_eq!(Amount::from_units(i64::MAX / 1_000_000).checked_mul(10), None);
    }

    #[test]
    fn serde_uses_canonical_strings() {
        let json = serde_json::to_string(&Amount::from_micros(2_000_047)).unwrap();
        assert_eq!(json, "\"2.000047\"");
        let back: Amount = serde_json::from_str("\"2.000047\"").unwrap();
        assert_eq!(back, Amount::from_micros(2_000_047));
        let whole: Amount = serde_json::from_str("3").unwrap();
        assert_eq!(whole, Amount::from_units(3));
        assert!(serde_json::from_str::<Amount>("\"2.0000471\"").is_err());
    }
}
