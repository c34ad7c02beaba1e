//! Data types that are persisted by, or passed into, the storage backends.
//!
//! Monetary values are always [`Amount`]s. Fingerprints are stored as their canonical 6-decimal strings, and are
//! only ever compared in that form.
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use dgp_common::{Amount, AmountError};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

pub use crate::order_state::OrderStatusType;

/// Separator between individual unit payloads in a delivery message.
pub const PAYLOAD_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------     ProductKey       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct ProductKey {
    pub category: String,
    pub variant: String,
}

impl ProductKey {
    pub fn new<C: Into<String>, V: Into<String>>(category: C, variant: V) -> Self {
        Self { category: category.into(), variant: variant.into() }
    }
}

impl Display for ProductKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.variant)
    }
}

impl FromStr for ProductKey {
    type Err = ConversionError;

    /// Parses `category/variant`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((c, v)) if !c.trim().is_empty() && !v.trim().is_empty() => Ok(Self::new(c.trim(), v.trim())),
            _ => Err(ConversionError(format!("'{s}' is not a product key. Use category/variant"))),
        }
    }
}

//--------------------------------------       Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Product {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub key: ProductKey,
    pub name: String,
    pub unit_price: Amount,
    /// Advisory count of available units, as of the last refresh from the inventory.
    pub cached_stock: i64,
    pub stock_refreshed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    #[serde(flatten)]
    pub key: ProductKey,
    pub name: String,
    pub unit_price: Amount,
}

impl NewProduct {
    pub fn new<S: Into<String>>(key: ProductKey, name: S, unit_price: Amount) -> Self {
        Self { key, name: name.into(), unit_price }
    }
}

//--------------------------------------      OrderCode       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderCode(String);

impl OrderCode {
    pub fn new<S: Into<String>>(code: S) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OrderCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------      BuyerInfo       ---------------------------------------------------------
/// The conversation session of the buyer. Messages for the buyer are addressed to `session_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BuyerInfo {
    pub session_id: String,
    pub display_name: String,
}

impl BuyerInfo {
    pub fn new<S: Into<String>, N: Into<String>>(session_id: S, display_name: N) -> Self {
        Self { session_id: session_id.into(), display_name: display_name.into() }
    }
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub order_code: OrderCode,
    #[sqlx(flatten)]
    pub product: ProductKey,
    pub product_name: String,
    pub quantity: i64,
    /// The unit price at the time the order was created
    pub unit_price: Amount,
    pub total_price: Amount,
    #[sqlx(flatten)]
    pub buyer: BuyerInfo,
    pub status: OrderStatusType,
    pub confirmation_ref: Option<String>,
    pub fingerprint: Option<Fingerprint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_code: OrderCode,
    pub product: ProductKey,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Amount,
    pub total_price: Amount,
    pub buyer: BuyerInfo,
}

//--------------------------------------      OrderUpdate     ---------------------------------------------------------
/// Optional field changes that accompany a status transition. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub confirmation_ref: Option<String>,
    pub fingerprint: Option<Fingerprint>,
}

impl OrderUpdate {
    pub fn with_confirmation_ref<S: Into<String>>(mut self, reference: S) -> Self {
        self.confirmation_ref = Some(reference.into());
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }
}

//--------------------------------------     Fingerprint      ---------------------------------------------------------
/// The exact amount a buyer has been asked to pay, in its canonical form (e.g. `2.000047`).
///
/// A fingerprint can only be built from an [`Amount`] (or parsed into one first), so two fingerprints for the same
/// value are always byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn amount(&self) -> Result<Amount, AmountError> {
        self.0.parse()
    }
}

impl From<Amount> for Fingerprint {
    fn from(amount: Amount) -> Self {
        Self(amount.to_canonical_string())
    }
}

impl FromStr for Fingerprint {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Amount>().map(Self::from)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Amount::deserialize(deserializer).map(Self::from)
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------  ExpectationStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum ExpectationStatus {
    /// Waiting for a matching sighting. Only pending fingerprints are live.
    Pending,
    Completed,
    Cancelled,
    ManualInterventionRequired,
}

impl Display for ExpectationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Completed => write!(f, "Completed"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::ManualInterventionRequired => write!(f, "ManualInterventionRequired"),
        }
    }
}

impl FromStr for ExpectationStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            "ManualInterventionRequired" => Ok(Self::ManualInterventionRequired),
            s => Err(ConversionError(format!("Invalid expectation status: {s}"))),
        }
    }
}

//--------------------------------------  PendingExpectation  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PendingExpectation {
    pub order_code: OrderCode,
    pub session_id: String,
    pub base_amount: Amount,
    pub fingerprint: Fingerprint,
    /// Short code quoted to the buyer alongside the amount.
    pub reference_code: String,
    /// True when every offset was taken and the bare base amount was issued instead.
    pub degraded: bool,
    pub status: ExpectationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPendingExpectation {
    pub order_code: OrderCode,
    pub session_id: String,
    pub base_amount: Amount,
    pub reference_code: String,
}

//--------------------------------------    SightingStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum SightingStatus {
    Unmatched,
    Matched,
}

impl Display for SightingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unmatched => write!(f, "Unmatched"),
            Self::Matched => write!(f, "Matched"),
        }
    }
}

impl FromStr for SightingStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unmatched" => Ok(Self::Unmatched),
            "Matched" => Ok(Self::Matched),
            s => Err(ConversionError(format!("Invalid sighting status: {s}"))),
        }
    }
}

//--------------------------------------   ReceivedSighting   ---------------------------------------------------------
/// An operator-asserted observation that a payment of exactly `fingerprint` arrived. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ReceivedSighting {
    pub fingerprint: Fingerprint,
    pub observed_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
    pub status: SightingStatus,
    pub matched_order: Option<OrderCode>,
}

#[derive(Debug, Clone)]
pub struct NewSighting {
    pub fingerprint: Fingerprint,
    pub observed_at: DateTime<Utc>,
}

impl NewSighting {
    pub fn new(amount: Amount, observed_at: DateTime<Utc>) -> Self {
        Self { fingerprint: Fingerprint::from(amount), observed_at }
    }
}

//--------------------------------------    ConsumerRecord    ---------------------------------------------------------
/// Buyer metadata attached to inventory units when they are consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRecord {
    pub order_code: OrderCode,
    pub buyer: BuyerInfo,
}

impl From<&Order> for ConsumerRecord {
    fn from(order: &Order) -> Self {
        Self { order_code: order.order_code.clone(), buyer: order.buyer.clone() }
    }
}

//--------------------------------------   DeliveryPayload    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPayload {
    pub items: Vec<String>,
}

impl DeliveryPayload {
    pub fn new(items: Vec<String>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Display for DeliveryPayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.items.join(PAYLOAD_SEPARATOR))
    }
}
