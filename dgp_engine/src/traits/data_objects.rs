use std::fmt::Display;

use dgp_common::Amount;
use serde::{Deserialize, Serialize};

use crate::db_types::{
    DeliveryPayload,
    Fingerprint,
    Order,
    OrderCode,
    PendingExpectation,
    ReceivedSighting,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertSightingResult {
    Inserted(ReceivedSighting),
    /// A sighting for this fingerprint already exists. The stored row is returned as-is.
    Duplicate(ReceivedSighting),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelPendingResult {
    Cancelled(PendingExpectation),
    /// The expectation had already left `Pending`.
    NotPending(PendingExpectation),
    NoExpectation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchClaim {
    /// The expectation is now `Completed` and the sighting `Matched`.
    Claimed { expectation: PendingExpectation, sighting: ReceivedSighting },
    /// No payment with this fingerprint has been sighted.
    NoSighting,
    /// The sighting exists, but no pending order carries its fingerprint. The sighting stays `Unmatched`.
    NoPendingOrder,
    AlreadyMatched { order_code: Option<OrderCode> },
    /// More than one pending order, or a degraded one, carries the fingerprint. Nothing is matched.
    Ambiguous { candidates: Vec<OrderCode> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveResult {
    Consumed(Vec<String>),
    InsufficientStock { available: i64 },
}

//--------------------------------------  ManualReviewReason  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManualReviewReason {
    /// Every fingerprint offset was live, so the order was issued its bare base amount.
    AllocationDegraded,
    /// A sighting could not be attributed to exactly one order.
    AmbiguousFingerprint,
    /// The order was paid for, but the inventory did not hold enough units.
    InsufficientStock,
    /// The order was paid for, but the inventory could not be reached.
    InventoryUnavailable,
    /// Units were consumed, but the buyer could not be sent them.
    DeliveryFailed,
    /// The payment was matched, but the order's ledger records could not be brought up to date.
    SettlementFailed,
}

impl Display for ManualReviewReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllocationDegraded => write!(f, "AllocationDegraded"),
            Self::AmbiguousFingerprint => write!(f, "AmbiguousFingerprint"),
            Self::InsufficientStock => write!(f, "InsufficientStock"),
            Self::InventoryUnavailable => write!(f, "InventoryUnavailable"),
            Self::DeliveryFailed => write!(f, "DeliveryFailed"),
            Self::SettlementFailed => write!(f, "SettlementFailed"),
        }
    }
}

//--------------------------------------    OperatorAlert     ---------------------------------------------------------
/// Everything an operator needs to resolve a case by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorAlert {
    pub reason: ManualReviewReason,
    pub order_code: Option<OrderCode>,
    pub session_id: Option<String>,
    pub buyer_name: Option<String>,
    pub amount: Option<Amount>,
    pub fingerprint: Option<Fingerprint>,
    pub details: String,
    /// Units that were consumed but could not be delivered.
    pub payload: Option<DeliveryPayload>,
}

impl OperatorAlert {
    pub fn new<S: Into<String>>(reason: ManualReviewReason, details: S) -> Self {
        Self {
            reason,
            order_code: None,
            session_id: None,
            buyer_name: None,
            amount: None,
            fingerprint: None,
            details: details.into(),
            payload: None,
        }
    }

    /// Fills in the order, buyer and amount context from the order.
    pub fn for_order<S: Into<String>>(reason: ManualReviewReason, order: &Order, details: S) -> Self {
        Self {
            order_code: Some(order.order_code.clone()),
            session_id: Some(order.buyer.session_id.clone()),
            buyer_name: Some(order.buyer.display_name.clone()),
            amount: Some(order.total_price),
            fingerprint: order.fingerprint.clone(),
            ..Self::new(reason, details)
        }
    }

    /// The context available from a pending expectation alone, for when the order itself cannot be read.
    pub fn for_expectation<S: Into<String>>(
        reason: ManualReviewReason,
        expectation: &PendingExpectation,
        details: S,
    ) -> Self {
        Self {
            order_code: Some(expectation.order_code.clone()),
            session_id: Some(expectation.session_id.clone()),
            amount: Some(expectation.base_amount),
            fingerprint: Some(expectation.fingerprint.clone()),
            ..Self::new(reason, details)
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn with_payload(mut self, payload: DeliveryPayload) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl Display for OperatorAlert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "⚠️ {}", self.reason)?;
        if let Some(code) = &self.order_code {
            write!(f, " | order {code}")?;
        }
        if let Some(name) = &self.buyer_name {
            write!(f, " | buyer {name}")?;
        }
        if let Some(session) = &self.session_id {
            write!(f, " (session {session})")?;
        }
        if let Some(amount) = &self.amount {
            write!(f, " | amount {amount}")?;
        }
        if let Some(fp) = &self.fingerprint {
            write!(f, " | fingerprint {fp}")?;
        }
        write!(f, " | {}", self.details)?;
        if let Some(payload) = &self.payload {
            write!(f, "\n\nUndelivered units:\n{payload}")?;
        }
        Ok(())
    }
}
