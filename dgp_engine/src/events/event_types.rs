use serde::{Deserialize, Serialize};

use crate::{
    db_types::Order,
    traits::{ManualReviewReason, OperatorAlert},
};

/// A paid order whose units were consumed. `delivered` is false if the buyer could not be sent them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompletedEvent {
    pub order: Order,
    pub delivered: bool,
}

impl OrderCompletedEvent {
    pub fn new(order: Order, delivered: bool) -> Self {
        Self { order, delivered }
    }
}

/// An order that was cancelled by the buyer or declined by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub reason: String,
}

impl OrderAnnulledEvent {
    pub fn new<S: Into<String>>(order: Order, reason: S) -> Self {
        Self { order, reason: reason.into() }
    }
}

/// Something the engine will not resolve by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualReviewEvent {
    pub alert: OperatorAlert,
}

impl ManualReviewEvent {
    pub fn new(alert: OperatorAlert) -> Self {
        Self { alert }
    }

    pub fn reason(&self) -> ManualReviewReason {
        self.alert.reason
    }
}
