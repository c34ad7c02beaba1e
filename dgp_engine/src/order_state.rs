//! The order lifecycle.
//!
//! ```text
//! Created -> PaymentRequested -> ConfirmationSubmitted -> Completed
//!                    |                     |           -> ManualInterventionRequired
//!                    |                     |           -> Cancelled
//!                    +--> Completed | ManualInterventionRequired | Cancelled
//! Created -> Cancelled
//! ```
//!
//! A payment sighting can arrive before the buyer says they paid, so `PaymentRequested` may move straight to one of
//! the settled states. `Completed`, `ManualInterventionRequired` and `Cancelled` are terminal.
use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::db_types::ConversionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order exists, but no payment amount has been issued yet.
    Created,
    /// A fingerprint amount has been issued and the order is waiting for payment.
    PaymentRequested,
    /// The buyer says they have paid. This is not proof of payment.
    ConfirmationSubmitted,
    /// Payment was sighted and the units were delivered.
    Completed,
    /// Payment was sighted, but the order could not be fulfilled automatically. An operator must resolve it.
    ManualInterventionRequired,
    /// The order was cancelled by the buyer or declined by the operator.
    Cancelled,
}

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 6] = [
        OrderStatusType::Created,
        OrderStatusType::PaymentRequested,
        OrderStatusType::ConfirmationSubmitted,
        OrderStatusType::Completed,
        OrderStatusType::ManualInterventionRequired,
        OrderStatusType::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::ManualInterventionRequired | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, next),
            (Created, PaymentRequested | Cancelled) |
                (PaymentRequested, ConfirmationSubmitted | Completed | ManualInterventionRequired | Cancelled) |
                (ConfirmationSubmitted, Completed | ManualInterventionRequired | Cancelled)
        )
    }

    /// Every status from which `next` can legally be reached.
    pub fn predecessors_of(next: OrderStatusType) -> Vec<OrderStatusType> {
        Self::ALL.iter().copied().filter(|s| s.can_transition_to(next)).collect()
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Created => write!(f, "Created"),
            OrderStatusType::PaymentRequested => write!(f, "PaymentRequested"),
            OrderStatusType::ConfirmationSubmitted => write!(f, "ConfirmationSubmitted"),
            OrderStatusType::Completed => write!(f, "Completed"),
            OrderStatusType::ManualInterventionRequired => write!(f, "ManualInterventionRequired"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "PaymentRequested" => Ok(Self::PaymentRequested),
            "ConfirmationSubmitted" => Ok(Self::ConfirmationSubmitted),
            "Completed" => Ok(Self::Completed),
            "ManualInterventionRequired" => Ok(Self::ManualInterventionRequired),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}
