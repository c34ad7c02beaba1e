//! Turns a claimed match into delivered units.
//!
//! Fulfillment happens in two steps, with the order's transition to `Completed` in between:
//! 1. [`FulfillmentCoordinator::reserve`] consumes exactly `quantity` units through the inventory's all-or-nothing
//!    primitive. It is idempotent per order code, so the single retry after a timeout cannot double-consume.
//! 2. [`FulfillmentCoordinator::deliver`] pushes the payload to the buyer's session. A delivery failure does not
//!    undo the consumption. The payload is escalated to the operator instead.
use std::{fmt::Debug, time::Duration};

use log::*;

use crate::{
    db_types::{ConsumerRecord, DeliveryPayload, Order},
    helpers::{with_retry, RetryError},
    traits::{InventoryError, InventoryStore, ManualReviewReason, Notifier, NotifyError, OperatorAlert, ReserveResult},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentFailure {
    InsufficientStock { requested: i64, available: i64 },
    InventoryUnavailable(String),
}

impl FulfillmentFailure {
    pub fn review_reason(&self) -> ManualReviewReason {
        match self {
            Self::InsufficientStock { .. } => ManualReviewReason::InsufficientStock,
            Self::InventoryUnavailable(_) => ManualReviewReason::InventoryUnavailable,
        }
    }

    pub fn details(&self) -> String {
        match self {
            Self::InsufficientStock { requested, available } => {
                format!("Only {available} of {requested} units were available. Nothing was consumed.")
            },
            Self::InventoryUnavailable(e) => format!("The inventory could not be reached. {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The buyer could not be reached. The payload was handed to the operator.
    Escalated(String),
}

#[derive(Clone)]
pub struct FulfillmentCoordinator<I, N> {
    inventory: I,
    notifier: N,
    timeout: Duration,
}

impl<I, N> Debug for FulfillmentCoordinator<I, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FulfillmentCoordinator({:?})", self.timeout)
    }
}

impl<I, N> FulfillmentCoordinator<I, N> {
    pub fn new(inventory: I, notifier: N, timeout: Duration) -> Self {
        Self { inventory, notifier, timeout }
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }
}

impl<I, N> FulfillmentCoordinator<I, N>
where
    I: InventoryStore,
    N: Notifier,
{
    /// Consumes the order's units. On failure nothing has been consumed.
    pub async fn reserve(&self, order: &Order) -> Result<DeliveryPayload, FulfillmentFailure> {
        let consumer = ConsumerRecord::from(order);
        let result = with_retry("Inventory consumption", self.timeout, || {
            self.inventory.reserve_and_consume(&order.product, order.quantity, &consumer)
        })
        .await;
        match result {
            Ok(ReserveResult::Consumed(items)) => {
                debug!("📦️ {} units reserved for order {}", items.len(), order.order_code);
                Ok(DeliveryPayload::new(items))
            },
            Ok(ReserveResult::InsufficientStock { available }) => {
                warn!(
                    "📦️ InsufficientStock for order {}. {available} of {} units of {} available",
                    order.order_code, order.quantity, order.product
                );
                Err(FulfillmentFailure::InsufficientStock { requested: order.quantity, available })
            },
            Err(RetryError::Failed(InventoryError::Rejected(e))) => {
                error!("📦️ The inventory rejected order {}. {e}", order.order_code);
                Err(FulfillmentFailure::InventoryUnavailable(e))
            },
            Err(e) => {
                error!("📦️ The inventory is unavailable for order {}. {e}", order.order_code);
                Err(FulfillmentFailure::InventoryUnavailable(e.to_string()))
            },
        }
    }

    /// Sends the payload to the buyer. If that fails, the payload goes to the operator.
    pub async fn deliver(&self, order: &Order, payload: &DeliveryPayload) -> DeliveryOutcome {
        let message = delivery_message(order, payload);
        match self.notify_buyer(&order.buyer.session_id, &message).await {
            Ok(()) => {
                info!("📦️ Order {} delivered to {}", order.order_code, order.buyer.display_name);
                DeliveryOutcome::Delivered
            },
            Err(e) => {
                warn!("📦️ Could not deliver order {} to session {}. {e}", order.order_code, order.buyer.session_id);
                let alert = OperatorAlert::for_order(
                    ManualReviewReason::DeliveryFailed,
                    order,
                    format!("The units were consumed, but could not be sent to the buyer. {e}"),
                )
                .with_payload(payload.clone());
                self.alert_operator(&alert).await;
                DeliveryOutcome::Escalated(e.to_string())
            },
        }
    }

    /// Sends a message to a buyer session, giving up after the collaborator timeout.
    pub async fn notify_buyer(&self, session_id: &str, message: &str) -> Result<(), NotifyError> {
        match tokio::time::timeout(self.timeout, self.notifier.notify(session_id, message)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::TimedOut),
        }
    }

    /// Sends the alert to the operator. A failure is logged, since there is nobody left to escalate to.
    pub async fn alert_operator(&self, alert: &OperatorAlert) {
        warn!("📦️ Operator alert: {alert}");
        match tokio::time::timeout(self.timeout, self.notifier.alert_operator(alert)).await {
            Ok(Ok(())) => trace!("📦️ Operator alerted"),
            Ok(Err(e)) => error!("📦️ Could not alert the operator. {e}. Alert was: {alert}"),
            Err(_) => error!("📦️ Timed out alerting the operator. Alert was: {alert}"),
        }
    }
}

/// The message sent to the buyer with their units.
pub fn delivery_message(order: &Order, payload: &DeliveryPayload) -> String {
    format!(
        "✅ Payment received for order {}.\n{} x {}\n\n{payload}",
        order.order_code, order.quantity, order.product_name
    )
}
