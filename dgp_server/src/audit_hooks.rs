//! Event subscribers that keep an audit trail of finished orders and cases handed to the operator.
//!
//! The engine publishes events after the fact, so these hooks can never hold up an order. They write to the
//! `dgp::audit` log target, which can be routed to its own file with `RUST_LOG`.
use dgp_engine::events::{EventHandlers, EventHooks, ManualReviewEvent, OrderAnnulledEvent, OrderCompletedEvent};
use log::*;

const AUDIT_EVENT_BUFFER_SIZE: usize = 25;

pub fn create_audit_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_completed(|ev| {
        let OrderCompletedEvent { order, delivered } = ev;
        Box::pin(async move {
            if delivered {
                info!(
                    target: "dgp::audit",
                    "📬️ Order {} completed: {} x {} for {} ({}). Paid {}.",
                    order.order_code,
                    order.quantity,
                    order.product,
                    order.buyer.display_name,
                    order.buyer.session_id,
                    order.fingerprint.as_ref().map(|f| f.as_str()).unwrap_or("??")
                );
            } else {
                warn!(
                    target: "dgp::audit",
                    "📬️ Order {} completed, but the units could not be delivered to {}. The operator has them.",
                    order.order_code,
                    order.buyer.session_id
                );
            }
        })
    });
    hooks.on_order_annulled(|ev| {
        let OrderAnnulledEvent { order, reason } = ev;
        Box::pin(async move {
            info!(target: "dgp::audit", "📬️ Order {} was cancelled. {reason}", order.order_code);
        })
    });
    hooks.on_manual_review(|ev: ManualReviewEvent| {
        Box::pin(async move {
            warn!(target: "dgp::audit", "📬️ Manual review needed ({}). {}", ev.reason(), ev.alert);
        })
    });
    EventHandlers::new(AUDIT_EVENT_BUFFER_SIZE, hooks)
}
