use std::fmt::Debug;

use chrono::{DateTime, Utc};
use dgp_common::Amount;
use log::*;

use crate::{
    db_types::{
        BuyerInfo,
        ExpectationStatus,
        Fingerprint,
        NewOrder,
        NewPendingExpectation,
        NewSighting,
        Order,
        OrderCode,
        OrderStatusType,
        OrderUpdate,
        PendingExpectation,
        ProductKey,
        ReceivedSighting,
        SightingStatus,
    },
    dgp_api::{
        catalog_api::CatalogApi,
        errors::OrderFlowError,
        fulfillment::{DeliveryOutcome, FulfillmentCoordinator},
        order_objects::{FlowConfig, MatchResult, PaymentRequest, RecordSightingResult},
    },
    events::{EventProducers, ManualReviewEvent, OrderAnnulledEvent, OrderCompletedEvent},
    helpers::{generate_order_code, generate_reference_code},
    traits::{
        CancelPendingResult,
        EngineDatabase,
        InsertSightingResult,
        InventoryStore,
        LedgerError,
        ManualReviewReason,
        MatchClaim,
        Notifier,
        OperatorAlert,
    },
};

const MAX_ORDER_CODE_ATTEMPTS: usize = 5;
const MAX_REFERENCE_LENGTH: usize = 128;

/// `OrderFlowApi` is the primary API for moving orders from creation to delivery.
///
/// Buyer-side calls ([`Self::create_order`], [`Self::request_payment`], [`Self::submit_confirmation`],
/// [`Self::cancel_order`]) and the operator's payment sightings ([`Self::record_sighting`]) both funnel into
/// [`Self::try_match`]. A match needs a sighting: a buyer saying "I paid" is never treated as proof of payment. Because
/// of that funnel, it does not matter whether the sighting or the buyer's confirmation arrives first.
pub struct OrderFlowApi<B, I, N> {
    db: B,
    catalog: CatalogApi<B, I>,
    fulfillment: FulfillmentCoordinator<I, N>,
    producers: EventProducers,
    config: FlowConfig,
}

impl<B, I, N> Debug for OrderFlowApi<B, I, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, I, N> OrderFlowApi<B, I, N>
where
    B: Clone,
    I: Clone,
{
    pub fn new(db: B, inventory: I, notifier: N, producers: EventProducers, config: FlowConfig) -> Self {
        let catalog = CatalogApi::new(db.clone(), inventory.clone(), config.collaborator_timeout);
        let fulfillment = FulfillmentCoordinator::new(inventory, notifier, config.collaborator_timeout);
        Self { db, catalog, fulfillment, producers, config }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn catalog(&self) -> &CatalogApi<B, I> {
        &self.catalog
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }
}

impl<B, I, N> OrderFlowApi<B, I, N>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    /// Creates a new order with status `Created`, capturing the product's current unit price.
    pub async fn create_order(
        &self,
        product: &ProductKey,
        quantity: i64,
        buyer: BuyerInfo,
    ) -> Result<Order, OrderFlowError> {
        if quantity <= 0 {
            return Err(OrderFlowError::InvalidQuantity(quantity));
        }
        if buyer.session_id.trim().is_empty() {
            return Err(OrderFlowError::InvalidBuyer("The buyer session id cannot be empty".into()));
        }
        let product =
            self.db.fetch_product(product).await?.ok_or_else(|| OrderFlowError::UnknownProduct(product.clone()))?;
        let total_price =
            product.unit_price.checked_mul(quantity).ok_or(OrderFlowError::InvalidQuantity(quantity))?;
        for _ in 0..MAX_ORDER_CODE_ATTEMPTS {
            let order_code = generate_order_code(&mut rand::thread_rng());
            let order = NewOrder {
                order_code,
                product: product.key.clone(),
                product_name: product.name.clone(),
                quantity,
                unit_price: product.unit_price,
                total_price,
                buyer: buyer.clone(),
            };
            match self.db.insert_order(order).await {
                Ok(order) => {
                    info!(
                        "🔄️ Order {} created for {} x {} ({})",
                        order.order_code,
                        quantity,
                        order.product,
                        total_price.to_cents_string()
                    );
                    return Ok(order);
                },
                Err(LedgerError::OrderAlreadyExists(code)) => {
                    warn!("🔄️ Order code {code} collided with an existing order. Generating another.");
                },
                Err(e) => return Err(e.into()),
            }
        }
        Err(OrderFlowError::Ledger(LedgerError::DatabaseError(format!(
            "Could not find a free order code after {MAX_ORDER_CODE_ATTEMPTS} attempts"
        ))))
    }

    /// Issues the fingerprint amount for the order and moves it to `PaymentRequested`.
    ///
    /// Calling this again for an order that is already waiting for payment returns the same fingerprint.
    /// Stock is refreshed from the inventory first (falling back to the cached count if the inventory cannot be
    /// reached) and the request is refused if it shows fewer units than the order needs.
    pub async fn request_payment(&self, order_code: &OrderCode) -> Result<PaymentRequest, OrderFlowError> {
        let order = self.fetch_order(order_code).await?;
        match order.status {
            OrderStatusType::Created => {},
            OrderStatusType::PaymentRequested | OrderStatusType::ConfirmationSubmitted => {
                let expectation = self
                    .db
                    .fetch_pending(order_code)
                    .await?
                    .ok_or_else(|| LedgerError::ExpectationNotFound(order_code.clone()))?;
                debug!("🔄️ Order {order_code} already has a payment request. Returning it again.");
                return Ok(self.payment_request(order, expectation));
            },
            status => return Err(OrderFlowError::illegal(order_code, status, "request payment")),
        }
        let available = self.refreshed_stock(&order.product).await?;
        if available < order.quantity {
            info!("🔄️ Order {order_code} needs {} units, but only {available} are in stock", order.quantity);
            return Err(OrderFlowError::InsufficientStock {
                product: order.product.clone(),
                requested: order.quantity,
                available,
            });
        }
        let new_expectation = NewPendingExpectation {
            order_code: order_code.clone(),
            session_id: order.buyer.session_id.clone(),
            base_amount: order.total_price,
            reference_code: generate_reference_code(&mut rand::thread_rng()),
        };
        let expectation = self.db.allocate_pending(new_expectation).await?;
        let update = OrderUpdate::default().with_fingerprint(expectation.fingerprint.clone());
        let order = match self.db.transition_order(order_code, OrderStatusType::PaymentRequested, update).await {
            Ok(order) => order,
            Err(e) => return self.resolve_payment_request_race(order_code, expectation, e).await,
        };
        if expectation.degraded {
            let alert = OperatorAlert::for_order(
                ManualReviewReason::AllocationDegraded,
                &order,
                "Every fingerprint offset at this price is in use. The bare amount was issued and this order cannot \
                 be matched automatically.",
            );
            self.escalate(alert).await;
        }
        Ok(self.payment_request(order, expectation))
    }

    /// The order moved while its fingerprint was being allocated. Either a concurrent request already put it into
    /// `PaymentRequested` with the same fingerprint, or it was cancelled and the fingerprint must be released.
    async fn resolve_payment_request_race(
        &self,
        order_code: &OrderCode,
        expectation: PendingExpectation,
        error: LedgerError,
    ) -> Result<PaymentRequest, OrderFlowError> {
        let current = self.fetch_order(order_code).await?;
        if current.fingerprint.as_ref() == Some(&expectation.fingerprint) {
            debug!("🔄️ A concurrent request already issued {} for order {order_code}", expectation.fingerprint);
            return Ok(self.payment_request(current, expectation));
        }
        warn!("🔄️ Order {order_code} changed during payment request ({error}). Releasing its fingerprint.");
        if let Err(e) = self.db.cancel_pending(order_code).await {
            error!("🔄️ Could not release the fingerprint of order {order_code}. {e}");
        }
        Err(error.into())
    }

    /// Records the buyer's claim that they have paid, and looks for a matching sighting.
    ///
    /// The claim alone never completes the order.
    pub async fn submit_confirmation(
        &self,
        order_code: &OrderCode,
        reference: &str,
    ) -> Result<MatchResult, OrderFlowError> {
        let reference = validate_reference(reference)?;
        let order = self.fetch_order(order_code).await?;
        let order = match order.status {
            OrderStatusType::PaymentRequested => {
                let update = OrderUpdate::default().with_confirmation_ref(reference);
                match self.db.transition_order(order_code, OrderStatusType::ConfirmationSubmitted, update).await {
                    Ok(order) => order,
                    Err(LedgerError::IllegalTransition {
                        from: OrderStatusType::Completed | OrderStatusType::ManualInterventionRequired,
                        ..
                    }) => {
                        debug!("🔄️ Order {order_code} was settled while its confirmation was being recorded");
                        return Ok(MatchResult::AlreadyMatched { order_code: Some(order_code.clone()) });
                    },
                    Err(e) => return Err(e.into()),
                }
            },
            OrderStatusType::ConfirmationSubmitted => order,
            OrderStatusType::Completed | OrderStatusType::ManualInterventionRequired => {
                debug!("🔄️ Order {order_code} is already {}. Ignoring the confirmation.", order.status);
                return Ok(MatchResult::AlreadyMatched { order_code: Some(order_code.clone()) });
            },
            status => return Err(OrderFlowError::illegal(order_code, status, "accept a payment confirmation")),
        };
        info!("🔄️ Buyer confirmed payment for order {order_code}");
        self.on_confirmation_submitted(&order).await
    }

    async fn on_confirmation_submitted(&self, order: &Order) -> Result<MatchResult, OrderFlowError> {
        let fingerprint = match &order.fingerprint {
            Some(fp) => fp.clone(),
            None => {
                let expectation = self
                    .db
                    .fetch_pending(&order.order_code)
                    .await?
                    .ok_or_else(|| LedgerError::ExpectationNotFound(order.order_code.clone()))?;
                expectation.fingerprint
            },
        };
        self.try_match(&fingerprint).await
    }

    /// Cancels an order that has not been paid for. Its fingerprint is released first.
    pub async fn cancel_order(&self, order_code: &OrderCode, reason: &str) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(order_code).await?;
        if !order.status.can_transition_to(OrderStatusType::Cancelled) {
            return Err(OrderFlowError::illegal(order_code, order.status, "be cancelled"));
        }
        match self.db.cancel_pending(order_code).await? {
            CancelPendingResult::Cancelled(row) => debug!("🔄️ Fingerprint {} released", row.fingerprint),
            CancelPendingResult::NoExpectation => {},
            CancelPendingResult::NotPending(row) if row.status == ExpectationStatus::Cancelled => {},
            CancelPendingResult::NotPending(row) => {
                info!("🔄️ Order {order_code} cannot be cancelled. Its payment was already matched ({})", row.status);
                return Err(OrderFlowError::AlreadyPaid(order_code.clone()));
            },
        }
        let order = self.db.transition_order(order_code, OrderStatusType::Cancelled, OrderUpdate::default()).await?;
        info!("🔄️ Order {order_code} cancelled. {reason}");
        self.call_order_annulled_hook(&order, reason).await;
        Ok(order)
    }

    /// Operator rejection of an unpaid order. The buyer is told that their payment could not be verified.
    pub async fn decline_order(&self, order_code: &OrderCode, reason: &str) -> Result<Order, OrderFlowError> {
        let order = self.cancel_order(order_code, reason).await?;
        let message = format!(
            "❌ Your payment for order {order_code} could not be verified, so the order has been cancelled. {reason}"
        );
        if let Err(e) = self.fulfillment.notify_buyer(&order.buyer.session_id, &message).await {
            warn!("🔄️ Could not tell the buyer that order {order_code} was declined. {e}");
        }
        Ok(order)
    }

    /// Operator approval of a payment the engine would not match by itself, such as the bare base amount of a degraded
    /// order or a fingerprint that several orders share. The payment is recorded as sighted if nobody has reported it
    /// yet, then assigned to the order and fulfilled as usual.
    pub async fn approve_order(&self, order_code: &OrderCode, payment: Amount) -> Result<MatchResult, OrderFlowError> {
        if !payment.is_positive() {
            return Err(OrderFlowError::InvalidSighting(format!("{payment} is not a positive amount")));
        }
        let order = self.fetch_order(order_code).await?;
        if !order.status.can_transition_to(OrderStatusType::Completed) {
            return Err(OrderFlowError::illegal(order_code, order.status, "be approved"));
        }
        let fingerprint = Fingerprint::from(payment);
        if let InsertSightingResult::Inserted(sighting) =
            self.db.insert_sighting(NewSighting::new(payment, Utc::now())).await?
        {
            info!("🔄️ Payment of {} recorded by the operator's approval", sighting.fingerprint);
        }
        match self.db.claim_for_order(order_code, &fingerprint).await? {
            MatchClaim::Claimed { expectation, sighting } => {
                info!("🔄️ Operator approved order {order_code} with the payment of {fingerprint}");
                self.fulfill_claim(expectation, sighting).await
            },
            MatchClaim::AlreadyMatched { order_code: owner } if owner.as_ref() == Some(order_code) => {
                debug!("🔄️ Order {order_code} already holds the payment of {fingerprint}");
                Ok(MatchResult::AlreadyMatched { order_code: owner })
            },
            MatchClaim::AlreadyMatched { order_code: owner } => {
                let owner = owner.map(|c| c.to_string()).unwrap_or_else(|| "unknown".into());
                warn!("🔄️ Cannot approve order {order_code}. The payment of {fingerprint} already settled {owner}");
                Err(OrderFlowError::PaymentAlreadyClaimed { fingerprint, owner })
            },
            MatchClaim::NoPendingOrder => {
                let order = self.fetch_order(order_code).await?;
                Err(OrderFlowError::illegal(order_code, order.status, "be approved without a pending payment"))
            },
            claim => {
                let e = LedgerError::DatabaseError(format!("Unexpected claim result for {fingerprint}: {claim:?}"));
                Err(e.into())
            },
        }
    }

    /// Stores an operator-reported payment sighting and tries to match it.
    ///
    /// A second sighting of the same amount is rejected and reported, never stored.
    pub async fn record_sighting(
        &self,
        amount: Amount,
        observed_at: DateTime<Utc>,
    ) -> Result<RecordSightingResult, OrderFlowError> {
        if !amount.is_positive() {
            return Err(OrderFlowError::InvalidSighting(format!("{amount} is not a positive amount")));
        }
        match self.db.insert_sighting(NewSighting::new(amount, observed_at)).await? {
            InsertSightingResult::Duplicate(existing) => {
                warn!("🔄️ Duplicate sighting of {} rejected. It is already {}", existing.fingerprint, existing.status);
                Ok(RecordSightingResult::DuplicateRejected { existing })
            },
            InsertSightingResult::Inserted(sighting) => {
                info!("🔄️ Payment of {} sighted at {observed_at}", sighting.fingerprint);
                let result = self.on_sighting_recorded(&sighting.fingerprint).await?;
                Ok(RecordSightingResult::Stored { sighting, result })
            },
        }
    }

    async fn on_sighting_recorded(&self, fingerprint: &Fingerprint) -> Result<MatchResult, OrderFlowError> {
        self.try_match(fingerprint).await
    }

    /// Matches a sighting with its order and fulfills it. Safe to call any number of times for the same fingerprint.
    pub async fn try_match(&self, fingerprint: &Fingerprint) -> Result<MatchResult, OrderFlowError> {
        match self.db.claim_match(fingerprint).await? {
            MatchClaim::NoSighting => {
                debug!("🔄️ No payment of {fingerprint} has been sighted yet");
                Ok(MatchResult::AwaitingPayment)
            },
            MatchClaim::NoPendingOrder => {
                info!("🔄️ No pending order expects {fingerprint}. The sighting stays unmatched.");
                Ok(MatchResult::Unclaimed)
            },
            MatchClaim::AlreadyMatched { order_code } => {
                debug!("🔄️ Sighting {fingerprint} was already matched");
                Ok(MatchResult::AlreadyMatched { order_code })
            },
            MatchClaim::Ambiguous { candidates } => {
                let codes = candidates.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ");
                warn!("🔄️ Sighting {fingerprint} is ambiguous. Candidates: {codes}");
                let alert = OperatorAlert::new(
                    ManualReviewReason::AmbiguousFingerprint,
                    format!("The payment could belong to any of these orders: {codes}"),
                )
                .with_fingerprint(fingerprint.clone());
                self.escalate(alert).await;
                Ok(MatchResult::Ambiguous { candidates })
            },
            MatchClaim::Claimed { expectation, sighting } => self.fulfill_claim(expectation, sighting).await,
        }
    }

    /// Once a claim has been committed, the payment is on the books. Any failure after that point goes to the operator
    /// before it is returned, since nothing will retry it.
    async fn fulfill_claim(
        &self,
        expectation: PendingExpectation,
        sighting: ReceivedSighting,
    ) -> Result<MatchResult, OrderFlowError> {
        let code = expectation.order_code.clone();
        let fingerprint = sighting.fingerprint.clone();
        info!(target: "dgp::audit", "Sighting {fingerprint} ({}) matched to order {code}", sighting.observed_at);
        match self.settle_claim(&code).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("🔄️ Order {code} was paid with {fingerprint}, but could not be settled. {e}");
                let details = format!("The payment {fingerprint} was matched, but the order could not be settled. {e}");
                let alert = match self.db.fetch_order(&code).await {
                    Ok(Some(order)) => OperatorAlert::for_order(ManualReviewReason::SettlementFailed, &order, details),
                    _ => OperatorAlert::for_expectation(ManualReviewReason::SettlementFailed, &expectation, details),
                }
                .with_fingerprint(fingerprint);
                self.escalate(alert).await;
                Err(e)
            },
        }
    }

    async fn settle_claim(&self, code: &OrderCode) -> Result<MatchResult, OrderFlowError> {
        let order = self.fetch_order(code).await?;
        let payload = match self.fulfillment.reserve(&order).await {
            Ok(payload) => payload,
            Err(failure) => {
                let reason = failure.review_reason();
                self.db.flag_manual_intervention(code).await?;
                let update = OrderUpdate::default();
                let order = self.db.transition_order(code, OrderStatusType::ManualInterventionRequired, update).await?;
                info!(target: "dgp::audit", "Order {code} needs manual intervention: {reason}");
                let alert = OperatorAlert::for_order(reason, &order, failure.details());
                self.escalate(alert).await;
                return Ok(MatchResult::ManualIntervention { order, reason });
            },
        };
        let order = self.db.transition_order(code, OrderStatusType::Completed, OrderUpdate::default()).await?;
        info!(target: "dgp::audit", "Order {code} completed with {} units", payload.len());
        let delivered = match self.fulfillment.deliver(&order, &payload).await {
            DeliveryOutcome::Delivered => true,
            DeliveryOutcome::Escalated(e) => {
                let alert = OperatorAlert::for_order(ManualReviewReason::DeliveryFailed, &order, e);
                self.call_manual_review_hook(alert).await;
                false
            },
        };
        self.call_order_completed_hook(&order, delivered).await;
        Ok(MatchResult::Fulfilled { order, payload, delivered })
    }

    pub async fn fetch_order(&self, order_code: &OrderCode) -> Result<Order, OrderFlowError> {
        self.db.fetch_order(order_code).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_code.clone()))
    }

    pub async fn orders_with_status(&self, status: OrderStatusType) -> Result<Vec<Order>, OrderFlowError> {
        Ok(self.db.fetch_orders_with_status(status).await?)
    }

    pub async fn pending_expectations(
        &self,
        status: ExpectationStatus,
    ) -> Result<Vec<PendingExpectation>, OrderFlowError> {
        Ok(self.db.fetch_pending_with_status(status).await?)
    }

    pub async fn sightings(&self, status: SightingStatus) -> Result<Vec<ReceivedSighting>, OrderFlowError> {
        Ok(self.db.fetch_sightings_with_status(status).await?)
    }

    /// The current stock count for the product. If the inventory cannot be reached, the last cached count is used,
    /// as long as there is one.
    async fn refreshed_stock(&self, key: &ProductKey) -> Result<i64, OrderFlowError> {
        match self.catalog.refresh_stock(key).await {
            Ok(product) => Ok(product.cached_stock),
            Err(e) => {
                let product =
                    self.db.fetch_product(key).await?.ok_or_else(|| OrderFlowError::UnknownProduct(key.clone()))?;
                if product.stock_refreshed_at.is_none() {
                    warn!("🔄️ The stock of {key} has never been counted and the inventory is unreachable. {e}");
                    return Err(OrderFlowError::CollaboratorUnavailable(e.to_string()));
                }
                warn!("🔄️ Using the cached stock count for {key}. {e}");
                Ok(product.cached_stock)
            },
        }
    }

    fn payment_request(&self, order: Order, expectation: PendingExpectation) -> PaymentRequest {
        let instructions = payment_instructions(&order, &expectation, &self.config);
        PaymentRequest {
            order,
            fingerprint: expectation.fingerprint,
            reference_code: expectation.reference_code,
            degraded: expectation.degraded,
            instructions,
        }
    }

    async fn escalate(&self, alert: OperatorAlert) {
        self.fulfillment.alert_operator(&alert).await;
        self.call_manual_review_hook(alert).await;
    }

    async fn call_order_completed_hook(&self, order: &Order, delivered: bool) {
        for emitter in &self.producers.order_completed_producer {
            debug!("🔄️📬️ Notifying order completed hook subscribers");
            emitter.publish_event(OrderCompletedEvent::new(order.clone(), delivered)).await;
        }
    }

    async fn call_order_annulled_hook(&self, order: &Order, reason: &str) {
        for emitter in &self.producers.order_annulled_producer {
            debug!("🔄️📬️ Notifying order annulled hook subscribers");
            emitter.publish_event(OrderAnnulledEvent::new(order.clone(), reason)).await;
        }
    }

    async fn call_manual_review_hook(&self, alert: OperatorAlert) {
        for emitter in &self.producers.manual_review_producer {
            debug!("🔄️📬️ Notifying manual review hook subscribers");
            emitter.publish_event(ManualReviewEvent::new(alert.clone())).await;
        }
    }
}

fn validate_reference(reference: &str) -> Result<String, OrderFlowError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(OrderFlowError::MalformedConfirmation("The confirmation reference is empty".into()));
    }
    if reference.chars().count() > MAX_REFERENCE_LENGTH {
        return Err(OrderFlowError::MalformedConfirmation(format!(
            "The confirmation reference is longer than {MAX_REFERENCE_LENGTH} characters"
        )));
    }
    if reference.chars().any(char::is_control) {
        return Err(OrderFlowError::MalformedConfirmation(
            "The confirmation reference contains control characters".into(),
        ));
    }
    Ok(reference.to_string())
}

/// The text shown to the buyer with their payment request.
pub fn payment_instructions(order: &Order, expectation: &PendingExpectation, config: &FlowConfig) -> String {
    let destination = if config.payment_address.is_empty() {
        String::default()
    } else {
        format!(" to {}", config.payment_address)
    };
    format!(
        "Order {code}: {qty} x {name}.\nPlease send exactly {amount} {currency}{destination}.\nReference: {reference}\n\
         The digits after the cents identify your payment. Send the exact amount shown.",
        code = order.order_code,
        qty = order.quantity,
        name = order.product_name,
        amount = expectation.fingerprint,
        currency = config.currency_label,
        reference = expectation.reference_code,
    )
}
