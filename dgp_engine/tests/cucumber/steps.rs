use std::str::FromStr;

use chrono::Utc;
use cucumber::{then, when};
use dgp_common::Amount;
use dgp_engine::{
    db_types::{BuyerInfo, ExpectationStatus, OrderStatusType, ProductKey, SightingStatus},
    order_objects::{MatchResult, RecordSightingResult},
    InventoryStore,
    LedgerStore,
    OrderFlowError,
};

use crate::cucumber::ShopWorld;

#[when(expr = "{word} orders {int} of {string}")]
async fn place_order(world: &mut ShopWorld, buyer: String, quantity: i64, key: String) {
    let key = ProductKey::from_str(&key).expect("Not a valid product key");
    let info = BuyerInfo::new(ShopWorld::session_id(&buyer), buyer.clone());
    let order = world.api().create_order(&key, quantity, info).await.expect("Error creating order");
    world.orders.insert(buyer, order.order_code);
}

#[when(expr = "{word} requests payment")]
async fn request_payment(world: &mut ShopWorld, buyer: String) {
    let code = world.order_code(&buyer);
    match world.api().request_payment(&code).await {
        Ok(request) => {
            world.requests.insert(buyer, request);
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "{word} submits confirmation {string}")]
async fn submit_confirmation(world: &mut ShopWorld, buyer: String, reference: String) {
    let code = world.order_code(&buyer);
    match world.api().submit_confirmation(&code, &reference).await {
        Ok(result) => world.last_result = Some(result),
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "the payment for {word} is sighted")]
async fn sight_payment(world: &mut ShopWorld, buyer: String) {
    let amount = world.payment_request(&buyer).fingerprint.amount().expect("Fingerprint is not an amount");
    record_sighting(world, amount).await;
}

#[when(expr = "a payment of {word} is sighted")]
async fn sight_amount(world: &mut ShopWorld, amount: String) {
    let amount = Amount::from_str(&amount).expect("Not a valid amount");
    record_sighting(world, amount).await;
}

async fn record_sighting(world: &mut ShopWorld, amount: Amount) {
    let outcome = world.api().record_sighting(amount, Utc::now()).await.expect("Error recording sighting");
    if let RecordSightingResult::Stored { result, .. } = &outcome {
        world.last_result = Some(result.clone());
    }
    world.last_sighting = Some(outcome);
}

#[when(expr = "the payment for {word} is matched again")]
async fn match_again(world: &mut ShopWorld, buyer: String) {
    let fingerprint = world.payment_request(&buyer).fingerprint.clone();
    let result = world.api().try_match(&fingerprint).await.expect("Error matching payment");
    world.last_result = Some(result);
}

#[when(expr = "{word} cancels the order")]
async fn cancel_order(world: &mut ShopWorld, buyer: String) {
    let code = world.order_code(&buyer);
    if let Err(e) = world.api().cancel_order(&code, "Changed my mind").await {
        world.last_error = Some(e);
    }
}

#[when(expr = "the operator declines the order for {word}")]
async fn decline_order(world: &mut ShopWorld, buyer: String) {
    let code = world.order_code(&buyer);
    world.api().decline_order(&code, "No matching payment was found").await.expect("Error declining order");
}

#[when(expr = "the operator approves the order for {word} with a payment of {word}")]
async fn approve_order(world: &mut ShopWorld, buyer: String, amount: String) {
    let code = world.order_code(&buyer);
    let amount = Amount::from_str(&amount).expect("Not a valid amount");
    match world.api().approve_order(&code, amount).await {
        Ok(result) => world.last_result = Some(result),
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "the operator approves the order for {word} with the payment for {word}")]
async fn approve_with_other_payment(world: &mut ShopWorld, buyer: String, payer: String) {
    let amount = world.payment_request(&payer).fingerprint.amount().expect("Fingerprint is not an amount");
    approve_order(world, buyer, amount.to_canonical_string()).await;
}

#[then(expr = "the order for {word} is {word}")]
async fn check_order_status(world: &mut ShopWorld, buyer: String, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order = world.api().fetch_order(&world.order_code(&buyer)).await.expect("Error fetching order");
    assert_eq!(order.status, expected, "Order for {buyer} has the wrong status");
}

#[then(expr = "the expectation for {word} is {word}")]
async fn check_expectation_status(world: &mut ShopWorld, buyer: String, status: String) {
    let expected = ExpectationStatus::from_str(&status).expect("Not a valid expectation status");
    let code = world.order_code(&buyer);
    let expectation =
        world.api().db().fetch_pending(&code).await.expect("Error fetching expectation").expect("No expectation");
    assert_eq!(expectation.status, expected, "Expectation for {buyer} has the wrong status");
}

#[then(expr = "the sighting for {word} is {word}")]
async fn check_sighting_status(world: &mut ShopWorld, buyer: String, status: String) {
    let expected = SightingStatus::from_str(&status).expect("Not a valid sighting status");
    let fingerprint = world.payment_request(&buyer).fingerprint.clone();
    let sighting =
        world.api().db().fetch_sighting(&fingerprint).await.expect("Error fetching sighting").expect("No sighting");
    assert_eq!(sighting.status, expected, "Sighting for {buyer} has the wrong status");
    if expected == SightingStatus::Matched {
        assert_eq!(sighting.matched_order, Some(world.order_code(&buyer)));
    }
}

#[then(expr = "the match result is {word}")]
async fn check_match_result(world: &mut ShopWorld, name: String) {
    let result = world.last_result.as_ref().expect("Nothing has been matched yet");
    assert_eq!(result.name(), name, "Unexpected match result: {result:?}");
}

#[then("the sighting is rejected as a duplicate")]
async fn check_duplicate(world: &mut ShopWorld) {
    let outcome = world.last_sighting.as_ref().expect("No sighting was recorded");
    assert!(matches!(outcome, RecordSightingResult::DuplicateRejected { .. }), "Expected a duplicate: {outcome:?}");
}

#[then(expr = "{int} sightings are on record")]
async fn check_sighting_count(world: &mut ShopWorld, count: usize) {
    let matched = world.api().sightings(SightingStatus::Matched).await.expect("Error fetching sightings");
    let unmatched = world.api().sightings(SightingStatus::Unmatched).await.expect("Error fetching sightings");
    assert_eq!(matched.len() + unmatched.len(), count);
}

#[then(expr = "{word} received units {int} to {int} of {string}")]
async fn check_delivery(world: &mut ShopWorld, buyer: String, first: i64, last: i64, key: String) {
    let key = ProductKey::from_str(&key).expect("Not a valid product key");
    let messages = world.system().notifier.messages_for(&ShopWorld::session_id(&buyer));
    let delivery = messages.last().unwrap_or_else(|| panic!("{buyer} received nothing"));
    for i in first..=last {
        let payload = ShopWorld::unit_payload(&key, i);
        assert!(delivery.contains(&payload), "{payload} is missing from the delivery: {delivery}");
    }
    if let Some(MatchResult::Fulfilled { payload, .. }) = &world.last_result {
        assert_eq!(payload.len() as i64, last - first + 1);
    }
}

#[then(expr = "{word} received no delivery")]
async fn check_no_delivery(world: &mut ShopWorld, buyer: String) {
    let messages = world.system().notifier.messages_for(&ShopWorld::session_id(&buyer));
    assert!(messages.iter().all(|m| !m.starts_with("✅")), "{buyer} received a delivery: {messages:?}");
}

#[then(expr = "{word} was told the order was declined")]
async fn check_declined_message(world: &mut ShopWorld, buyer: String) {
    let messages = world.system().notifier.messages_for(&ShopWorld::session_id(&buyer));
    assert!(messages.iter().any(|m| m.contains("could not be verified")), "No decline message: {messages:?}");
}

#[then(expr = "{int} units of {string} remain in stock")]
async fn check_stock(world: &mut ShopWorld, count: i64, key: String) {
    let key = ProductKey::from_str(&key).expect("Not a valid product key");
    let available = world.api().db().count_available(&key).await.expect("Error counting stock");
    assert_eq!(available, count);
}

#[then(expr = "the operator was alerted with {word}")]
async fn check_alert(world: &mut ShopWorld, reason: String) {
    let alerts = world.system().notifier.alerts();
    assert!(alerts.iter().any(|a| a.reason.to_string() == reason), "No {reason} alert in {alerts:?}");
}

#[then(expr = "the {word} alert for {word} carries units {int} to {int} of {string}")]
async fn check_alert_payload(world: &mut ShopWorld, reason: String, buyer: String, first: i64, last: i64, key: String) {
    let key = ProductKey::from_str(&key).expect("Not a valid product key");
    let code = world.order_code(&buyer);
    let alert = world
        .system()
        .notifier
        .alerts()
        .into_iter()
        .find(|a| a.reason.to_string() == reason && a.order_code.as_ref() == Some(&code))
        .unwrap_or_else(|| panic!("No {reason} alert for {buyer}"));
    let payload = alert.payload.expect("The alert has no payload").to_string();
    for i in first..=last {
        let unit = ShopWorld::unit_payload(&key, i);
        assert!(payload.contains(&unit), "{unit} is missing from the alert payload");
    }
}

#[then("the operator was not alerted")]
async fn check_no_alerts(world: &mut ShopWorld) {
    let alerts = world.system().notifier.alerts();
    assert!(alerts.is_empty(), "Unexpected alerts: {alerts:?}");
}

#[then(expr = "{word} and {word} were asked for different amounts")]
async fn check_distinct_fingerprints(world: &mut ShopWorld, a: String, b: String) {
    let fp_a = &world.payment_request(&a).fingerprint;
    let fp_b = &world.payment_request(&b).fingerprint;
    assert_ne!(fp_a, fp_b);
}

#[then(expr = "{word} was asked to pay {word} plus a sub-cent offset")]
async fn check_fingerprint_base(world: &mut ShopWorld, buyer: String, base: String) {
    let base = Amount::from_str(&base).expect("Not a valid amount");
    let request = world.payment_request(&buyer);
    let amount = request.fingerprint.amount().expect("Fingerprint is not an amount");
    let offset = amount.micros() - base.micros();
    assert!((1..=99).contains(&offset), "{amount} is not {base} plus an offset");
    assert!(!request.degraded);
    assert!(request.instructions.contains(request.fingerprint.as_str()));
}

#[then(expr = "the payment request for {word} is degraded")]
async fn check_degraded(world: &mut ShopWorld, buyer: String) {
    let request = world.payment_request(&buyer);
    assert!(request.degraded, "{buyer} was issued {}", request.fingerprint);
    assert_eq!(request.fingerprint.amount().expect("Fingerprint is not an amount"), request.order.total_price);
}

#[then("the request failed because the payment settled another order")]
async fn check_payment_claimed(world: &mut ShopWorld) {
    let err = world.last_error.take().expect("No error was recorded");
    assert!(matches!(err, OrderFlowError::PaymentAlreadyClaimed { .. }), "Unexpected error: {err}");
}

#[then("the request failed because there is not enough stock")]
async fn check_insufficient_stock(world: &mut ShopWorld) {
    let err = world.last_error.take().expect("No error was recorded");
    assert!(matches!(err, OrderFlowError::InsufficientStock { .. }), "Unexpected error: {err}");
}

#[then("the request failed because the order cannot change")]
async fn check_illegal(world: &mut ShopWorld) {
    let err = world.last_error.take().expect("No error was recorded");
    assert!(matches!(err, OrderFlowError::IllegalTransition { .. }), "Unexpected error: {err}");
}
