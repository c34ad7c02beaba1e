use actix_web::{http::StatusCode, web};
use dgp_engine::{
    db_types::Order,
    events::EventProducers,
    order_objects::{MatchResult, PaymentRequest, RecordSightingResult},
    order_state::OrderStatusType,
    test_utils::{notifier::RecordingNotifier, prepare_env::drop_database},
    OrderFlowApi,
};

use super::{
    helpers::{
        flow_config,
        get_signed,
        new_database,
        post_json,
        seed_product,
        send,
        sqlite_api,
        FRONTEND_SECRET,
        OPERATOR_SECRET,
    },
    mocks::unreachable_inventory,
};

const ALICE_ORDER: &str = r#"{"product":{"category":"gift","variant":"5usd"},"quantity":2,
    "session_id":"session-alice","display_name":"Alice"}"#;

#[actix_web::test]
async fn order_is_paid_and_delivered() {
    let db = new_database().await;
    seed_product(&db, 3).await;
    let notifier = RecordingNotifier::default();
    let api = sqlite_api(&db, notifier.clone());

    let (status, body) = send(&api, post_json("/api/orders", ALICE_ORDER, FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = serde_json::from_str(&body).expect("Invalid order json");
    assert_eq!(order.status, OrderStatusType::Created);
    assert_eq!(order.total_price.to_cents_string(), "10.00");

    let path = format!("/api/orders/{}/payment", order.order_code);
    let (status, body) = send(&api, post_json(&path, "", FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let request: PaymentRequest = serde_json::from_str(&body).expect("Invalid payment request json");
    assert!(request.fingerprint.as_str().starts_with("10.00"));
    assert!(!request.degraded);
    assert!(request.instructions.contains(request.fingerprint.as_str()));

    let sighting = format!(r#"{{"amount":"{}"}}"#, request.fingerprint);
    let (status, body) = send(&api, post_json("/operator/sightings", &sighting, OPERATOR_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: RecordSightingResult = serde_json::from_str(&body).expect("Invalid sighting result json");
    match result {
        RecordSightingResult::Stored { result: MatchResult::Fulfilled { payload, delivered, .. }, .. } => {
            assert!(delivered);
            assert_eq!(payload.items, vec!["GIFT-0001".to_string(), "GIFT-0002".to_string()]);
        },
        other => panic!("Expected the order to be fulfilled, got {other:?}"),
    }

    let path = format!("/api/orders/{}", order.order_code);
    let (status, body) = send(&api, get_signed(&path, FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = serde_json::from_str(&body).expect("Invalid order json");
    assert_eq!(order.status, OrderStatusType::Completed);
    let messages = notifier.messages_for("session-alice");
    assert!(messages.iter().any(|m| m.contains("GIFT-0001") && m.contains("GIFT-0002")), "{messages:?}");
    drop_database(db).await;
}

#[actix_web::test]
async fn confirmation_before_sighting_waits_for_payment() {
    let db = new_database().await;
    seed_product(&db, 2).await;
    let api = sqlite_api(&db, RecordingNotifier::default());
    let (_, body) = send(&api, post_json("/api/orders", ALICE_ORDER, FRONTEND_SECRET)).await;
    let order: Order = serde_json::from_str(&body).expect("Invalid order json");
    let path = format!("/api/orders/{}/payment", order.order_code);
    let (status, _) = send(&api, post_json(&path, "", FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::OK);

    let path = format!("/api/orders/{}/confirmation", order.order_code);
    let (status, body) = send(&api, post_json(&path, r#"{"reference":"TX-991"}"#, FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: MatchResult = serde_json::from_str(&body).expect("Invalid match result json");
    assert_eq!(result, MatchResult::AwaitingPayment);
    let order = api.fetch_order(&order.order_code).await.expect("Order should exist");
    assert_eq!(order.status, OrderStatusType::ConfirmationSubmitted);
    assert_eq!(order.confirmation_ref.as_deref(), Some("TX-991"));
    drop_database(db).await;
}

#[actix_web::test]
async fn unknown_product_is_not_found() {
    let db = new_database().await;
    let api = sqlite_api(&db, RecordingNotifier::default());
    let (status, body) = send(&api, post_json("/api/orders", ALICE_ORDER, FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. The product gift/5usd does not exist"}"#);
    drop_database(db).await;
}

#[actix_web::test]
async fn zero_quantity_is_a_bad_request() {
    let db = new_database().await;
    seed_product(&db, 1).await;
    let api = sqlite_api(&db, RecordingNotifier::default());
    let body = r#"{"product":{"category":"gift","variant":"5usd"},"quantity":0,
        "session_id":"session-bob","display_name":"Bob"}"#;
    let (status, body) = send(&api, post_json("/api/orders", body, FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Quantity must be a positive whole number"), "{body}");
    drop_database(db).await;
}

#[actix_web::test]
async fn payment_request_beyond_stock_is_refused() {
    let db = new_database().await;
    seed_product(&db, 1).await;
    let api = sqlite_api(&db, RecordingNotifier::default());
    let (_, body) = send(&api, post_json("/api/orders", ALICE_ORDER, FRONTEND_SECRET)).await;
    let order: Order = serde_json::from_str(&body).expect("Invalid order json");
    let path = format!("/api/orders/{}/payment", order.order_code);
    let (status, body) = send(&api, post_json(&path, "", FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Only 1 units of gift/5usd are in stock, but 2 were requested"), "{body}");
    drop_database(db).await;
}

#[actix_web::test]
async fn payment_request_needs_a_stock_count() {
    let db = new_database().await;
    // The product exists, but its stock has never been counted and the inventory is down
    seed_product(&db, 0).await;
    let api = web::Data::new(OrderFlowApi::new(
        db.clone(),
        unreachable_inventory(),
        RecordingNotifier::default(),
        EventProducers::default(),
        flow_config(),
    ));
    let (status, body) = send(&api, post_json("/api/orders", ALICE_ORDER, FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = serde_json::from_str(&body).expect("Invalid order json");
    let path = format!("/api/orders/{}/payment", order.order_code);
    let (status, body) = send(&api, post_json(&path, "", FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{body}");
    let order = api.fetch_order(&order.order_code).await.expect("Order should exist");
    assert_eq!(order.status, OrderStatusType::Created);
    drop_database(db).await;
}

#[actix_web::test]
async fn cancelled_order_cannot_be_paid() {
    let db = new_database().await;
    seed_product(&db, 2).await;
    let api = sqlite_api(&db, RecordingNotifier::default());
    let (_, body) = send(&api, post_json("/api/orders", ALICE_ORDER, FRONTEND_SECRET)).await;
    let order: Order = serde_json::from_str(&body).expect("Invalid order json");

    let path = format!("/api/orders/{}/cancel", order.order_code);
    let (status, body) = send(&api, post_json(&path, r#"{"reason":"Changed my mind"}"#, FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let cancelled: Order = serde_json::from_str(&body).expect("Invalid order json");
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);

    let path = format!("/api/orders/{}/payment", order.order_code);
    let (status, _) = send(&api, post_json(&path, "", FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    drop_database(db).await;
}
