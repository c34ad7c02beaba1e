use actix_web::http::{Method, StatusCode};
use dgp_engine::{
    db_types::{Order, PendingExpectation, Product, ReceivedSighting, SightingStatus},
    order_objects::{MatchResult, PaymentRequest, RecordSightingResult},
    order_state::OrderStatusType,
    test_utils::{notifier::RecordingNotifier, prepare_env::drop_database},
};
use log::debug;

use super::helpers::{
    get_signed,
    new_database,
    post_json,
    seed_product,
    send,
    sqlite_api,
    FRONTEND_SECRET,
    OPERATOR_SECRET,
};
use crate::data_objects::JsonResponse;

const BOB_ORDER: &str =
    r#"{"product":{"category":"gift","variant":"5usd"},"quantity":1,"session_id":"session-bob","display_name":"Bob"}"#;

#[actix_web::test]
async fn duplicate_sighting_is_a_conflict() {
    let db = new_database().await;
    seed_product(&db, 2).await;
    let api = sqlite_api(&db, RecordingNotifier::default());
    let req = post_json("/operator/sightings", r#"{"amount":"7.000013"}"#, OPERATOR_SECRET);
    let (status, body) = send(&api, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: RecordSightingResult = serde_json::from_str(&body).expect("Invalid sighting result json");
    assert!(matches!(result, RecordSightingResult::Stored { result: MatchResult::Unclaimed, .. }), "{result:?}");

    let req = post_json("/operator/sightings", r#"{"amount":"7.000013"}"#, OPERATOR_SECRET);
    let (status, body) = send(&api, req).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    let result: RecordSightingResult = serde_json::from_str(&body).expect("Invalid sighting result json");
    match result {
        RecordSightingResult::DuplicateRejected { existing } => {
            assert_eq!(existing.fingerprint.as_str(), "7.000013");
            assert_eq!(existing.status, SightingStatus::Unmatched);
        },
        other => panic!("Expected a duplicate, got {other:?}"),
    }

    let (status, body) = send(&api, get_signed("/operator/sightings?status=Unmatched", OPERATOR_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    let sightings: Vec<ReceivedSighting> = serde_json::from_str(&body).expect("Invalid sightings json");
    assert_eq!(sightings.len(), 1);
    drop_database(db).await;
}

#[actix_web::test]
async fn sub_micro_amounts_are_rejected() {
    let db = new_database().await;
    let api = sqlite_api(&db, RecordingNotifier::default());
    let (status, body) =
        send(&api, post_json("/operator/sightings", r#"{"amount":"7.0000131"}"#, OPERATOR_SECRET)).await;
    debug!("{body}");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    drop_database(db).await;
}

#[actix_web::test]
async fn operator_declines_an_unpaid_order() {
    let db = new_database().await;
    seed_product(&db, 1).await;
    let notifier = RecordingNotifier::default();
    let api = sqlite_api(&db, notifier.clone());
    let (_, body) = send(&api, post_json("/api/orders", BOB_ORDER, FRONTEND_SECRET)).await;
    let order: Order = serde_json::from_str(&body).expect("Invalid order json");
    let path = format!("/api/orders/{}/payment", order.order_code);
    let (_, body) = send(&api, post_json(&path, "", FRONTEND_SECRET)).await;
    let request: PaymentRequest = serde_json::from_str(&body).expect("Invalid payment request json");

    let (status, body) = send(&api, get_signed("/operator/expectations", OPERATOR_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    let pending: Vec<PendingExpectation> = serde_json::from_str(&body).expect("Invalid expectations json");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].fingerprint, request.fingerprint);

    let path = format!("/operator/orders/{}/decline", order.order_code);
    let (status, body) = send(&api, post_json(&path, r#"{"reason":"Nothing arrived"}"#, OPERATOR_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let declined: Order = serde_json::from_str(&body).expect("Invalid order json");
    assert_eq!(declined.status, OrderStatusType::Cancelled);
    assert!(notifier.messages_for("session-bob").iter().any(|m| m.contains("Nothing arrived")));

    let (_, body) = send(&api, get_signed("/operator/expectations", OPERATOR_SECRET)).await;
    let pending: Vec<PendingExpectation> = serde_json::from_str(&body).expect("Invalid expectations json");
    assert!(pending.is_empty(), "The declined order's fingerprint must be released");

    let (status, body) = send(&api, get_signed("/operator/orders?status=Cancelled", OPERATOR_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).expect("Invalid orders json");
    assert_eq!(orders.len(), 1);
    drop_database(db).await;
}

#[actix_web::test]
async fn operator_approves_a_payment_of_the_wrong_amount() {
    let db = new_database().await;
    seed_product(&db, 2).await;
    let notifier = RecordingNotifier::default();
    let api = sqlite_api(&db, notifier.clone());
    let (_, body) = send(&api, post_json("/api/orders", BOB_ORDER, FRONTEND_SECRET)).await;
    let order: Order = serde_json::from_str(&body).expect("Invalid order json");
    let path = format!("/api/orders/{}/payment", order.order_code);
    let (_, body) = send(&api, post_json(&path, "", FRONTEND_SECRET)).await;
    let request: PaymentRequest = serde_json::from_str(&body).expect("Invalid payment request json");
    assert_ne!(request.fingerprint.as_str(), "5.000000");

    // Bob left off the identifying digits, so nothing can be matched automatically
    let (_, body) = send(&api, post_json("/operator/sightings", r#"{"amount":"5.00"}"#, OPERATOR_SECRET)).await;
    let result: RecordSightingResult = serde_json::from_str(&body).expect("Invalid sighting result json");
    assert!(matches!(result, RecordSightingResult::Stored { result: MatchResult::Unclaimed, .. }), "{result:?}");

    let path = format!("/operator/orders/{}/approve", order.order_code);
    let (status, _) = send(&api, post_json(&path, r#"{"amount":"5.00"}"#, FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&api, post_json(&path, r#"{"amount":"5.00"}"#, OPERATOR_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: MatchResult = serde_json::from_str(&body).expect("Invalid match result json");
    match result {
        MatchResult::Fulfilled { order: approved, delivered, payload } => {
            assert_eq!(approved.order_code, order.order_code);
            assert_eq!(approved.status, OrderStatusType::Completed);
            assert!(delivered);
            assert_eq!(payload.len(), 1);
        },
        other => panic!("Expected the order to be fulfilled, got {other:?}"),
    }
    assert!(notifier.messages_for("session-bob").iter().any(|m| m.contains("GIFT-0001")));

    let (_, body) = send(&api, get_signed("/operator/sightings?status=Matched", OPERATOR_SECRET)).await;
    let sightings: Vec<ReceivedSighting> = serde_json::from_str(&body).expect("Invalid sightings json");
    assert_eq!(sightings.len(), 1);
    assert_eq!(sightings[0].matched_order.as_ref(), Some(&order.order_code));

    let (status, body) = send(&api, post_json(&path, r#"{"amount":"5.00"}"#, OPERATOR_SECRET)).await;
    assert_eq!(status, StatusCode::CONFLICT, "A completed order cannot be approved again. {body}");

    // The same payment cannot settle a second order
    let (_, body) = send(&api, post_json("/api/orders", BOB_ORDER, FRONTEND_SECRET)).await;
    let second: Order = serde_json::from_str(&body).expect("Invalid order json");
    let path = format!("/api/orders/{}/payment", second.order_code);
    let (status, _) = send(&api, post_json(&path, "", FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    let path = format!("/operator/orders/{}/approve", second.order_code);
    let (status, body) = send(&api, post_json(&path, r#"{"amount":"5.00"}"#, OPERATOR_SECRET)).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert!(body.contains("already settled"), "{body}");
    drop_database(db).await;
}

#[actix_web::test]
async fn catalog_maintenance() {
    let db = new_database().await;
    let api = sqlite_api(&db, RecordingNotifier::default());
    let product = r#"{"product":{"category":"vpn","variant":"1m"},"name":"VPN, one month","unit_price":"3.50"}"#;
    let (status, body) = send(&api, post_json("/operator/products", product, OPERATOR_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) =
        send(&api, post_json("/operator/products/vpn/1m/stock", r#"{"payloads":["vpn-a","vpn-b"]}"#, OPERATOR_SECRET))
            .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let product: Product = serde_json::from_str(&body).expect("Invalid product json");
    assert_eq!(product.cached_stock, 2);
    assert!(product.stock_refreshed_at.is_some());

    let (status, body) =
        send(&api, post_json("/operator/products/vpn/1m/stock", r#"{"payloads":["  "]}"#, OPERATOR_SECRET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = send(&api, post_json("/operator/stock/refresh", "", OPERATOR_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response: JsonResponse = serde_json::from_str(&body).expect("Invalid json response");
    assert!(response.success);
    assert_eq!(response.message, "vpn/1m: 2");

    let req = post_json("/operator/products/vpn/1m/price", r#"{"unit_price":"4.25"}"#, OPERATOR_SECRET)
        .method(Method::PATCH);
    let (status, body) = send(&api, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let req = post_json("/operator/products/vpn/1m/price", r#"{"unit_price":"4.255"}"#, OPERATOR_SECRET)
        .method(Method::PATCH);
    let (status, _) = send(&api, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "Prices must be whole cents");

    let (status, body) = send(&api, get_signed("/api/products", FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    let products: Vec<Product> = serde_json::from_str(&body).expect("Invalid products json");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].unit_price.to_cents_string(), "4.25");
    drop_database(db).await;
}
