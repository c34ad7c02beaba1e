use actix_web::{http::StatusCode, test::TestRequest};
use dgp_engine::test_utils::{notifier::RecordingNotifier, prepare_env::drop_database};

use super::helpers::{get_signed, new_database, post_json, send, sqlite_api, FRONTEND_SECRET, OPERATOR_SECRET};

#[actix_web::test]
async fn health_needs_no_signature() {
    let db = new_database().await;
    let api = sqlite_api(&db, RecordingNotifier::default());
    let (status, body) = send(&api, TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
    drop_database(db).await;
}

#[actix_web::test]
async fn unsigned_requests_are_forbidden() {
    let db = new_database().await;
    let api = sqlite_api(&db, RecordingNotifier::default());
    let (status, body) = send(&api, TestRequest::get().uri("/api/products")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "No HMAC signature found.");
    drop_database(db).await;
}

#[actix_web::test]
async fn tampered_body_is_forbidden() {
    let db = new_database().await;
    let api = sqlite_api(&db, RecordingNotifier::default());
    let req = post_json("/operator/sightings", r#"{"amount":"10.000047"}"#, OPERATOR_SECRET)
        .set_payload(r#"{"amount":"99.000047"}"#);
    let (status, body) = send(&api, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Invalid HMAC signature.");
    drop_database(db).await;
}

#[actix_web::test]
async fn front_end_cannot_report_sightings() {
    let db = new_database().await;
    let api = sqlite_api(&db, RecordingNotifier::default());
    let (status, _) = send(&api, post_json("/operator/sightings", r#"{"amount":"10.000047"}"#, FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(&api, get_signed("/operator/sightings", OPERATOR_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]", "The forged sighting must not have been stored");
    drop_database(db).await;
}

#[actix_web::test]
async fn signed_catalog_request() {
    let db = new_database().await;
    let api = sqlite_api(&db, RecordingNotifier::default());
    let (status, body) = send(&api, get_signed("/api/products", FRONTEND_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
    drop_database(db).await;
}
