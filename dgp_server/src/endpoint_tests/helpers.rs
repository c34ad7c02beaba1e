use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use dgp_common::{Amount, Secret};
use dgp_engine::{
    db_types::{NewProduct, ProductKey},
    events::EventProducers,
    order_objects::FlowConfig,
    test_utils::{
        notifier::RecordingNotifier,
        prepare_env::{prepare_test_env, random_db_path},
    },
    EngineDatabase,
    InventoryStore,
    Notifier,
    OrderFlowApi,
    SqliteDatabase,
};
use log::debug;

use crate::{config::HmacConfig, helpers::calculate_hmac, server::configure_routes};

// Test secrets only. DO NOT re-use these anywhere.
pub const FRONTEND_SECRET: &str = "frontend-test-secret";
pub const OPERATOR_SECRET: &str = "operator-test-secret";

pub type TestApi<I> = web::Data<OrderFlowApi<SqliteDatabase, I, RecordingNotifier>>;

pub fn hmac_config() -> HmacConfig {
    HmacConfig {
        frontend_secret: Secret::new(FRONTEND_SECRET.to_string()),
        operator_secret: Secret::new(OPERATOR_SECRET.to_string()),
        checks_enabled: true,
    }
}

pub fn flow_config() -> FlowConfig {
    FlowConfig { payment_address: "pay@example.com".into(), ..FlowConfig::default() }
}

/// A fresh database, with migrations run.
pub async fn new_database() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database")
}

/// An API backed by `db`, using the database as its unit inventory.
pub fn sqlite_api(db: &SqliteDatabase, notifier: RecordingNotifier) -> TestApi<SqliteDatabase> {
    let api = OrderFlowApi::new(db.clone(), db.clone(), notifier, EventProducers::default(), flow_config());
    web::Data::new(api)
}

pub async fn seed_product(db: &SqliteDatabase, units: usize) -> ProductKey {
    let api = sqlite_api(db, RecordingNotifier::default());
    let key = ProductKey::new("gift", "5usd");
    api.catalog()
        .upsert_product(NewProduct::new(key.clone(), "$5 gift card", Amount::from_cents(500)))
        .await
        .expect("Error adding product");
    if units > 0 {
        let payloads = (1..=units).map(|i| format!("GIFT-{i:04}")).collect();
        api.catalog().add_stock(&key, payloads).await.expect("Error adding stock");
    }
    key
}

pub fn post_json(path: &str, body: &str, secret: &str) -> TestRequest {
    let signature = calculate_hmac(secret, body.as_bytes());
    TestRequest::post()
        .uri(path)
        .insert_header(("Content-Type", "application/json"))
        .insert_header((crate::config::HMAC_HEADER, signature))
        .set_payload(body.to_string())
}

pub fn get_signed(path: &str, secret: &str) -> TestRequest {
    let signature = calculate_hmac(secret, b"");
    TestRequest::get().uri(path).insert_header((crate::config::HMAC_HEADER, signature))
}

/// Sends the request through a service configured exactly like the server's. Errors raised by middleware are
/// returned as a status code and message, the same way a client would see them.
pub async fn send<B, I, N>(api: &web::Data<OrderFlowApi<B, I, N>>, req: TestRequest) -> (StatusCode, String)
where
    B: EngineDatabase + 'static,
    I: InventoryStore + 'static,
    N: Notifier + 'static,
{
    let hmac = hmac_config();
    let app = App::new().app_data(api.clone()).configure(|cfg| configure_routes::<B, I, N>(cfg, &hmac));
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => (e.as_response_error().status_code(), e.to_string()),
    }
}
