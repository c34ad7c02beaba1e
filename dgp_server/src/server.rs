use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, web::ServiceConfig, App, HttpServer};
use dgp_engine::{
    events::EventProducers,
    CatalogApi,
    EngineDatabase,
    InventoryStore,
    Notifier,
    OrderFlowApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    audit_hooks::create_audit_event_handlers,
    config::{HmacConfig, ServerConfig, HMAC_HEADER},
    errors::ServerError,
    middleware::HmacMiddlewareFactory,
    notifier::ServerNotifier,
    routes::{
        health,
        AddStockRoute,
        ApproveOrderRoute,
        CancelOrderRoute,
        CreateOrderRoute,
        DeclineOrderRoute,
        ExpectationsRoute,
        OrderByCodeRoute,
        OrdersWithStatusRoute,
        ProductsRoute,
        RecordSightingRoute,
        RefreshStockRoute,
        RequestPaymentRoute,
        SightingsRoute,
        SubmitConfirmationRoute,
        UpdatePriceRoute,
        UpsertProductRoute,
    },
};

const DB_MAX_CONNECTIONS: u32 = 25;

pub type ServerApi = OrderFlowApi<SqliteDatabase, SqliteDatabase, ServerNotifier>;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, DB_MAX_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_audit_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    if let Some(period) = config.stock_refresh_interval {
        let catalog = CatalogApi::new(db.clone(), db.clone(), config.collaborator_timeout);
        // The worker runs for the lifetime of the process
        let _handle = crate::stock_worker::start_stock_worker(catalog, period);
    }
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let notifier = ServerNotifier::new(&config.notifier);
    let flow_config = config.flow_config();
    let hmac = config.hmac.clone();
    let srv = HttpServer::new(move || {
        // Clones of the database share one connection pool and one ledger lock
        let api = OrderFlowApi::new(db.clone(), db.clone(), notifier.clone(), producers.clone(), flow_config.clone());
        let hmac = hmac.clone();
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("dgp::access_log"))
            .app_data(web::Data::new(api))
            .configure(move |cfg| configure_routes::<SqliteDatabase, SqliteDatabase, ServerNotifier>(cfg, &hmac))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("💻️ Server listening on {}:{}", config.host, config.port);
    Ok(srv)
}

/// Registers every route. The caller supplies the matching `OrderFlowApi<B, I, N>` as app data.
pub fn configure_routes<B, I, N>(cfg: &mut ServiceConfig, hmac: &HmacConfig)
where
    B: EngineDatabase + 'static,
    I: InventoryStore + 'static,
    N: Notifier + 'static,
{
    let api_scope = web::scope("/api")
        .wrap(HmacMiddlewareFactory::new(HMAC_HEADER, hmac.frontend_secret.clone(), hmac.checks_enabled))
        .service(ProductsRoute::<B, I, N>::new())
        .service(CreateOrderRoute::<B, I, N>::new())
        .service(OrderByCodeRoute::<B, I, N>::new())
        .service(RequestPaymentRoute::<B, I, N>::new())
        .service(SubmitConfirmationRoute::<B, I, N>::new())
        .service(CancelOrderRoute::<B, I, N>::new());
    let operator_scope = web::scope("/operator")
        .wrap(HmacMiddlewareFactory::new(HMAC_HEADER, hmac.operator_secret.clone(), hmac.checks_enabled))
        .service(RecordSightingRoute::<B, I, N>::new())
        .service(SightingsRoute::<B, I, N>::new())
        .service(DeclineOrderRoute::<B, I, N>::new())
        .service(ApproveOrderRoute::<B, I, N>::new())
        .service(OrdersWithStatusRoute::<B, I, N>::new())
        .service(ExpectationsRoute::<B, I, N>::new())
        .service(UpsertProductRoute::<B, I, N>::new())
        .service(UpdatePriceRoute::<B, I, N>::new())
        .service(AddStockRoute::<B, I, N>::new())
        .service(RefreshStockRoute::<B, I, N>::new());
    cfg.service(health).service(api_scope).service(operator_scope);
}
