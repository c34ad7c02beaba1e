//! Request handler definitions
//!
//! Define each route and its handler here. Handlers stay thin: they parse the request, call the engine, and map the
//! result to a response. Anything longer belongs in the engine.
//!
//! A note about performance:
//! Each worker thread processes its requests sequentially, so a handler that blocks the thread stalls every request
//! queued on that worker. Every engine call is async (database, inventory and notification I/O), so handlers only
//! ever `.await` and never block.
use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use dgp_engine::{
    db_types::{BuyerInfo, NewProduct, OrderCode, ProductKey},
    order_objects::RecordSightingResult,
    EngineDatabase,
    InventoryStore,
    Notifier,
    OrderFlowApi,
};
use log::*;

use crate::{
    data_objects::{
        ApprovalParams,
        ConfirmationParams,
        ExpectationStatusQuery,
        JsonResponse,
        NewOrderRequest,
        OrderStatusQuery,
        PriceParams,
        ProductParams,
        ReasonParams,
        SightingParams,
        SightingStatusQuery,
        StockParams,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

type FlowApi<B, I, N> = web::Data<OrderFlowApi<B, I, N>>;

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Buyer routes  ----------------------------------------------------
route!(products => Get "/products" impl EngineDatabase, InventoryStore, Notifier);
/// The catalog, with prices and the last known stock counts.
pub async fn products<B, I, N>(api: FlowApi<B, I, N>) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    trace!("💻️ Received products request");
    let products = api.catalog().products().await?;
    Ok(HttpResponse::Ok().json(products))
}

route!(create_order => Post "/orders" impl EngineDatabase, InventoryStore, Notifier);
/// Creates a new order for a buyer session. The product's current price is captured in the order.
///
/// ## Returns
/// The new order, with status `Created`.
pub async fn create_order<B, I, N>(
    body: web::Json<NewOrderRequest>,
    api: FlowApi<B, I, N>,
) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    let NewOrderRequest { product, quantity, session_id, display_name } = body.into_inner();
    debug!("💻️ New order request from session {session_id}: {quantity} x {product}");
    let order = api.create_order(&product, quantity, BuyerInfo::new(session_id, display_name)).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_by_code => Get "/orders/{order_code}" impl EngineDatabase, InventoryStore, Notifier);
pub async fn order_by_code<B, I, N>(
    path: web::Path<String>,
    api: FlowApi<B, I, N>,
) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    let code = OrderCode::from(path.into_inner());
    trace!("💻️ Fetching order {code}");
    let order = api.fetch_order(&code).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(request_payment => Post "/orders/{order_code}/payment" impl EngineDatabase, InventoryStore, Notifier);
/// Issues the order's unique payment amount, along with the instructions to show the buyer.
///
/// Calling this again for the same order returns the same amount.
pub async fn request_payment<B, I, N>(
    path: web::Path<String>,
    api: FlowApi<B, I, N>,
) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    let code = OrderCode::from(path.into_inner());
    debug!("💻️ Payment request for order {code}");
    let request = api.request_payment(&code).await?;
    Ok(HttpResponse::Ok().json(request))
}

route!(submit_confirmation => Post "/orders/{order_code}/confirmation" impl EngineDatabase, InventoryStore, Notifier);
/// Records the buyer's claim that they have paid. The order only completes once the payment has been sighted.
pub async fn submit_confirmation<B, I, N>(
    path: web::Path<String>,
    body: web::Json<ConfirmationParams>,
    api: FlowApi<B, I, N>,
) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    let code = OrderCode::from(path.into_inner());
    debug!("💻️ Payment confirmation for order {code}");
    let result = api.submit_confirmation(&code, &body.reference).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(cancel_order => Post "/orders/{order_code}/cancel" impl EngineDatabase, InventoryStore, Notifier);
pub async fn cancel_order<B, I, N>(
    path: web::Path<String>,
    body: Option<web::Json<ReasonParams>>,
    api: FlowApi<B, I, N>,
) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    let code = OrderCode::from(path.into_inner());
    let reason = body.map(|b| b.into_inner()).unwrap_or_default().reason_or("Cancelled by the buyer");
    info!("💻️ Cancel order request for {code}. Reason: {reason}");
    let order = api.cancel_order(&code, &reason).await.map_err(|e| {
        debug!("💻️ Could not cancel order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Operator routes  ----------------------------------------------------
route!(record_sighting => Post "/sightings" impl EngineDatabase, InventoryStore, Notifier);
/// Reports a payment that the operator saw arrive. A matching order is fulfilled immediately.
///
/// ## Returns
/// * 200 with the match result if the sighting was stored.
/// * 409 with the existing sighting if this amount had already been reported. Nothing is stored.
pub async fn record_sighting<B, I, N>(
    body: web::Json<SightingParams>,
    api: FlowApi<B, I, N>,
) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    let SightingParams { amount, observed_at } = body.into_inner();
    let observed_at = observed_at.unwrap_or_else(Utc::now);
    info!("💻️ Payment sighting reported: {amount} at {observed_at}");
    let result = api.record_sighting(amount, observed_at).await?;
    match &result {
        RecordSightingResult::Stored { result: outcome, .. } => {
            debug!("💻️ Sighting of {amount} stored. {}", outcome.name());
            Ok(HttpResponse::Ok().json(result))
        },
        RecordSightingResult::DuplicateRejected { existing } => {
            info!("💻️ Sighting of {amount} rejected. It was already reported at {}", existing.recorded_at);
            Ok(HttpResponse::Conflict().json(result))
        },
    }
}

route!(decline_order => Post "/orders/{order_code}/decline" impl EngineDatabase, InventoryStore, Notifier);
/// Cancels an unpaid order whose payment could not be found. The buyer is told.
pub async fn decline_order<B, I, N>(
    path: web::Path<String>,
    body: Option<web::Json<ReasonParams>>,
    api: FlowApi<B, I, N>,
) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    let code = OrderCode::from(path.into_inner());
    let reason = body.map(|b| b.into_inner()).unwrap_or_default().reason_or("No matching payment was received.");
    info!("💻️ Operator declined order {code}. Reason: {reason}");
    let order = api.decline_order(&code, &reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(approve_order => Post "/orders/{order_code}/approve" impl EngineDatabase, InventoryStore, Notifier);
/// Settles an order with a payment the engine could not attribute by itself, such as the bare base amount of a
/// degraded order. The payment is recorded as sighted if it has not been reported yet.
///
/// ## Returns
/// * 200 with the match result.
/// * 409 if the order is not waiting for payment, or the payment already settled another order.
pub async fn approve_order<B, I, N>(
    path: web::Path<String>,
    body: web::Json<ApprovalParams>,
    api: FlowApi<B, I, N>,
) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    let code = OrderCode::from(path.into_inner());
    let amount = body.into_inner().amount;
    info!("💻️ Operator approved order {code} with the payment of {amount}");
    let result = api.approve_order(&code, amount).await?;
    debug!("💻️ Approval of order {code}: {}", result.name());
    Ok(HttpResponse::Ok().json(result))
}

route!(orders_with_status => Get "/orders" impl EngineDatabase, InventoryStore, Notifier);
pub async fn orders_with_status<B, I, N>(
    query: web::Query<OrderStatusQuery>,
    api: FlowApi<B, I, N>,
) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    let orders = api.orders_with_status(query.status).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(expectations => Get "/expectations" impl EngineDatabase, InventoryStore, Notifier);
/// The payment amounts that were issued to buyers, by status. Defaults to those still waiting for payment.
pub async fn expectations<B, I, N>(
    query: web::Query<ExpectationStatusQuery>,
    api: FlowApi<B, I, N>,
) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    let expectations = api.pending_expectations(query.status).await?;
    Ok(HttpResponse::Ok().json(expectations))
}

route!(sightings => Get "/sightings" impl EngineDatabase, InventoryStore, Notifier);
/// Reported payments, by status. Defaults to those that no order has claimed.
pub async fn sightings<B, I, N>(
    query: web::Query<SightingStatusQuery>,
    api: FlowApi<B, I, N>,
) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    let sightings = api.sightings(query.status).await?;
    Ok(HttpResponse::Ok().json(sightings))
}

route!(upsert_product => Post "/products" impl EngineDatabase, InventoryStore, Notifier);
pub async fn upsert_product<B, I, N>(
    body: web::Json<ProductParams>,
    api: FlowApi<B, I, N>,
) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    let ProductParams { product, name, unit_price } = body.into_inner();
    info!("💻️ Product update for {product}");
    let product = api.catalog().upsert_product(NewProduct::new(product, name, unit_price)).await?;
    Ok(HttpResponse::Ok().json(product))
}

route!(update_price => Patch "/products/{category}/{variant}/price" impl EngineDatabase, InventoryStore, Notifier);
/// Changes a product's unit price. Orders that were already created keep the price they were created with.
pub async fn update_price<B, I, N>(
    path: web::Path<(String, String)>,
    body: web::Json<PriceParams>,
    api: FlowApi<B, I, N>,
) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    let (category, variant) = path.into_inner();
    let key = ProductKey::new(category, variant);
    info!("💻️ Price update for {key}: {}", body.unit_price);
    let product = api.catalog().set_price(&key, body.unit_price).await?;
    Ok(HttpResponse::Ok().json(product))
}

route!(add_stock => Post "/products/{category}/{variant}/stock" impl EngineDatabase, InventoryStore, Notifier);
/// Adds deliverable units of a product to the inventory.
pub async fn add_stock<B, I, N>(
    path: web::Path<(String, String)>,
    body: web::Json<StockParams>,
    api: FlowApi<B, I, N>,
) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    let (category, variant) = path.into_inner();
    let key = ProductKey::new(category, variant);
    let StockParams { payloads } = body.into_inner();
    info!("💻️ Adding {} units of {key}", payloads.len());
    let product = api.catalog().add_stock(&key, payloads).await?;
    Ok(HttpResponse::Ok().json(product))
}

route!(refresh_stock => Post "/stock/refresh" impl EngineDatabase, InventoryStore, Notifier);
/// Recounts the stock of every product.
pub async fn refresh_stock<B, I, N>(api: FlowApi<B, I, N>) -> Result<HttpResponse, ServerError>
where
    B: EngineDatabase,
    I: InventoryStore,
    N: Notifier,
{
    debug!("💻️ Stock refresh requested");
    let products = api.catalog().refresh_all().await?;
    let summary = products.iter().map(|p| format!("{}: {}", p.key, p.cached_stock)).collect::<Vec<_>>().join(", ");
    Ok(HttpResponse::Ok().json(JsonResponse::success(summary)))
}
