use std::{collections::HashMap, time::Duration};

use cucumber::World;
use dgp_engine::{
    db_types::{OrderCode, ProductKey},
    events::EventProducers,
    order_objects::{FlowConfig, MatchResult, PaymentRequest, RecordSightingResult},
    test_utils::{
        inventory::FlakyInventory,
        notifier::RecordingNotifier,
        prepare_env::{create_database, random_db_path, run_migrations},
    },
    OrderFlowApi,
    OrderFlowError,
    SqliteDatabase,
};
use log::*;

pub type ShopApi = OrderFlowApi<SqliteDatabase, FlakyInventory<SqliteDatabase>, RecordingNotifier>;

/// Collaborator calls in the scenarios give up quickly, so that hanging calls do not slow the suite down.
const SCENARIO_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Default, Debug, World)]
pub struct ShopWorld {
    pub system: Option<ShopSystem>,
    /// Buyer name -> the code of the buyer's most recent order
    pub orders: HashMap<String, OrderCode>,
    pub requests: HashMap<String, PaymentRequest>,
    pub last_result: Option<MatchResult>,
    pub last_sighting: Option<RecordSightingResult>,
    pub last_error: Option<OrderFlowError>,
}

#[derive(Debug)]
pub struct ShopSystem {
    pub db_path: String,
    pub api: ShopApi,
    pub inventory: FlakyInventory<SqliteDatabase>,
    pub notifier: RecordingNotifier,
}

impl ShopWorld {
    pub fn system(&self) -> &ShopSystem {
        self.system.as_ref().expect("Shop system not initialised")
    }

    pub fn api(&self) -> &ShopApi {
        &self.system().api
    }

    pub fn order_code(&self, buyer: &str) -> OrderCode {
        self.orders.get(buyer).cloned().unwrap_or_else(|| panic!("{buyer} has not placed an order"))
    }

    pub fn payment_request(&self, buyer: &str) -> &PaymentRequest {
        self.requests.get(buyer).unwrap_or_else(|| panic!("{buyer} has not requested payment"))
    }

    pub fn session_id(buyer: &str) -> String {
        format!("session-{buyer}")
    }

    pub fn unit_payload(key: &ProductKey, i: i64) -> String {
        format!("{key}-unit-{i}")
    }
}

impl ShopSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let inventory = FlakyInventory::new(db.clone());
        let notifier = RecordingNotifier::default();
        let config = FlowConfig { collaborator_timeout: SCENARIO_TIMEOUT, ..FlowConfig::default() };
        let api = OrderFlowApi::new(db, inventory.clone(), notifier.clone(), EventProducers::default(), config);
        Self { db_path: url, api, inventory, notifier }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
