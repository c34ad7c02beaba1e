use std::fmt::Display;

use chrono::{DateTime, Utc};
use dgp_common::Amount;
use dgp_engine::db_types::{ExpectationStatus, OrderStatusType, ProductKey, SightingStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// A buyer's order, as submitted by the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub product: ProductKey,
    pub quantity: i64,
    pub session_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationParams {
    pub reference: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasonParams {
    #[serde(default)]
    pub reason: String,
}

impl ReasonParams {
    pub fn reason_or(&self, default: &str) -> String {
        if self.reason.trim().is_empty() {
            default.to_string()
        } else {
            self.reason.trim().to_string()
        }
    }
}

/// A payment the operator saw arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SightingParams {
    pub amount: Amount,
    /// When the payment was observed. Defaults to the time the report is received.
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
}

/// The payment the operator matched to an order by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalParams {
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductParams {
    pub product: ProductKey,
    pub name: String,
    pub unit_price: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceParams {
    pub unit_price: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockParams {
    pub payloads: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusQuery {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectationStatusQuery {
    #[serde(default = "pending")]
    pub status: ExpectationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SightingStatusQuery {
    #[serde(default = "unmatched")]
    pub status: SightingStatus,
}

fn pending() -> ExpectationStatus {
    ExpectationStatus::Pending
}

fn unmatched() -> SightingStatus {
    SightingStatus::Unmatched
}
