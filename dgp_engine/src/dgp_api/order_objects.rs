use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    db_types::{DeliveryPayload, Fingerprint, Order, OrderCode, ReceivedSighting},
    traits::ManualReviewReason,
};

const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for the order flow that do not live in the database.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Upper bound for each inventory and notifier call.
    pub collaborator_timeout: Duration,
    /// Where buyers send their payment. Quoted in the payment instructions.
    pub payment_address: String,
    pub currency_label: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            collaborator_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
            payment_address: String::default(),
            currency_label: "USD".to_string(),
        }
    }
}

/// What a buyer needs in order to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order: Order,
    pub fingerprint: Fingerprint,
    pub reference_code: String,
    pub degraded: bool,
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result")]
pub enum MatchResult {
    /// No payment with this fingerprint has been sighted yet.
    AwaitingPayment,
    /// A payment was sighted, but no pending order carries its fingerprint. It stays on the books as unmatched.
    Unclaimed,
    AlreadyMatched { order_code: Option<OrderCode> },
    /// The sighting could not be attributed to one order. The operator has been alerted.
    Ambiguous { candidates: Vec<OrderCode> },
    Fulfilled { order: Order, payload: DeliveryPayload, delivered: bool },
    ManualIntervention { order: Order, reason: ManualReviewReason },
}

impl MatchResult {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitingPayment => "AwaitingPayment",
            Self::Unclaimed => "Unclaimed",
            Self::AlreadyMatched { .. } => "AlreadyMatched",
            Self::Ambiguous { .. } => "Ambiguous",
            Self::Fulfilled { .. } => "Fulfilled",
            Self::ManualIntervention { .. } => "ManualIntervention",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome")]
pub enum RecordSightingResult {
    Stored { sighting: ReceivedSighting, result: MatchResult },
    /// The fingerprint had already been sighted. The stored row is unchanged.
    DuplicateRejected { existing: ReceivedSighting },
}
