use dgp_common::Amount;
use thiserror::Error;

use crate::{
    db_types::{Fingerprint, OrderCode, OrderStatusType, ProductKey},
    traits::LedgerError,
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Quantity must be a positive whole number, but {0} was requested")]
    InvalidQuantity(i64),
    #[error("The product {0} does not exist")]
    UnknownProduct(ProductKey),
    #[error("Invalid buyer details. {0}")]
    InvalidBuyer(String),
    #[error("The payment confirmation is malformed. {0}")]
    MalformedConfirmation(String),
    #[error("The sighting amount is invalid. {0}")]
    InvalidSighting(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderCode),
    #[error("Order {order_code} is {status}, so it cannot {action}")]
    IllegalTransition { order_code: OrderCode, status: OrderStatusType, action: String },
    #[error("Only {available} units of {product} are in stock, but {requested} were requested")]
    InsufficientStock { product: ProductKey, requested: i64, available: i64 },
    #[error("Order {0} has already been paid for")]
    AlreadyPaid(OrderCode),
    #[error("The payment of {fingerprint} already settled order {owner}")]
    PaymentAlreadyClaimed { fingerprint: Fingerprint, owner: String },
    #[error("A collaborator is unavailable. {0}")]
    CollaboratorUnavailable(String),
    #[error("{0}")]
    Ledger(LedgerError),
}

impl OrderFlowError {
    pub fn illegal<S: Into<String>>(order_code: &OrderCode, status: OrderStatusType, action: S) -> Self {
        Self::IllegalTransition { order_code: order_code.clone(), status, action: action.into() }
    }
}

impl From<LedgerError> for OrderFlowError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::OrderNotFound(code) => Self::OrderNotFound(code),
            LedgerError::ProductNotFound(key) => Self::UnknownProduct(key),
            LedgerError::IllegalTransition { order_code, from, to } => {
                Self::IllegalTransition { order_code, status: from, action: format!("move to {to}") }
            },
            e => Self::Ledger(e),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("The product {0} does not exist")]
    UnknownProduct(ProductKey),
    #[error("Prices must be positive whole cents, but {0} was given")]
    InvalidPrice(Amount),
    #[error("Invalid product details. {0}")]
    InvalidProduct(String),
    #[error("The inventory is unavailable. {0}")]
    InventoryUnavailable(String),
    #[error("{0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for CatalogError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::ProductNotFound(key) => Self::UnknownProduct(key),
            e => Self::Ledger(e),
        }
    }
}
