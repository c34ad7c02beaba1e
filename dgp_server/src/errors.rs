use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use dgp_engine::{CatalogError, LedgerError, OrderFlowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with the current state. {0}")]
    Conflict(String),
    #[error("A service the server depends on is unavailable. {0}")]
    ServiceUnavailable(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::InvalidQuantity(_) |
            OrderFlowError::InvalidBuyer(_) |
            OrderFlowError::MalformedConfirmation(_) |
            OrderFlowError::InvalidSighting(_) => Self::InvalidRequestBody(e.to_string()),
            OrderFlowError::UnknownProduct(_) | OrderFlowError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderFlowError::IllegalTransition { .. } |
            OrderFlowError::InsufficientStock { .. } |
            OrderFlowError::AlreadyPaid(_) |
            OrderFlowError::PaymentAlreadyClaimed { .. } => Self::Conflict(e.to_string()),
            OrderFlowError::CollaboratorUnavailable(_) => Self::ServiceUnavailable(e.to_string()),
            OrderFlowError::Ledger(e) => e.into(),
        }
    }
}

impl From<CatalogError> for ServerError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::UnknownProduct(_) => Self::NoRecordFound(e.to_string()),
            CatalogError::InvalidPrice(_) | CatalogError::InvalidProduct(_) => Self::InvalidRequestBody(e.to_string()),
            CatalogError::InventoryUnavailable(_) => Self::ServiceUnavailable(e.to_string()),
            CatalogError::Ledger(e) => e.into(),
        }
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::DatabaseError(_) => Self::BackendError(e.to_string()),
            LedgerError::OrderNotFound(_) | LedgerError::ProductNotFound(_) | LedgerError::ExpectationNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            LedgerError::OrderAlreadyExists(_) |
            LedgerError::IllegalTransition { .. } |
            LedgerError::ExpectationClosed { .. } => Self::Conflict(e.to_string()),
        }
    }
}
