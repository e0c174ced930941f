// Error types for the payment order lifecycle
use std::fmt;

use rust_decimal::Decimal;

use crate::models::OrderStatus;

#[derive(Debug, Clone)]
pub enum PaymentError {
    // Validation errors
    InvalidAmount(String),
    UnknownCurrency(String),

    // Order errors
    DuplicateOrder(String),
    OrderNotFound(String),
    OrderNotPending { order_id: String, status: OrderStatus },

    // Ledger errors
    InsufficientBalance { available: Decimal, required: Decimal },
    TransactionNotFound(String),

    // Callback auth errors
    Unauthorized(String),
    InvalidSignature,
    MalformedPayload(String),

    // Gateway errors
    GatewayRejected(String),
    GatewayUnavailable(String),

    // Unexpected
    Internal(String),
}

impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),
            Self::UnknownCurrency(c) => write!(f, "Unknown currency: {}", c),
            Self::DuplicateOrder(id) => write!(f, "Order {} already exists", id),
            Self::OrderNotFound(id) => write!(f, "Order {} not found", id),
            Self::OrderNotPending { order_id, status } => {
                write!(f, "Order {} is not pending (status={})", order_id, status.as_str())
            }
            Self::InsufficientBalance { available, required } => {
                write!(f, "Insufficient balance: have {}, need {}", available, required)
            }
            Self::TransactionNotFound(id) => write!(f, "Transaction for order {} not found", id),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            Self::InvalidSignature => write!(f, "Invalid callback signature"),
            Self::MalformedPayload(msg) => write!(f, "Malformed payload: {}", msg),
            Self::GatewayRejected(msg) => write!(f, "Gateway rejected order: {}", msg),
            Self::GatewayUnavailable(msg) => write!(f, "Gateway unavailable: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for PaymentError {}

// Error code mapping for API responses
impl PaymentError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::UnknownCurrency(_) => "UNKNOWN_CURRENCY",
            Self::DuplicateOrder(_) => "DUPLICATE_ORDER",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::OrderNotPending { .. } => "ORDER_NOT_PENDING",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            Self::GatewayRejected(_) => "GATEWAY_REJECTED",
            Self::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Errors the caller may safely retry with the same arguments.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GatewayUnavailable(_) | Self::Internal(_))
    }

    /// Errors caused by the request itself rather than system state.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::UnknownCurrency(_)
                | Self::InsufficientBalance { .. }
                | Self::MalformedPayload(_)
        )
    }
}
