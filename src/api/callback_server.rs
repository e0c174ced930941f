//! Inbound HTTP surface: the processor callback endpoint, a liveness probe,
//! and read-side account/order queries.
//!
//! Callback authentication happens strictly before decoding: sender identity
//! first, then the signature over the raw body, then the transport decode.
//! Nothing mutates state until all three pass.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::account_ledger::AccountLedger;
use crate::engine::OrderLifecycleEngine;
use crate::gateway::{GatewayOrderStatus, HEADER_PAY_ID, HEADER_PAY_SIGN};
use crate::models::{
    ApiResponse, CallbackCategory, CallbackOutcome, GatewayCallback, Order, PaymentError,
    Transaction,
};
use crate::order_store::OrderStore;
use crate::signature::SignatureCodec;

pub struct AppState {
    pub engine: Arc<OrderLifecycleEngine>,
    pub orders: Arc<dyn OrderStore>,
    pub ledger: Arc<dyn AccountLedger>,
    pub codec: SignatureCodec,
    pub merchant_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CallbackResponse {
    fn success() -> Self {
        Self { status: "success".to_string(), message: None }
    }

    fn error(message: impl Into<String>) -> Self {
        Self { status: "error".to_string(), message: Some(message.into()) }
    }
}

#[derive(Debug, Deserialize)]
struct UserIdParams {
    user_id: u64,
}

#[derive(Debug, Serialize)]
pub struct BalanceView {
    pub user_id: u64,
    pub balance: rust_decimal::Decimal,
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/gateway/callback", post(gateway_callback))
        .route("/health", get(health))
        .route("/api/user/balance", get(get_balance))
        .route("/api/user/transactions", get(get_transactions))
        .route("/api/orders/pending", get(get_pending_orders))
        .route("/api/orders/:order_id", get(get_order))
        .route("/api/orders/:order_id/gateway", get(get_gateway_status))
        .layer(Extension(state))
        .layer(CorsLayer::permissive())
}

async fn gateway_callback(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<CallbackResponse>) {
    // 1. Sender identity
    let sender = headers.get(HEADER_PAY_ID).and_then(|h| h.to_str().ok());
    if sender != Some(state.merchant_id.as_str()) {
        log::warn!("callback with invalid sender id: {:?}", sender);
        return (
            StatusCode::UNAUTHORIZED,
            Json(CallbackResponse::error("Invalid merchant ID")),
        );
    }

    // 2. Signature over the raw body, before any decoding
    let signature = headers
        .get(HEADER_PAY_SIGN)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    if !state.codec.verify(body.as_bytes(), signature) {
        log::warn!("callback with invalid signature");
        return (
            StatusCode::UNAUTHORIZED,
            Json(CallbackResponse::error("Invalid signature")),
        );
    }

    // 3. Transport decode
    let callback: GatewayCallback = match state.codec.decode_body(&body) {
        Ok(cb) => cb,
        Err(e) => {
            log::error!("failed to decode callback body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(CallbackResponse::error("Invalid data format")),
            );
        }
    };

    log::info!(
        "received callback: type={} order={}",
        callback.business_type, callback.user_order
    );

    // Unknown categories are acknowledged without effect (forward compatible)
    let category = match callback.category() {
        Some(c) => c,
        None => {
            log::warn!("unknown callback category: {}", callback.business_type);
            return (StatusCode::OK, Json(CallbackResponse::success()));
        }
    };

    let outcome = match category {
        CallbackCategory::WithdrawPendingConfirm => CallbackOutcome::PendingConfirm,
        CallbackCategory::Deposit | CallbackCategory::Withdraw => callback.outcome(),
    };

    match state
        .engine
        .on_settlement_callback(&callback.user_order, outcome, callback.amount)
    {
        Ok(disposition) => {
            log::info!("callback for order {} handled: {:?}", callback.user_order, disposition);
            (StatusCode::OK, Json(CallbackResponse::success()))
        }
        Err(e) => {
            log::error!("callback handling failed for order {}: {}", callback.user_order, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CallbackResponse::error(e.to_string())),
            )
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn get_balance(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<UserIdParams>,
) -> Json<ApiResponse<BalanceView>> {
    let balance = state.ledger.balance(params.user_id);
    Json(ApiResponse::success(BalanceView { user_id: params.user_id, balance }))
}

async fn get_transactions(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<UserIdParams>,
) -> Json<ApiResponse<Vec<Transaction>>> {
    Json(ApiResponse::success(state.ledger.transactions(params.user_id)))
}

async fn get_pending_orders(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<ApiResponse<Vec<Order>>> {
    Json(ApiResponse::success(state.orders.pending_orders()))
}

async fn get_order(
    Extension(state): Extension<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> (StatusCode, Json<ApiResponse<Order>>) {
    match state.orders.get(&order_id) {
        Some(order) => (StatusCode::OK, Json(ApiResponse::success(order))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(&PaymentError::OrderNotFound(order_id))),
        ),
    }
}

/// Proxy the processor's own view of a live order (reconciliation aid).
async fn get_gateway_status(
    Extension(state): Extension<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> (StatusCode, Json<ApiResponse<GatewayOrderStatus>>) {
    match state.engine.check_gateway_status(&order_id).await {
        Ok(status) => (StatusCode::OK, Json(ApiResponse::success(status))),
        Err(e) => {
            let http_status = match &e {
                PaymentError::OrderNotFound(_) | PaymentError::TransactionNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                PaymentError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (http_status, Json(ApiResponse::error(&e)))
        }
    }
}
