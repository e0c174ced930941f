//! Outbound client for the payment processor.
//!
//! The processor is a black box behind `PaymentGateway`: the engine hands it a
//! request and gets back an acknowledgement with the processor-assigned tx id,
//! or an error. The HTTP implementation signs the transport-encoded body and
//! bounds every call with the configured timeout.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::configure::AppConfig;
use crate::models::{Currency, OrderKind, PaymentError};
use crate::signature::SignatureCodec;

/// Identity and signature headers, shared with the callback receiver.
pub const HEADER_PAY_ID: &str = "X-Pay-Id";
pub const HEADER_PAY_SIGN: &str = "X-Pay-Sign";

const PAY_LINK_PATH: &str = "/merchant/payLink";
const WITHDRAW_ORDER_PATH: &str = "/merchant/createWithdrawOrder";
const CHECK_DEPOSIT_PATH: &str = "/merchant/checkDeposit";
// The check-withdraw endpoint lives under /api on the processor side.
const CHECK_WITHDRAW_PATH: &str = "/api/merchant/checkWithdraw";

/// Envelope code the processor uses for an accepted request.
const CODE_ACCEPTED: i64 = 1000;

#[derive(Debug, Clone)]
pub struct GatewayOrderRequest {
    pub order_id: String,
    pub user_id: u64,
    pub kind: OrderKind,
    pub amount: Decimal,
    pub currency: Currency,
    /// Recipient in the processor's system; withdrawals only.
    pub counterparty_id: Option<u64>,
}

/// Processor acknowledgement of an accepted order.
#[derive(Debug, Clone)]
pub struct GatewayAck {
    pub gateway_tx_id: String,
    /// Payment link for the end user; deposits only.
    pub pay_url: Option<String>,
    pub fee: Decimal,
}

/// Processor-side view of an order, as reported by its check endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayOrderStatus {
    pub gateway_tx_id: String,
    /// Raw status token as the processor spells it.
    pub state: String,
    pub amount: Option<Decimal>,
}

pub trait PaymentGateway: Send + Sync {
    fn submit(
        &self,
        req: GatewayOrderRequest,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayAck, PaymentError>> + Send>>;

    /// Query the processor's current view of an acknowledged order.
    fn check_order(
        &self,
        gateway_tx_id: String,
        kind: OrderKind,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayOrderStatus, PaymentError>> + Send>>;
}

// Wire shapes, spelled the way the processor spells them.

#[derive(Debug, Serialize)]
struct PayLinkWire {
    #[serde(rename = "userOrder")]
    user_order: String,
    amount: Decimal,
    coin: &'static str,
    name: String,
    return_url: String,
}

#[derive(Debug, Serialize)]
struct WithdrawOrderWire {
    #[serde(rename = "userOrder")]
    user_order: String,
    amount: Decimal,
    coin: &'static str,
    to_user_id: u64,
    name: String,
}

#[derive(Debug, Serialize)]
struct CheckOrderWire {
    txid: String,
}

#[derive(Debug, Deserialize)]
struct GatewayEnvelope {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<GatewayEnvelopeData>,
}

#[derive(Debug, Deserialize, Default)]
struct GatewayEnvelopeData {
    #[serde(default)]
    txid: Option<String>,
    #[serde(default)]
    pay_url: Option<String>,
    #[serde(default)]
    fee: Option<Decimal>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    amount: Option<Decimal>,
}

/// reqwest-backed gateway client.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    merchant_id: String,
    codec: SignatureCodec,
    return_url: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .build()
            .map_err(|e| PaymentError::Internal(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.gateway_base_url.trim_end_matches('/').to_string(),
            merchant_id: config.merchant_id.clone(),
            codec: SignatureCodec::new(config.merchant_secret.clone()),
            return_url: config.return_url.clone(),
        })
    }

    fn encode_request(&self, req: &GatewayOrderRequest) -> Result<(String, String), PaymentError> {
        let (path, body) = match req.kind {
            OrderKind::Deposit => {
                let wire = PayLinkWire {
                    user_order: req.order_id.clone(),
                    amount: req.amount,
                    coin: req.currency.as_str(),
                    name: format!("topup user {}", req.user_id),
                    return_url: self.return_url.clone(),
                };
                (PAY_LINK_PATH, self.codec.encode_body(&wire)?)
            }
            OrderKind::Withdraw => {
                let wire = WithdrawOrderWire {
                    user_order: req.order_id.clone(),
                    amount: req.amount,
                    coin: req.currency.as_str(),
                    to_user_id: req.counterparty_id.unwrap_or(0),
                    name: format!("withdraw user {}", req.user_id),
                };
                (WITHDRAW_ORDER_PATH, self.codec.encode_body(&wire)?)
            }
        };
        Ok((format!("{}{}", self.base_url, path), body))
    }
}

/// POST a signed transport-encoded body and unwrap the processor envelope.
async fn post_signed(
    client: reqwest::Client,
    url: String,
    body: String,
    merchant_id: String,
    codec: SignatureCodec,
) -> Result<GatewayEnvelopeData, PaymentError> {
    let sign = codec.sign(body.as_bytes());

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header(HEADER_PAY_ID, merchant_id)
        .header(HEADER_PAY_SIGN, sign)
        .body(body)
        .send()
        .await
        .map_err(|e| PaymentError::GatewayUnavailable(e.to_string()))?;

    let text = response
        .text()
        .await
        .map_err(|e| PaymentError::GatewayUnavailable(e.to_string()))?;

    let envelope: GatewayEnvelope = serde_json::from_str(&text).map_err(|e| {
        log::error!("gateway response not parseable: {} ({})", text, e);
        PaymentError::GatewayUnavailable("invalid response format".to_string())
    })?;

    if envelope.code != CODE_ACCEPTED {
        let msg = envelope.message.unwrap_or_else(|| format!("code {}", envelope.code));
        return Err(PaymentError::GatewayRejected(msg));
    }

    Ok(envelope.data.unwrap_or_default())
}

impl PaymentGateway for HttpPaymentGateway {
    fn submit(
        &self,
        req: GatewayOrderRequest,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayAck, PaymentError>> + Send>> {
        let encoded = self.encode_request(&req);
        let client = self.client.clone();
        let merchant_id = self.merchant_id.clone();
        let codec = self.codec.clone();

        Box::pin(async move {
            let (url, body) = encoded?;
            log::info!(
                "gateway request: order={} kind={} url={}",
                req.order_id,
                req.kind.as_str(),
                url
            );

            let data = post_signed(client, url, body, merchant_id, codec).await?;
            Ok(GatewayAck {
                gateway_tx_id: data.txid.unwrap_or_default(),
                pay_url: data.pay_url,
                fee: data.fee.unwrap_or(Decimal::ZERO),
            })
        })
    }

    fn check_order(
        &self,
        gateway_tx_id: String,
        kind: OrderKind,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayOrderStatus, PaymentError>> + Send>> {
        let path = match kind {
            OrderKind::Deposit => CHECK_DEPOSIT_PATH,
            OrderKind::Withdraw => CHECK_WITHDRAW_PATH,
        };
        let url = format!("{}{}", self.base_url, path);
        let encoded = self.codec.encode_body(&CheckOrderWire { txid: gateway_tx_id.clone() });
        let client = self.client.clone();
        let merchant_id = self.merchant_id.clone();
        let codec = self.codec.clone();

        Box::pin(async move {
            let body = encoded?;
            let data = post_signed(client, url, body, merchant_id, codec).await?;
            Ok(GatewayOrderStatus {
                gateway_tx_id: data.txid.unwrap_or(gateway_tx_id),
                state: data.status.unwrap_or_default(),
                amount: data.amount,
            })
        })
    }
}
