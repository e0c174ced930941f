use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::get_current_timestamp_ms;

/// Direction of an order: money in or money out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Deposit,
    Withdraw,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
        }
    }
}

/// States of the order lifecycle.
///
/// `AwaitingConfirmation` covers the processor's "withdrawal pending
/// confirmation" notification: the order is still live, but the processor has
/// flagged it for review on its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    AwaitingConfirmation,
    Settled,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Settled => "settled",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "awaiting_confirmation" => Some(Self::AwaitingConfirmation),
            "settled" => Some(Self::Settled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Failed)
    }
}

/// One in-flight payment or withdrawal, tracked from creation to settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub user_id: u64,
    pub kind: OrderKind,
    pub amount: Decimal,
    pub currency: Currency,
    /// Recipient in the processor's system. Withdrawals only.
    pub counterparty_id: Option<u64>,
    pub status: OrderStatus,
    /// Assigned once the gateway acknowledges the request; empty until then.
    pub gateway_tx_id: String,
    pub created_at: i64,
}

impl Order {
    pub fn new_deposit(order_id: String, user_id: u64, amount: Decimal, currency: Currency) -> Self {
        Self {
            order_id,
            user_id,
            kind: OrderKind::Deposit,
            amount,
            currency,
            counterparty_id: None,
            status: OrderStatus::Pending,
            gateway_tx_id: String::new(),
            created_at: get_current_timestamp_ms(),
        }
    }

    pub fn new_withdraw(
        order_id: String,
        user_id: u64,
        amount: Decimal,
        currency: Currency,
        counterparty_id: u64,
    ) -> Self {
        Self {
            order_id,
            user_id,
            kind: OrderKind::Withdraw,
            amount,
            currency,
            counterparty_id: Some(counterparty_id),
            status: OrderStatus::Pending,
            gateway_tx_id: String::new(),
            created_at: get_current_timestamp_ms(),
        }
    }
}

/// The fixed set of currency tokens the processor settles in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Cny,
    Usdt,
    Trx,
    Kkcoin,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cny => "CNY",
            Self::Usdt => "USDT",
            Self::Trx => "TRX",
            Self::Kkcoin => "KKCOIN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CNY" => Some(Self::Cny),
            "USDT" => Some(Self::Usdt),
            "TRX" => Some(Self::Trx),
            "KKCOIN" => Some(Self::Kkcoin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
