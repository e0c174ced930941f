use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::get_current_timestamp_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Topup,
    Withdraw,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Topup => "topup",
            Self::Withdraw => "withdraw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Success,
    Fail,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Fail => "fail",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Fail)
    }
}

/// One ledger entry. Immutable once appended, except for the single
/// pending -> terminal status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub order_id: String,
    pub tx_type: TxType,
    /// Signed: positive for credit, negative for debit.
    pub amount: Decimal,
    pub status: TxStatus,
    pub note: String,
    pub timestamp: i64,
}

impl Transaction {
    pub fn pending(order_id: String, tx_type: TxType, amount: Decimal, note: String) -> Self {
        Self {
            order_id,
            tx_type,
            amount,
            status: TxStatus::Pending,
            note,
            timestamp: get_current_timestamp_ms(),
        }
    }
}

/// Per-user balance plus the append-only transaction log. Insertion order of
/// `transactions` is chronological order; the balance must always be
/// reconcilable by replaying the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub user_id: u64,
    pub balance: Decimal,
    pub transactions: Vec<Transaction>,
    pub created_at: i64,
}

impl Account {
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            balance: Decimal::ZERO,
            transactions: Vec::new(),
            created_at: get_current_timestamp_ms(),
        }
    }

    pub fn find_tx_mut(&mut self, order_id: &str) -> Option<&mut Transaction> {
        self.transactions.iter_mut().find(|tx| tx.order_id == order_id)
    }

    pub fn has_tx(&self, order_id: &str) -> bool {
        self.transactions.iter().any(|tx| tx.order_id == order_id)
    }
}
