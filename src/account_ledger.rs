//! Per-user balances and the append-only transaction log.
//!
//! Every balance mutation happens inside the owning account's mutex, paired
//! with exactly one transaction status change, so the balance is always
//! reconcilable by replaying the log. Withdrawals reserve funds at creation
//! time (optimistic debit); deposits only credit on confirmed settlement.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use rust_decimal::Decimal;

use crate::models::{Account, PaymentError, Transaction, TxStatus, TxType};

/// Outcome of an idempotent ledger transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// The pending transaction was transitioned and any balance effect applied.
    Applied,
    /// The transaction was already terminal; nothing changed.
    AlreadyTerminal,
}

pub trait AccountLedger: Send + Sync {
    /// Lazily materialize a zero-balance account on first access.
    fn get_or_create(&self, user_id: u64) -> Account;

    /// Append `Transaction(pending, -amount)` and decrement the balance in the
    /// same critical section. Reserves withdrawal funds before the gateway
    /// confirms, so two concurrent withdrawals cannot both pass the balance
    /// check. `InsufficientBalance` if `amount > balance`.
    fn record_pending_debit(
        &self,
        user_id: u64,
        order_id: &str,
        amount: Decimal,
        note: &str,
    ) -> Result<(), PaymentError>;

    /// Append `Transaction(pending, +amount)` with no balance change; deposits
    /// only credit on confirmed settlement.
    fn record_pending_credit(
        &self,
        user_id: u64,
        order_id: &str,
        amount: Decimal,
        note: &str,
    ) -> Result<(), PaymentError>;

    /// Pending topup: credit the balance and set success. Pending withdraw:
    /// set success only (balance already reserved at creation). Already
    /// terminal is a no-op, so replaying a settlement callback is safe.
    fn settle(&self, user_id: u64, order_id: &str) -> Result<LedgerOutcome, PaymentError>;

    /// Pending withdraw: restore the reserved amount and set fail. Pending
    /// topup: set fail with no balance effect. Already terminal is a no-op.
    fn refund_and_fail(&self, user_id: u64, order_id: &str) -> Result<LedgerOutcome, PaymentError>;

    fn balance(&self, user_id: u64) -> Decimal;

    fn transactions(&self, user_id: u64) -> Vec<Transaction>;
}

/// In-memory ledger: user id -> account, each account behind its own mutex so
/// check-then-act on the balance is atomic per user without serializing
/// unrelated users.
pub struct MemoryAccountLedger {
    accounts: RwLock<HashMap<u64, Arc<Mutex<Account>>>>,
}

impl MemoryAccountLedger {
    pub fn new() -> Self {
        Self { accounts: RwLock::new(HashMap::new()) }
    }

    fn slot(&self, user_id: u64) -> Arc<Mutex<Account>> {
        if let Some(slot) = self.accounts.read().expect("account map poisoned").get(&user_id) {
            return slot.clone();
        }
        let mut accounts = self.accounts.write().expect("account map poisoned");
        accounts
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(Account::new(user_id))))
            .clone()
    }

    fn with_account<T>(
        &self,
        user_id: u64,
        f: impl FnOnce(&mut Account) -> Result<T, PaymentError>,
    ) -> Result<T, PaymentError> {
        let slot = self.slot(user_id);
        let mut account = slot.lock().expect("account lock poisoned");
        f(&mut account)
    }

    /// Shared pending -> terminal transition. Balance effects apply only when
    /// the transaction actually leaves Pending.
    fn finalize_tx(
        account: &mut Account,
        order_id: &str,
        target: TxStatus,
        credit_if_topup: bool,
        refund_if_withdraw: bool,
    ) -> Result<LedgerOutcome, PaymentError> {
        let tx = account
            .find_tx_mut(order_id)
            .ok_or_else(|| PaymentError::TransactionNotFound(order_id.to_string()))?;

        if tx.status.is_terminal() {
            if tx.status != target {
                log::warn!(
                    "ledger: order {} already {} while applying {}, keeping first outcome",
                    order_id,
                    tx.status.as_str(),
                    target.as_str()
                );
            }
            return Ok(LedgerOutcome::AlreadyTerminal);
        }

        tx.status = target;
        let tx_type = tx.tx_type;
        let amount = tx.amount;

        match tx_type {
            TxType::Topup if credit_if_topup => account.balance += amount,
            TxType::Withdraw if refund_if_withdraw => account.balance += amount.abs(),
            _ => {}
        }
        Ok(LedgerOutcome::Applied)
    }
}

impl Default for MemoryAccountLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountLedger for MemoryAccountLedger {
    fn get_or_create(&self, user_id: u64) -> Account {
        let slot = self.slot(user_id);
        let account = slot.lock().expect("account lock poisoned");
        account.clone()
    }

    fn record_pending_debit(
        &self,
        user_id: u64,
        order_id: &str,
        amount: Decimal,
        note: &str,
    ) -> Result<(), PaymentError> {
        self.with_account(user_id, |account| {
            if account.has_tx(order_id) {
                return Err(PaymentError::DuplicateOrder(order_id.to_string()));
            }
            if amount > account.balance {
                return Err(PaymentError::InsufficientBalance {
                    available: account.balance,
                    required: amount,
                });
            }
            account.transactions.push(Transaction::pending(
                order_id.to_string(),
                TxType::Withdraw,
                -amount,
                note.to_string(),
            ));
            account.balance -= amount;
            Ok(())
        })
    }

    fn record_pending_credit(
        &self,
        user_id: u64,
        order_id: &str,
        amount: Decimal,
        note: &str,
    ) -> Result<(), PaymentError> {
        self.with_account(user_id, |account| {
            if account.has_tx(order_id) {
                return Err(PaymentError::DuplicateOrder(order_id.to_string()));
            }
            account.transactions.push(Transaction::pending(
                order_id.to_string(),
                TxType::Topup,
                amount,
                note.to_string(),
            ));
            Ok(())
        })
    }

    fn settle(&self, user_id: u64, order_id: &str) -> Result<LedgerOutcome, PaymentError> {
        self.with_account(user_id, |account| {
            Self::finalize_tx(account, order_id, TxStatus::Success, true, false)
        })
    }

    fn refund_and_fail(&self, user_id: u64, order_id: &str) -> Result<LedgerOutcome, PaymentError> {
        self.with_account(user_id, |account| {
            Self::finalize_tx(account, order_id, TxStatus::Fail, false, true)
        })
    }

    fn balance(&self, user_id: u64) -> Decimal {
        self.get_or_create(user_id).balance
    }

    fn transactions(&self, user_id: u64) -> Vec<Transaction> {
        self.get_or_create(user_id).transactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn test_deposit_credits_only_on_settle() {
        let ledger = MemoryAccountLedger::new();
        ledger.record_pending_credit(1, "topup_1_a", dec(100), "topup USDT").unwrap();

        // No speculative credit
        assert_eq!(ledger.balance(1), dec(0));

        assert_eq!(ledger.settle(1, "topup_1_a").unwrap(), LedgerOutcome::Applied);
        assert_eq!(ledger.balance(1), dec(100));

        // Replay is a no-op
        assert_eq!(ledger.settle(1, "topup_1_a").unwrap(), LedgerOutcome::AlreadyTerminal);
        assert_eq!(ledger.balance(1), dec(100));
    }

    #[test]
    fn test_withdraw_reserves_and_refunds_exactly() {
        let ledger = MemoryAccountLedger::new();
        ledger.record_pending_credit(1, "topup_1_a", dec(50), "topup").unwrap();
        ledger.settle(1, "topup_1_a").unwrap();

        ledger.record_pending_debit(1, "withdraw_1_b", dec(30), "withdraw").unwrap();
        assert_eq!(ledger.balance(1), dec(20));

        assert_eq!(ledger.refund_and_fail(1, "withdraw_1_b").unwrap(), LedgerOutcome::Applied);
        assert_eq!(ledger.balance(1), dec(50));

        // Duplicate fail callback refunds nothing further
        assert_eq!(
            ledger.refund_and_fail(1, "withdraw_1_b").unwrap(),
            LedgerOutcome::AlreadyTerminal
        );
        assert_eq!(ledger.balance(1), dec(50));
    }

    #[test]
    fn test_withdraw_settle_spends_reservation() {
        let ledger = MemoryAccountLedger::new();
        ledger.record_pending_credit(1, "topup_1_a", dec(50), "topup").unwrap();
        ledger.settle(1, "topup_1_a").unwrap();
        ledger.record_pending_debit(1, "withdraw_1_b", dec(30), "withdraw").unwrap();

        assert_eq!(ledger.settle(1, "withdraw_1_b").unwrap(), LedgerOutcome::Applied);
        // Balance was already decremented at reservation time
        assert_eq!(ledger.balance(1), dec(20));

        let tx = ledger
            .transactions(1)
            .into_iter()
            .find(|tx| tx.order_id == "withdraw_1_b")
            .unwrap();
        assert_eq!(tx.status, TxStatus::Success);
    }

    #[test]
    fn test_insufficient_balance() {
        let ledger = MemoryAccountLedger::new();
        let err = ledger.record_pending_debit(1, "withdraw_1_a", dec(10), "withdraw").unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_BALANCE");
        assert_eq!(ledger.balance(1), dec(0));
        assert!(ledger.transactions(1).is_empty());
    }

    #[test]
    fn test_one_transaction_per_order_id() {
        let ledger = MemoryAccountLedger::new();
        ledger.record_pending_credit(1, "topup_1_a", dec(10), "topup").unwrap();
        let err = ledger.record_pending_credit(1, "topup_1_a", dec(10), "topup").unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_ORDER");
    }

    #[test]
    fn test_settle_unknown_order() {
        let ledger = MemoryAccountLedger::new();
        let err = ledger.settle(1, "topup_1_missing").unwrap_err();
        assert_eq!(err.error_code(), "TRANSACTION_NOT_FOUND");
    }

    #[test]
    fn test_concurrent_withdrawals_cannot_overdraw() {
        let ledger = Arc::new(MemoryAccountLedger::new());
        ledger.record_pending_credit(1, "topup_1_a", dec(100), "topup").unwrap();
        ledger.settle(1, "topup_1_a").unwrap();

        // 8 concurrent withdrawals of 60 against a balance of 100: at most
        // one reservation can succeed.
        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = ledger.clone();
            handles.push(std::thread::spawn(move || {
                ledger
                    .record_pending_debit(1, &format!("withdraw_1_{}", i), dec(60), "withdraw")
                    .is_ok()
            }));
        }

        let wins = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(wins, 1);
        assert_eq!(ledger.balance(1), dec(40));
    }

    #[test]
    fn test_conflicting_outcome_keeps_first() {
        let ledger = MemoryAccountLedger::new();
        ledger.record_pending_credit(1, "topup_1_a", dec(100), "topup").unwrap();
        ledger.settle(1, "topup_1_a").unwrap();

        // A later fail callback for the same order must not claw back funds.
        assert_eq!(
            ledger.refund_and_fail(1, "topup_1_a").unwrap(),
            LedgerOutcome::AlreadyTerminal
        );
        assert_eq!(ledger.balance(1), dec(100));
    }
}
