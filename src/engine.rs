//! Order lifecycle orchestration.
//!
//! The engine owns no state of its own: it coordinates the order store and
//! the account ledger transactionally per order, and is the single entry
//! point for both order creation and settlement callbacks.
//!
//! Flow per order:
//! 1. Register the order (store)
//! 2. Record the pending ledger entry (withdrawals reserve funds here)
//! 3. Submit to the payment gateway
//! 4. On callback: CAS the order terminal, apply the ledger step, drop the
//!    order from the active set
//!
//! Steps under 4 are each idempotent, so re-running a callback with the same
//! arguments after a crash between them completes the half-applied settlement
//! instead of double-applying it.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::account_ledger::{AccountLedger, LedgerOutcome};
use crate::gateway::{GatewayAck, GatewayOrderRequest, GatewayOrderStatus, PaymentGateway};
use crate::models::{
    CallbackOutcome, Currency, Order, OrderKind, OrderStatus, PaymentError,
};
use crate::order_store::OrderStore;
use crate::utils::new_order_id;

/// What the engine did with an authenticated callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackDisposition {
    /// Terminal transition performed (or a half-applied one completed).
    Applied,
    /// Non-terminal notification recorded (pending confirmation).
    Acknowledged,
    /// Unknown, duplicate or conflicting callback; no state change.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct DepositReceipt {
    pub order_id: String,
    pub gateway_tx_id: String,
    pub pay_url: Option<String>,
    pub fee: Decimal,
}

#[derive(Debug, Clone)]
pub struct WithdrawReceipt {
    pub order_id: String,
    pub gateway_tx_id: String,
    pub fee: Decimal,
    /// Balance after the reservation was taken.
    pub remaining_balance: Decimal,
}

pub struct OrderLifecycleEngine {
    orders: Arc<dyn OrderStore>,
    ledger: Arc<dyn AccountLedger>,
    gateway: Arc<dyn PaymentGateway>,
}

impl OrderLifecycleEngine {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        ledger: Arc<dyn AccountLedger>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self { orders, ledger, gateway }
    }

    /// Create a deposit order and obtain a pay link from the processor.
    ///
    /// The balance is never touched here: deposits only credit on a confirmed
    /// settlement callback. A gateway rejection leaves no balance effect and
    /// the order terminal and dropped.
    pub async fn start_deposit(
        &self,
        user_id: u64,
        amount: Decimal,
        currency: Currency,
    ) -> Result<DepositReceipt, PaymentError> {
        validate_amount(amount)?;

        let order_id = new_order_id("topup", user_id);
        self.orders.create(Order::new_deposit(order_id.clone(), user_id, amount, currency))?;

        if let Err(e) = self.ledger.record_pending_credit(
            user_id,
            &order_id,
            amount,
            &format!("topup {}", currency),
        ) {
            self.orders.remove(&order_id);
            return Err(e);
        }

        log::info!("deposit order created: {} user={} amount={} {}", order_id, user_id, amount, currency);

        let ack = match self.submit_to_gateway(&order_id, user_id, OrderKind::Deposit, amount, currency, None).await {
            Ok(ack) => ack,
            Err(e) => {
                self.abort_rejected_order(&order_id, user_id, &e);
                return Err(e);
            }
        };

        Ok(DepositReceipt {
            order_id,
            gateway_tx_id: ack.gateway_tx_id,
            pay_url: ack.pay_url,
            fee: ack.fee,
        })
    }

    /// Create a withdrawal order, reserving the funds before the gateway is
    /// called so the reservation survives a slow or retried gateway call. A
    /// rejection releases the reservation immediately.
    pub async fn start_withdraw(
        &self,
        user_id: u64,
        amount: Decimal,
        currency: Currency,
        counterparty_id: u64,
    ) -> Result<WithdrawReceipt, PaymentError> {
        validate_amount(amount)?;

        let order_id = new_order_id("withdraw", user_id);
        self.orders.create(Order::new_withdraw(
            order_id.clone(),
            user_id,
            amount,
            currency,
            counterparty_id,
        ))?;

        if let Err(e) = self.ledger.record_pending_debit(
            user_id,
            &order_id,
            amount,
            &format!("withdraw {} to {}", currency, counterparty_id),
        ) {
            self.orders.remove(&order_id);
            return Err(e);
        }

        log::info!(
            "withdraw order created: {} user={} amount={} {} -> {}",
            order_id, user_id, amount, currency, counterparty_id
        );

        let ack = match self
            .submit_to_gateway(&order_id, user_id, OrderKind::Withdraw, amount, currency, Some(counterparty_id))
            .await
        {
            Ok(ack) => ack,
            Err(e) => {
                self.abort_rejected_order(&order_id, user_id, &e);
                return Err(e);
            }
        };

        Ok(WithdrawReceipt {
            order_id,
            gateway_tx_id: ack.gateway_tx_id,
            fee: ack.fee,
            remaining_balance: self.ledger.balance(user_id),
        })
    }

    /// Reconciliation entry point for authenticated settlement callbacks.
    ///
    /// Idempotent: unknown orders, duplicates and conflicting outcomes are
    /// logged and ignored. A callback re-delivered after a crash between the
    /// order transition and the ledger transition completes the remaining
    /// step.
    pub fn on_settlement_callback(
        &self,
        order_id: &str,
        outcome: CallbackOutcome,
        amount: Decimal,
    ) -> Result<CallbackDisposition, PaymentError> {
        let order = match self.orders.get(order_id) {
            Some(order) => order,
            None => {
                log::warn!("callback for unknown order {}: ignoring", order_id);
                return Ok(CallbackDisposition::Ignored);
            }
        };

        if !amount.is_zero() && amount != order.amount {
            log::warn!(
                "callback amount {} differs from recorded {} for order {}; settling recorded amount",
                amount, order.amount, order_id
            );
        }

        match outcome {
            CallbackOutcome::PendingConfirm => match self.orders.mark_awaiting_confirmation(order_id) {
                Ok(()) => {
                    log::info!("order {} awaiting processor confirmation", order_id);
                    Ok(CallbackDisposition::Acknowledged)
                }
                Err(e) => {
                    log::warn!("pending-confirm callback for order {} ignored: {}", order_id, e);
                    Ok(CallbackDisposition::Ignored)
                }
            },
            CallbackOutcome::Success => self.finalize(&order, OrderStatus::Settled),
            CallbackOutcome::Fail => self.finalize(&order, OrderStatus::Failed),
        }
    }

    /// Query the processor's current view of a live order.
    pub async fn check_gateway_status(
        &self,
        order_id: &str,
    ) -> Result<GatewayOrderStatus, PaymentError> {
        let order = self
            .orders
            .get(order_id)
            .ok_or_else(|| PaymentError::OrderNotFound(order_id.to_string()))?;

        if order.gateway_tx_id.is_empty() {
            // The gateway never acknowledged this order; there is nothing to
            // look up on the processor side.
            return Err(PaymentError::TransactionNotFound(order_id.to_string()));
        }

        self.gateway.check_order(order.gateway_tx_id.clone(), order.kind).await
    }

    /// Apply one terminal transition: order CAS first, then the matching
    /// ledger step, then drop the order from the active set.
    fn finalize(
        &self,
        order: &Order,
        target: OrderStatus,
    ) -> Result<CallbackDisposition, PaymentError> {
        let order_id = order.order_id.as_str();

        let transition = match target {
            OrderStatus::Settled => self.orders.mark_settled(order_id, &order.gateway_tx_id),
            OrderStatus::Failed => self.orders.mark_failed(order_id),
            _ => return Err(PaymentError::Internal(format!("non-terminal target {}", target.as_str()))),
        };

        match transition {
            Ok(()) => {}
            Err(PaymentError::OrderNotPending { status, .. }) if status == target => {
                // Crash-recovery replay: the order transition already landed,
                // the ledger step may not have. Re-run it.
                log::warn!("order {} already {}, replaying ledger step", order_id, status.as_str());
            }
            Err(e) => {
                log::info!("duplicate callback for order {} ignored: {}", order_id, e);
                return Ok(CallbackDisposition::Ignored);
            }
        }

        let ledger_step = match target {
            OrderStatus::Settled => self.ledger.settle(order.user_id, order_id),
            _ => self.ledger.refund_and_fail(order.user_id, order_id),
        };

        match ledger_step {
            Ok(LedgerOutcome::Applied) => {
                self.orders.remove(order_id);
                log::info!(
                    "order {} finalized: {} user={} amount={}",
                    order_id, target.as_str(), order.user_id, order.amount
                );
                Ok(CallbackDisposition::Applied)
            }
            Ok(LedgerOutcome::AlreadyTerminal) => {
                // Both halves had already landed; this delivery changed nothing.
                self.orders.remove(order_id);
                log::info!("order {} already finalized, callback replay absorbed", order_id);
                Ok(CallbackDisposition::Ignored)
            }
            Err(PaymentError::TransactionNotFound(_)) => {
                // Order existed without a ledger entry: nothing to settle.
                log::error!("order {} has no ledger transaction; dropping", order_id);
                self.orders.remove(order_id);
                Ok(CallbackDisposition::Ignored)
            }
            Err(e) => {
                // Keep the order in the active set so a redelivered callback
                // retries the ledger step instead of stranding the funds.
                log::error!("ledger step failed for order {}: {}; awaiting callback retry", order_id, e);
                Err(e)
            }
        }
    }

    async fn submit_to_gateway(
        &self,
        order_id: &str,
        user_id: u64,
        kind: OrderKind,
        amount: Decimal,
        currency: Currency,
        counterparty_id: Option<u64>,
    ) -> Result<GatewayAck, PaymentError> {
        let ack = self
            .gateway
            .submit(GatewayOrderRequest {
                order_id: order_id.to_string(),
                user_id,
                kind,
                amount,
                currency,
                counterparty_id,
            })
            .await?;

        if let Err(e) = self.orders.set_gateway_tx(order_id, &ack.gateway_tx_id) {
            // A settlement callback can only race us after the gateway has
            // acknowledged; the tx id is then already carried by the callback
            // path, so losing this write is harmless.
            log::warn!("could not record gateway tx for order {}: {}", order_id, e);
        }
        Ok(ack)
    }

    /// Unwind an order whose gateway call failed: fail the ledger entry
    /// (refunding a withdrawal reservation), mark the order failed and drop
    /// it. No balance effect is ever applied for a rejected deposit.
    fn abort_rejected_order(&self, order_id: &str, user_id: u64, cause: &PaymentError) {
        log::warn!("aborting order {}: {}", order_id, cause);

        if let Err(e) = self.ledger.refund_and_fail(user_id, order_id) {
            log::error!("failed to release ledger entry for aborted order {}: {}", order_id, e);
        }
        if let Err(e) = self.orders.mark_failed(order_id) {
            log::error!("failed to mark aborted order {}: {}", order_id, e);
        }
        self.orders.remove(order_id);
    }
}

fn validate_amount(amount: Decimal) -> Result<(), PaymentError> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(format!("{} is not positive", amount)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Decimal::new(1, 2)).is_ok());
        assert!(validate_amount(Decimal::ZERO).is_err());
        assert!(validate_amount(Decimal::new(-5, 0)).is_err());
    }
}
