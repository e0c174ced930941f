//! Authoritative record of in-flight orders.
//!
//! The store is the serialization point for per-order state transitions:
//! every terminal transition is a compare-and-set guarded by an order-scoped
//! mutex, so duplicate callback delivery can settle an order at most once and
//! unrelated orders never contend on one lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::models::{Order, OrderKind, OrderStatus, PaymentError};

pub trait OrderStore: Send + Sync {
    /// Insert a fresh Pending order. `DuplicateOrder` if the id exists.
    fn create(&self, order: Order) -> Result<(), PaymentError>;

    /// Snapshot lookup, no side effects.
    fn get(&self, order_id: &str) -> Option<Order>;

    /// Record the processor-assigned tx id on a still-live order.
    fn set_gateway_tx(&self, order_id: &str, gateway_tx_id: &str) -> Result<(), PaymentError>;

    /// CAS `Pending -> AwaitingConfirmation`. Withdrawals only.
    fn mark_awaiting_confirmation(&self, order_id: &str) -> Result<(), PaymentError>;

    /// CAS to `Settled`. Exactly one of `mark_settled`/`mark_failed` can
    /// succeed per order; the loser sees `OrderNotPending` with the current
    /// status.
    fn mark_settled(&self, order_id: &str, gateway_tx_id: &str) -> Result<(), PaymentError>;

    /// CAS to `Failed`.
    fn mark_failed(&self, order_id: &str) -> Result<(), PaymentError>;

    /// Drop a terminal order from the active set. History stays in the
    /// account ledger, not here.
    fn remove(&self, order_id: &str) -> Option<Order>;

    /// Snapshot of all non-terminal orders.
    fn pending_orders(&self) -> Vec<Order>;
}

/// In-memory store: an id -> order map where each order carries its own lock.
/// The outer RwLock only guards map membership (create/remove).
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<String, Arc<Mutex<Order>>>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self { orders: RwLock::new(HashMap::new()) }
    }

    fn slot(&self, order_id: &str) -> Option<Arc<Mutex<Order>>> {
        self.orders.read().expect("order map poisoned").get(order_id).cloned()
    }

    /// Run a closure under the order's own lock. `OrderNotFound` if the id is
    /// not in the active set.
    fn with_order<T>(
        &self,
        order_id: &str,
        f: impl FnOnce(&mut Order) -> Result<T, PaymentError>,
    ) -> Result<T, PaymentError> {
        let slot = self
            .slot(order_id)
            .ok_or_else(|| PaymentError::OrderNotFound(order_id.to_string()))?;
        let mut order = slot.lock().expect("order lock poisoned");
        f(&mut order)
    }

    fn mark_terminal(
        &self,
        order_id: &str,
        target: OrderStatus,
        gateway_tx_id: Option<&str>,
    ) -> Result<(), PaymentError> {
        self.with_order(order_id, |order| {
            match order.status {
                OrderStatus::Pending | OrderStatus::AwaitingConfirmation => {
                    order.status = target;
                    if let Some(tx) = gateway_tx_id {
                        if !tx.is_empty() {
                            order.gateway_tx_id = tx.to_string();
                        }
                    }
                    Ok(())
                }
                current => Err(PaymentError::OrderNotPending {
                    order_id: order.order_id.clone(),
                    status: current,
                }),
            }
        })
    }
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderStore for MemoryOrderStore {
    fn create(&self, order: Order) -> Result<(), PaymentError> {
        let mut orders = self.orders.write().expect("order map poisoned");
        if orders.contains_key(&order.order_id) {
            return Err(PaymentError::DuplicateOrder(order.order_id));
        }
        orders.insert(order.order_id.clone(), Arc::new(Mutex::new(order)));
        Ok(())
    }

    fn get(&self, order_id: &str) -> Option<Order> {
        self.slot(order_id).map(|slot| slot.lock().expect("order lock poisoned").clone())
    }

    fn set_gateway_tx(&self, order_id: &str, gateway_tx_id: &str) -> Result<(), PaymentError> {
        self.with_order(order_id, |order| {
            if order.status.is_terminal() {
                return Err(PaymentError::OrderNotPending {
                    order_id: order.order_id.clone(),
                    status: order.status,
                });
            }
            order.gateway_tx_id = gateway_tx_id.to_string();
            Ok(())
        })
    }

    fn mark_awaiting_confirmation(&self, order_id: &str) -> Result<(), PaymentError> {
        self.with_order(order_id, |order| match (order.kind, order.status) {
            (OrderKind::Withdraw, OrderStatus::Pending) => {
                order.status = OrderStatus::AwaitingConfirmation;
                Ok(())
            }
            (_, current) => Err(PaymentError::OrderNotPending {
                order_id: order.order_id.clone(),
                status: current,
            }),
        })
    }

    fn mark_settled(&self, order_id: &str, gateway_tx_id: &str) -> Result<(), PaymentError> {
        self.mark_terminal(order_id, OrderStatus::Settled, Some(gateway_tx_id))
    }

    fn mark_failed(&self, order_id: &str) -> Result<(), PaymentError> {
        self.mark_terminal(order_id, OrderStatus::Failed, None)
    }

    fn remove(&self, order_id: &str) -> Option<Order> {
        let slot = self.orders.write().expect("order map poisoned").remove(order_id)?;
        let order = slot.lock().expect("order lock poisoned").clone();
        Some(order)
    }

    fn pending_orders(&self) -> Vec<Order> {
        let orders = self.orders.read().expect("order map poisoned");
        orders
            .values()
            .map(|slot| slot.lock().expect("order lock poisoned").clone())
            .filter(|order| !order.status.is_terminal())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Currency;
    use rust_decimal::Decimal;

    fn deposit_order(id: &str) -> Order {
        Order::new_deposit(id.to_string(), 1, Decimal::new(100, 0), Currency::Usdt)
    }

    #[test]
    fn test_create_duplicate_rejected() {
        let store = MemoryOrderStore::new();
        store.create(deposit_order("topup_1_a")).unwrap();

        let err = store.create(deposit_order("topup_1_a")).unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_ORDER");
    }

    #[test]
    fn test_unknown_order_is_not_found() {
        let store = MemoryOrderStore::new();

        let err = store.mark_settled("topup_9_missing", "T1").unwrap_err();
        assert_eq!(err.error_code(), "ORDER_NOT_FOUND");
        let err = store.mark_failed("topup_9_missing").unwrap_err();
        assert_eq!(err.error_code(), "ORDER_NOT_FOUND");
        let err = store.set_gateway_tx("topup_9_missing", "T1").unwrap_err();
        assert_eq!(err.error_code(), "ORDER_NOT_FOUND");
    }

    #[test]
    fn test_settle_then_fail_rejected() {
        let store = MemoryOrderStore::new();
        store.create(deposit_order("topup_1_a")).unwrap();

        store.mark_settled("topup_1_a", "T1").unwrap();
        let err = store.mark_failed("topup_1_a").unwrap_err();
        match err {
            PaymentError::OrderNotPending { status, .. } => assert_eq!(status, OrderStatus::Settled),
            other => panic!("unexpected error: {}", other),
        }

        let order = store.get("topup_1_a").unwrap();
        assert_eq!(order.status, OrderStatus::Settled);
        assert_eq!(order.gateway_tx_id, "T1");
    }

    #[test]
    fn test_awaiting_confirmation_withdraw_only() {
        let store = MemoryOrderStore::new();
        store.create(deposit_order("topup_1_a")).unwrap();
        assert!(store.mark_awaiting_confirmation("topup_1_a").is_err());

        let withdraw = Order::new_withdraw(
            "withdraw_1_b".to_string(),
            1,
            Decimal::new(30, 0),
            Currency::Usdt,
            9527,
        );
        store.create(withdraw).unwrap();
        store.mark_awaiting_confirmation("withdraw_1_b").unwrap();

        // Still settleable from the intermediate state
        store.mark_settled("withdraw_1_b", "T2").unwrap();
    }

    #[test]
    fn test_exactly_one_terminal_transition_under_contention() {
        let store = Arc::new(MemoryOrderStore::new());
        store.create(deposit_order("topup_1_a")).unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                if i % 2 == 0 {
                    store.mark_settled("topup_1_a", "T1").is_ok()
                } else {
                    store.mark_failed("topup_1_a").is_ok()
                }
            }));
        }

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1, "exactly one terminal transition may succeed");
        assert!(store.get("topup_1_a").unwrap().status.is_terminal());
    }

    #[test]
    fn test_remove_returns_order() {
        let store = MemoryOrderStore::new();
        store.create(deposit_order("topup_1_a")).unwrap();
        store.mark_settled("topup_1_a", "T1").unwrap();

        let removed = store.remove("topup_1_a").unwrap();
        assert_eq!(removed.order_id, "topup_1_a");
        assert!(store.get("topup_1_a").is_none());
        assert!(store.remove("topup_1_a").is_none());
    }

    #[test]
    fn test_pending_orders_excludes_terminal() {
        let store = MemoryOrderStore::new();
        store.create(deposit_order("topup_1_a")).unwrap();
        store.create(deposit_order("topup_1_b")).unwrap();
        store.mark_settled("topup_1_b", "T1").unwrap();

        let pending = store.pending_orders();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].order_id, "topup_1_a");
    }
}
