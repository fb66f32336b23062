//! Scripted in-memory exchange for tests.
//!
//! Orders are tracked by id together with the straddle side and leg they were
//! placed for, so tests can script how each leg evolves and inject failures
//! per leg without knowing the ids in advance.

use super::error::GatewayError;
use super::traits::{
    BookTop, ExchangeGateway, ExitPair, ExitTarget, OrderId, OrderState, SymbolInfo,
};
use super::types::OrderStatus;
use crate::strategy::{Leg, Side};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// An order accepted by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockOrder {
    pub order_id: OrderId,
    pub side: Side,
    pub leg: Leg,
    pub quantity: Decimal,
    /// Limit price for entries, trigger or activation price otherwise
    pub price: Decimal,
    pub status: OrderStatus,
    /// Status requests served for this order
    pub polls: usize,
    /// Other half of an exit order list
    pub linked: Option<OrderId>,
}

#[derive(Debug)]
struct MockState {
    price: Decimal,
    book: BookTop,
    fee_rate: Decimal,
    balances: VecDeque<Decimal>,
    symbol_info: SymbolInfo,
    orders: Vec<MockOrder>,
    status_scripts: HashMap<(Side, Leg), Vec<OrderStatus>>,
    placement_failures: HashMap<(Side, Leg), GatewayError>,
    balance_failure: Option<GatewayError>,
    cancel_failure: Option<GatewayError>,
    cancel_all_failure: Option<GatewayError>,
    failing_status_polls: u32,
    status_polls: u32,
    cancel_all_calls: u32,
    canceled: Vec<OrderId>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            price: dec!(50000),
            book: BookTop {
                best_bid: dec!(49999.9),
                best_ask: dec!(50000.1),
            },
            fee_rate: dec!(0.0002),
            balances: VecDeque::from([dec!(1000)]),
            symbol_info: SymbolInfo {
                symbol: "BTCUSDT".to_string(),
                quote_asset: "USDT".to_string(),
                quantity_precision: Some(3),
                price_precision: Some(2),
            },
            orders: Vec::new(),
            status_scripts: HashMap::new(),
            placement_failures: HashMap::new(),
            balance_failure: None,
            cancel_failure: None,
            cancel_all_failure: None,
            failing_status_polls: 0,
            status_polls: 0,
            cancel_all_calls: 0,
            canceled: Vec::new(),
        }
    }
}

/// In-memory [`ExchangeGateway`].
///
/// Unscripted orders stay `NEW` forever. A status script lists the statuses
/// successive polls of a leg report; the last entry repeats. Closed orders
/// never change. Exit pairs behave like an order list: a fill expires the
/// other half and canceling either half cancels both.
#[derive(Debug)]
pub struct MockExchange {
    state: Arc<RwLock<MockState>>,
    order_id_counter: AtomicI64,
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchange {
    /// BTCUSDT at 50000 with a 1000 USDT balance.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            order_id_counter: AtomicI64::new(1),
        }
    }

    pub async fn set_price(&self, price: Decimal) {
        self.state.write().await.price = price;
    }

    pub async fn set_fee_rate(&self, fee_rate: Decimal) {
        self.state.write().await.fee_rate = fee_rate;
    }

    /// Balances returned by successive lookups; the last one repeats.
    pub async fn script_balances(&self, balances: Vec<Decimal>) {
        if balances.is_empty() {
            return;
        }
        self.state.write().await.balances = balances.into();
    }

    /// Statuses reported by successive polls of every order placed for this leg.
    pub async fn script_status(&self, side: Side, leg: Leg, statuses: Vec<OrderStatus>) {
        self.state
            .write()
            .await
            .status_scripts
            .insert((side, leg), statuses);
    }

    /// Reject every placement for this leg with `error`.
    pub async fn fail_placement(&self, side: Side, leg: Leg, error: GatewayError) {
        self.state
            .write()
            .await
            .placement_failures
            .insert((side, leg), error);
    }

    pub async fn fail_balance(&self, error: GatewayError) {
        self.state.write().await.balance_failure = Some(error);
    }

    pub async fn fail_cancels(&self, error: GatewayError) {
        self.state.write().await.cancel_failure = Some(error);
    }

    pub async fn fail_cancel_all(&self, error: GatewayError) {
        self.state.write().await.cancel_all_failure = Some(error);
    }

    /// Make the next `count` status requests fail with a transport error.
    pub async fn fail_next_status_polls(&self, count: u32) {
        self.state.write().await.failing_status_polls = count;
    }

    /// Accepted orders in placement order.
    pub async fn orders(&self) -> Vec<MockOrder> {
        self.state.read().await.orders.clone()
    }

    pub async fn cancel_all_calls(&self) -> u32 {
        self.state.read().await.cancel_all_calls
    }

    /// Orders canceled one by one (not through cancel-all).
    pub async fn canceled_orders(&self) -> Vec<OrderId> {
        self.state.read().await.canceled.clone()
    }

    pub async fn status_polls(&self) -> u32 {
        self.state.read().await.status_polls
    }

    async fn accept(
        &self,
        side: Side,
        leg: Leg,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderId, GatewayError> {
        let mut state = self.state.write().await;
        if let Some(error) = state.placement_failures.get(&(side, leg)) {
            return Err(error.clone());
        }
        Ok(self.push_order(&mut state, side, leg, quantity, price))
    }

    fn push_order(
        &self,
        state: &mut MockState,
        side: Side,
        leg: Leg,
        quantity: Decimal,
        price: Decimal,
    ) -> OrderId {
        let order_id = self.order_id_counter.fetch_add(1, Ordering::SeqCst);
        state.orders.push(MockOrder {
            order_id,
            side,
            leg,
            quantity,
            price,
            status: OrderStatus::New,
            polls: 0,
            linked: None,
        });

        debug!(order_id, side = %side, leg = %leg, %quantity, %price, "Mock order accepted");
        order_id
    }

    /// Close the other half of `order_id`'s list, if it is still open.
    fn close_linked(orders: &mut [MockOrder], order_id: OrderId, status: OrderStatus) {
        let linked = orders
            .iter()
            .find(|o| o.order_id == order_id)
            .and_then(|o| o.linked);
        if let Some(other) = linked.and_then(|id| orders.iter_mut().find(|o| o.order_id == id)) {
            if !other.status.is_closed() {
                other.status = status;
            }
        }
    }
}

#[async_trait]
impl ExchangeGateway for MockExchange {
    async fn get_reference_price(&self, _symbol: &str) -> Result<Decimal, GatewayError> {
        Ok(self.state.read().await.price)
    }

    async fn get_order_book_top(&self, _symbol: &str) -> Result<BookTop, GatewayError> {
        Ok(self.state.read().await.book)
    }

    async fn get_fee_rate(&self, _symbol: &str) -> Result<Decimal, GatewayError> {
        Ok(self.state.read().await.fee_rate)
    }

    async fn get_balance(&self, _asset: &str) -> Result<Decimal, GatewayError> {
        let mut state = self.state.write().await;
        if let Some(error) = &state.balance_failure {
            return Err(error.clone());
        }

        let balance = if state.balances.len() > 1 {
            state.balances.pop_front()
        } else {
            state.balances.front().copied()
        };
        Ok(balance.unwrap_or_default())
    }

    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo, GatewayError> {
        let state = self.state.read().await;
        if state.symbol_info.symbol != symbol {
            return Err(GatewayError::api(-1121, "Invalid symbol."));
        }
        Ok(state.symbol_info.clone())
    }

    async fn place_entry_order(
        &self,
        _symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderId, GatewayError> {
        self.accept(side, Leg::Entry, quantity, price).await
    }

    async fn place_take_profit_order(
        &self,
        _symbol: &str,
        side: Side,
        stop_price: Decimal,
        quantity: Decimal,
        _close_whole_position: bool,
    ) -> Result<OrderId, GatewayError> {
        self.accept(side, Leg::TakeProfit, quantity, stop_price).await
    }

    async fn place_trailing_stop_order(
        &self,
        _symbol: &str,
        side: Side,
        quantity: Decimal,
        activation_price: Decimal,
        _callback_rate_percent: Decimal,
    ) -> Result<OrderId, GatewayError> {
        self.accept(side, Leg::TrailingStop, quantity, activation_price)
            .await
    }

    async fn place_stop_loss_order(
        &self,
        _symbol: &str,
        side: Side,
        stop_price: Decimal,
        quantity: Decimal,
        _close_whole_position: bool,
    ) -> Result<OrderId, GatewayError> {
        self.accept(side, Leg::StopLoss, quantity, stop_price).await
    }

    async fn place_exit_pair(
        &self,
        _symbol: &str,
        side: Side,
        quantity: Decimal,
        target: ExitTarget,
        stop_price: Decimal,
    ) -> Result<ExitPair, GatewayError> {
        let mut state = self.state.write().await;
        // The list is accepted or rejected as a whole
        for leg in [target.leg(), Leg::StopLoss] {
            if let Some(error) = state.placement_failures.get(&(side, leg)) {
                return Err(error.clone());
            }
        }

        let target_id =
            self.push_order(&mut state, side, target.leg(), quantity, target.trigger());
        let stop_id = self.push_order(&mut state, side, Leg::StopLoss, quantity, stop_price);
        for order in state.orders.iter_mut() {
            if order.order_id == target_id {
                order.linked = Some(stop_id);
            } else if order.order_id == stop_id {
                order.linked = Some(target_id);
            }
        }

        Ok(ExitPair {
            target: target_id,
            stop: stop_id,
        })
    }

    async fn get_order_status(
        &self,
        _symbol: &str,
        order_id: OrderId,
    ) -> Result<OrderState, GatewayError> {
        let mut state = self.state.write().await;
        state.status_polls += 1;
        if state.failing_status_polls > 0 {
            state.failing_status_polls -= 1;
            return Err(GatewayError::Transport("connection reset".to_string()));
        }

        let MockState {
            orders,
            status_scripts,
            ..
        } = &mut *state;
        let order = orders
            .iter_mut()
            .find(|o| o.order_id == order_id)
            .ok_or_else(|| GatewayError::api(-2013, "Order does not exist."))?;

        if !order.status.is_closed() {
            if let Some(script) = status_scripts.get(&(order.side, order.leg)) {
                let index = order.polls.min(script.len().saturating_sub(1));
                if let Some(status) = script.get(index) {
                    order.status = *status;
                }
            }
        }
        order.polls += 1;

        let report = OrderState::new(order.order_id, order.status);
        let report = match order.status {
            OrderStatus::Filled => report.with_fill(order.price, order.quantity),
            _ => report,
        };
        if report.status == OrderStatus::Filled {
            Self::close_linked(orders, order_id, OrderStatus::Expired);
        }
        Ok(report)
    }

    async fn cancel_order(&self, _symbol: &str, order_id: OrderId) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        if let Some(error) = &state.cancel_failure {
            return Err(error.clone());
        }

        let order = state
            .orders
            .iter_mut()
            .find(|o| o.order_id == order_id)
            .ok_or_else(|| GatewayError::api(-2011, "Unknown order sent."))?;
        if order.status.is_closed() {
            return Err(GatewayError::api(-2011, "Unknown order sent."));
        }
        order.status = OrderStatus::Canceled;
        Self::close_linked(&mut state.orders, order_id, OrderStatus::Canceled);
        state.canceled.push(order_id);
        Ok(())
    }

    async fn cancel_all_open_orders(&self, _symbol: &str) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        state.cancel_all_calls += 1;
        if let Some(error) = &state.cancel_all_failure {
            return Err(error.clone());
        }

        for order in state.orders.iter_mut().filter(|o| !o.status.is_closed()) {
            order.status = OrderStatus::Canceled;
        }
        Ok(())
    }
}
