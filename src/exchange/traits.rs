//! Exchange-neutral gateway used by the straddle engine.
//!
//! The engine never talks to an HTTP client directly; it sees the exchange
//! through [`ExchangeGateway`], which the Binance REST client and the
//! scripted mock both implement. Gateways do not retry: retry and backoff
//! belong to the caller.

use crate::exchange::error::GatewayError;
use crate::exchange::types::OrderStatus;
use crate::strategy::{Leg, Side};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Exchange-assigned order identifier.
pub type OrderId = i64;

/// Best bid and ask at the top of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookTop {
    pub best_bid: Decimal,
    pub best_ask: Decimal,
}

impl BookTop {
    pub fn spread(&self) -> Decimal {
        self.best_ask - self.best_bid
    }
}

/// Symbol metadata needed before a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub symbol: String,
    /// Currency the lot and balance are denominated in
    pub quote_asset: String,
    pub quantity_precision: Option<u32>,
    pub price_precision: Option<u32>,
}

/// Current state of one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderState {
    pub order_id: OrderId,
    pub status: OrderStatus,
    /// Average fill price, when the exchange reports one
    pub fill_price: Option<Decimal>,
    pub executed_qty: Option<Decimal>,
}

impl OrderState {
    pub fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self {
            order_id,
            status,
            fill_price: None,
            executed_qty: None,
        }
    }

    pub fn with_fill(mut self, price: Decimal, qty: Decimal) -> Self {
        self.fill_price = Some(price);
        self.executed_qty = Some(qty);
        self
    }
}

/// Take-profit half of an exit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTarget {
    TakeProfit {
        stop_price: Decimal,
    },
    TrailingStop {
        activation_price: Decimal,
        callback_rate_percent: Decimal,
    },
}

impl ExitTarget {
    pub fn leg(&self) -> Leg {
        match self {
            ExitTarget::TakeProfit { .. } => Leg::TakeProfit,
            ExitTarget::TrailingStop { .. } => Leg::TrailingStop,
        }
    }

    /// Take-profit trigger or trailing activation price.
    pub fn trigger(&self) -> Decimal {
        match self {
            ExitTarget::TakeProfit { stop_price } => *stop_price,
            ExitTarget::TrailingStop {
                activation_price, ..
            } => *activation_price,
        }
    }

    pub fn callback_rate(&self) -> Option<Decimal> {
        match self {
            ExitTarget::TakeProfit { .. } => None,
            ExitTarget::TrailingStop {
                callback_rate_percent,
                ..
            } => Some(*callback_rate_percent),
        }
    }
}

/// Order ids of a placed exit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitPair {
    pub target: OrderId,
    pub stop: OrderId,
}

/// Narrow REST surface the straddle engine needs.
///
/// `side` is always the side of the straddle leg being protected: the
/// implementation decides the BUY/SELL direction of each order from it.
/// Protective orders receive the bracket quantity; with
/// `close_whole_position` set, venues that support a close-position flag
/// send the flag instead of the quantity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn get_reference_price(&self, symbol: &str) -> Result<Decimal, GatewayError>;

    async fn get_order_book_top(&self, symbol: &str) -> Result<BookTop, GatewayError>;

    /// Maker commission rate (0.001 = 0.1%).
    async fn get_fee_rate(&self, symbol: &str) -> Result<Decimal, GatewayError>;

    async fn get_balance(&self, asset: &str) -> Result<Decimal, GatewayError>;

    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo, GatewayError>;

    /// Limit order, good till canceled.
    async fn place_entry_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderId, GatewayError>;

    async fn place_take_profit_order(
        &self,
        symbol: &str,
        side: Side,
        stop_price: Decimal,
        quantity: Decimal,
        close_whole_position: bool,
    ) -> Result<OrderId, GatewayError>;

    async fn place_trailing_stop_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        activation_price: Decimal,
        callback_rate_percent: Decimal,
    ) -> Result<OrderId, GatewayError>;

    async fn place_stop_loss_order(
        &self,
        symbol: &str,
        side: Side,
        stop_price: Decimal,
        quantity: Decimal,
        close_whole_position: bool,
    ) -> Result<OrderId, GatewayError>;

    /// Target and stop as one one-cancels-the-other order list, so the
    /// quantity is reserved once and the exchange retires the losing half.
    /// Markets without order lists answer [`GatewayError::Unsupported`].
    async fn place_exit_pair(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        target: ExitTarget,
        stop_price: Decimal,
    ) -> Result<ExitPair, GatewayError>;

    async fn get_order_status(
        &self,
        symbol: &str,
        order_id: OrderId,
    ) -> Result<OrderState, GatewayError>;

    async fn cancel_order(&self, symbol: &str, order_id: OrderId) -> Result<(), GatewayError>;

    async fn cancel_all_open_orders(&self, symbol: &str) -> Result<(), GatewayError>;
}
