//! Type definitions for Binance API requests and responses.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which Binance product the session trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    /// USDⓈ-M perpetual futures
    #[default]
    Futures,
    Spot,
}

impl std::fmt::Display for MarketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketKind::Futures => write!(f, "futures"),
            MarketKind::Spot => write!(f, "spot"),
        }
    }
}

impl std::str::FromStr for MarketKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "futures" => Ok(MarketKind::Futures),
            "spot" => Ok(MarketKind::Spot),
            other => Err(format!("unknown market kind: {}", other)),
        }
    }
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Position side for hedge-mode futures accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        }
    }
}

/// Order type.
///
/// `StopMarket`, `TakeProfitMarket` and `TrailingStopMarket` are futures
/// types; `StopLoss` and `TakeProfit` are their spot counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    StopMarket,
    TakeProfitMarket,
    TrailingStopMarket,
    StopLoss,
    TakeProfit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::StopMarket => "STOP_MARKET",
            OrderType::TakeProfitMarket => "TAKE_PROFIT_MARKET",
            OrderType::TrailingStopMarket => "TRAILING_STOP_MARKET",
            OrderType::StopLoss => "STOP_LOSS",
            OrderType::TakeProfit => "TAKE_PROFIT",
        }
    }
}

/// Time in force for limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gtc, // Good Till Cancel
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
        }
    }
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    PendingCancel,
    Rejected,
    Expired,
    ExpiredInMatch,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// The order will not change any further.
    ///
    /// FILLED and CANCELED are the statuses the supervision loop reacts to;
    /// the exchange-side retirements (REJECTED, EXPIRED) are folded in with
    /// CANCELED.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
                | OrderStatus::ExpiredInMatch
        )
    }

    /// FILLED or CANCELED: the leg decides how its side ended.
    pub fn resolves_side(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Canceled)
    }
}

/// New order request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub position_side: Option<PositionSide>,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub time_in_force: Option<TimeInForce>,
    pub close_position: Option<bool>,
    /// Futures trailing stop activation price
    pub activation_price: Option<Decimal>,
    /// Futures trailing stop callback rate in percent
    pub callback_rate: Option<Decimal>,
    /// Spot trailing distance in basis points
    pub trailing_delta: Option<u32>,
}

impl NewOrder {
    pub fn new(symbol: &str, side: OrderSide, order_type: OrderType) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            position_side: None,
            order_type,
            quantity: None,
            price: None,
            stop_price: None,
            time_in_force: None,
            close_position: None,
            activation_price: None,
            callback_rate: None,
            trailing_delta: None,
        }
    }

    pub fn with_position_side(mut self, position_side: Option<PositionSide>) -> Self {
        self.position_side = position_side;
        self
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_stop_price(mut self, stop_price: Decimal) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = Some(tif);
        self
    }

    pub fn with_close_position(mut self) -> Self {
        self.close_position = Some(true);
        self
    }

    pub fn with_trailing(mut self, activation_price: Decimal, callback_rate: Decimal) -> Self {
        self.activation_price = Some(activation_price);
        self.callback_rate = Some(callback_rate);
        self
    }

    pub fn with_trailing_delta(mut self, bips: u32) -> Self {
        self.trailing_delta = Some(bips);
        self
    }

    /// Request parameters in Binance naming, unsigned.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("symbol", self.symbol.clone()),
            ("side", self.side.as_str().to_string()),
            ("type", self.order_type.as_str().to_string()),
        ];

        if let Some(position_side) = &self.position_side {
            params.push(("positionSide", position_side.as_str().to_string()));
        }
        if let Some(qty) = &self.quantity {
            params.push(("quantity", qty.normalize().to_string()));
        }
        if let Some(price) = &self.price {
            params.push(("price", price.normalize().to_string()));
        }
        if let Some(stop_price) = &self.stop_price {
            params.push(("stopPrice", stop_price.normalize().to_string()));
        }
        if let Some(tif) = &self.time_in_force {
            params.push(("timeInForce", tif.as_str().to_string()));
        }
        if let Some(close_position) = self.close_position {
            params.push(("closePosition", close_position.to_string()));
        }
        if let Some(activation) = &self.activation_price {
            params.push(("activationPrice", activation.normalize().to_string()));
        }
        if let Some(rate) = &self.callback_rate {
            params.push(("callbackRate", rate.normalize().to_string()));
        }
        if let Some(bips) = self.trailing_delta {
            params.push(("trailingDelta", bips.to_string()));
        }

        params
    }
}

/// One half of a spot order list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLeg {
    pub order_type: OrderType,
    pub stop_price: Decimal,
    /// Trailing distance in basis points
    pub trailing_delta: Option<u32>,
}

/// One-cancels-the-other exit list (`POST /api/v3/orderList/oco`).
///
/// Binance addresses the two orders by their position relative to the market:
/// a SELL list closing a long has the take-profit above and the stop below,
/// a BUY list closing a short the other way round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderList {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub above: ListLeg,
    pub below: ListLeg,
}

impl NewOrderList {
    pub fn new(
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        target: ListLeg,
        stop: ListLeg,
    ) -> Self {
        let (above, below) = match side {
            OrderSide::Sell => (target, stop),
            OrderSide::Buy => (stop, target),
        };
        Self {
            symbol: symbol.to_string(),
            side,
            quantity,
            above,
            below,
        }
    }

    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("symbol", self.symbol.clone()),
            ("side", self.side.as_str().to_string()),
            ("quantity", self.quantity.normalize().to_string()),
            ("aboveType", self.above.order_type.as_str().to_string()),
            ("aboveStopPrice", self.above.stop_price.normalize().to_string()),
            ("belowType", self.below.order_type.as_str().to_string()),
            ("belowStopPrice", self.below.stop_price.normalize().to_string()),
        ];
        if let Some(bips) = self.above.trailing_delta {
            params.push(("aboveTrailingDelta", bips.to_string()));
        }
        if let Some(bips) = self.below.trailing_delta {
            params.push(("belowTrailingDelta", bips.to_string()));
        }
        params
    }
}

/// Accepted order list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListResponse {
    pub order_list_id: i64,
    pub order_reports: Vec<OrderListReport>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListReport {
    pub order_id: i64,
    #[serde(rename = "type")]
    pub order_type: String,
}

impl OrderListResponse {
    /// Id of the list order with `order_type`.
    pub fn order_id_of(&self, order_type: OrderType) -> Option<i64> {
        self.order_reports
            .iter()
            .find(|report| report.order_type == order_type.as_str())
            .map(|report| report.order_id)
    }
}

/// Order response from the exchange (place, query and cancel share a shape).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: i64,
    pub symbol: String,
    pub status: OrderStatus,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price: Option<Decimal>,
    /// Futures only
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub avg_price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub orig_qty: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub executed_qty: Option<Decimal>,
    /// Spot only
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub cummulative_quote_qty: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub stop_price: Option<Decimal>,
}

impl OrderResponse {
    /// Average fill price, derived from the quote amount on spot.
    pub fn fill_price(&self) -> Option<Decimal> {
        if let Some(avg) = self.avg_price.filter(|p| !p.is_zero()) {
            return Some(avg);
        }
        match (self.cummulative_quote_qty, self.executed_qty) {
            (Some(quote), Some(qty)) if !qty.is_zero() && !quote.is_zero() => Some(quote / qty),
            _ => None,
        }
    }
}

/// Futures mark price (`/fapi/v1/premiumIndex?symbol=`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPrice {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub mark_price: Decimal,
}

/// Spot last price (`/api/v3/ticker/price?symbol=`).
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
}

/// Order book snapshot; each level is `[price, quantity]`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderBookDepth {
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
}

/// Futures account balance entry (`/fapi/v2/balance`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesBalance {
    pub asset: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub available_balance: Option<Decimal>,
}

/// Spot account snapshot (`/api/v3/account`).
#[derive(Debug, Clone, Deserialize)]
pub struct SpotAccount {
    pub balances: Vec<SpotBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotBalance {
    pub asset: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub free: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub locked: Decimal,
}

/// Futures commission rates (`/fapi/v1/commissionRate`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRate {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub maker_commission_rate: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub taker_commission_rate: Decimal,
}

/// Spot trade fee entry (`/sapi/v1/asset/tradeFee`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotTradeFee {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub maker_commission: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub taker_commission: Decimal,
}

/// Exchange information (both products).
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<ExchangeSymbol>,
}

/// Symbol metadata. Precision fields are only published by futures.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeSymbol {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    #[serde(default)]
    pub price_precision: Option<u32>,
    #[serde(default)]
    pub quantity_precision: Option<u32>,
}
