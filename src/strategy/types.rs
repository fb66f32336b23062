//! Data model for straddle rounds.

use crate::exchange::{ExitTarget, MarketKind, OrderId, OrderSide, PositionSide};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Fallback quantity precision when neither config nor symbol metadata has one.
pub const DEFAULT_QUANTITY_PRECISION: u32 = 3;
/// Fallback price precision.
pub const DEFAULT_PRICE_PRECISION: u32 = 2;

/// One half of the straddle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn entry_order_side(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    /// Direction of the orders that close this side.
    pub fn exit_order_side(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Sell,
            Side::Short => OrderSide::Buy,
        }
    }

    pub fn position_side(&self) -> PositionSide {
        match self {
            Side::Long => PositionSide::Long,
            Side::Short => PositionSide::Short,
        }
    }

    /// +1 for long, -1 for short.
    pub fn direction(&self) -> Decimal {
        match self {
            Side::Long => Decimal::ONE,
            Side::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// Order slot inside a bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Leg {
    Entry,
    TakeProfit,
    /// Trailing stop standing in for the take-profit leg
    TrailingStop,
    StopLoss,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Entry => write!(f, "entry"),
            Leg::TakeProfit => write!(f, "take-profit"),
            Leg::TrailingStop => write!(f, "trailing-stop"),
            Leg::StopLoss => write!(f, "stop-loss"),
        }
    }
}

/// Trailing stop settings, present only when the trailing stop is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingParams {
    /// Distance the trigger trails the best price by, in percent
    pub callback_rate_percent: Decimal,
    /// Move away from the entry, in percent, before trailing starts
    pub activation_percent: Decimal,
}

/// Decimal places used when rounding quantities and prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision {
    pub quantity: u32,
    pub price: u32,
}

impl Precision {
    /// Configured values win, then exchange metadata, then defaults.
    pub fn resolve(
        configured_quantity: Option<u32>,
        configured_price: Option<u32>,
        exchange_quantity: Option<u32>,
        exchange_price: Option<u32>,
    ) -> Self {
        Self {
            quantity: configured_quantity
                .or(exchange_quantity)
                .unwrap_or(DEFAULT_QUANTITY_PRECISION),
            price: configured_price
                .or(exchange_price)
                .unwrap_or(DEFAULT_PRICE_PRECISION),
        }
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self {
            quantity: DEFAULT_QUANTITY_PRECISION,
            price: DEFAULT_PRICE_PRECISION,
        }
    }
}

/// Immutable parameter snapshot for a session.
#[derive(Debug, Clone)]
pub struct StraddleParams {
    pub symbol: String,
    pub market: MarketKind,
    /// Testnet sessions skip the fee ceiling check
    pub testnet: bool,
    /// Initial lot as a percent of the quote balance
    pub initial_lot_percent: Decimal,
    /// Floor for the initial lot, in quote currency
    pub min_lot: Decimal,
    /// Absolute price distance from entry to the take-profit trigger
    pub take_profit_offset: Decimal,
    /// Absolute price distance from entry to the stop-loss trigger
    pub stop_loss_offset: Decimal,
    pub fee_ceiling: Decimal,
    pub trailing: Option<TrailingParams>,
    pub martingale_enabled: bool,
    pub lot_multiplier: Decimal,
    pub quantity_precision: Option<u32>,
    pub price_precision: Option<u32>,
    pub poll_interval: Duration,
    /// Initial value of the auto-stop flag
    pub auto_stop: bool,
}

impl StraddleParams {
    /// Spot sessions report PnL excluding fees per round.
    pub fn tracks_theoretical_pnl(&self) -> bool {
        self.market == MarketKind::Spot
    }

    /// Spot reserves funds per open order, so target and stop go in as one
    /// order list.
    pub fn links_exit_orders(&self) -> bool {
        self.market == MarketKind::Spot
    }
}

impl Default for StraddleParams {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            market: MarketKind::Futures,
            testnet: true,
            initial_lot_percent: Decimal::ZERO,
            min_lot: dec!(10),
            take_profit_offset: Decimal::ZERO,
            stop_loss_offset: Decimal::ZERO,
            fee_ceiling: Decimal::ZERO,
            trailing: None,
            martingale_enabled: false,
            lot_multiplier: Decimal::ONE,
            quantity_precision: None,
            price_precision: None,
            poll_interval: Duration::from_secs(3),
            auto_stop: false,
        }
    }
}

/// Entry and trigger prices for one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevels {
    pub entry: Decimal,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    pub trailing_activation: Option<Decimal>,
    pub trailing_callback_rate: Option<Decimal>,
}

impl PriceLevels {
    /// Derive the levels for `side` from the shared reference price.
    ///
    /// Offsets are absolute price points. The trailing activation sits
    /// `activation_percent` away from the entry in the profitable direction.
    pub fn compute(
        side: Side,
        reference: Decimal,
        take_profit_offset: Decimal,
        stop_loss_offset: Decimal,
        trailing: Option<&TrailingParams>,
        price_precision: u32,
    ) -> Self {
        let direction = side.direction();
        let take_profit = (reference + direction * take_profit_offset).round_dp(price_precision);
        let stop_loss = (reference - direction * stop_loss_offset).round_dp(price_precision);

        let trailing_activation = trailing.map(|t| {
            let factor = Decimal::ONE + t.activation_percent / dec!(100);
            let price = match side {
                Side::Long => reference * factor,
                Side::Short => reference / factor,
            };
            price.round_dp(price_precision)
        });

        Self {
            entry: reference,
            take_profit,
            stop_loss,
            trailing_activation,
            trailing_callback_rate: trailing.map(|t| t.callback_rate_percent),
        }
    }

    /// Take-profit and stop-loss lie on opposite sides of the entry.
    pub fn is_ordered(&self, side: Side) -> bool {
        match side {
            Side::Long => self.take_profit > self.entry && self.entry > self.stop_loss,
            Side::Short => self.take_profit < self.entry && self.entry < self.stop_loss,
        }
    }

    /// Trigger price of the leg that takes profit.
    pub fn target_trigger(&self) -> Decimal {
        self.trailing_activation.unwrap_or(self.take_profit)
    }

    pub fn exit_target(&self) -> ExitTarget {
        match (self.trailing_activation, self.trailing_callback_rate) {
            (Some(activation_price), Some(callback_rate_percent)) => ExitTarget::TrailingStop {
                activation_price,
                callback_rate_percent,
            },
            _ => ExitTarget::TakeProfit {
                stop_price: self.take_profit,
            },
        }
    }
}

/// Entry plus protective orders for one side of a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketOrder {
    pub side: Side,
    pub quantity: Decimal,
    pub levels: PriceLevels,
    pub entry: Option<OrderId>,
    /// Take-profit or trailing-stop order, depending on `target_leg`
    pub take_profit: Option<OrderId>,
    pub target_leg: Leg,
    pub stop_loss: Option<OrderId>,
    /// Target and stop form one exchange order list
    pub linked_exits: bool,
}

impl BracketOrder {
    pub fn new(side: Side, quantity: Decimal, levels: PriceLevels) -> Self {
        let target_leg = if levels.trailing_activation.is_some() {
            Leg::TrailingStop
        } else {
            Leg::TakeProfit
        };

        Self {
            side,
            quantity,
            levels,
            entry: None,
            take_profit: None,
            target_leg,
            stop_loss: None,
            linked_exits: false,
        }
    }

    /// Legs that were not placed.
    pub fn missing_legs(&self) -> Vec<Leg> {
        [
            (Leg::Entry, self.entry),
            (self.target_leg, self.take_profit),
            (Leg::StopLoss, self.stop_loss),
        ]
        .into_iter()
        .filter(|(_, id)| id.is_none())
        .map(|(leg, _)| leg)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.entry.is_some() && self.take_profit.is_some() && self.stop_loss.is_some()
    }

    /// Price-delta PnL of closing the position at `exit_price`, fees excluded.
    pub fn exit_pnl(&self, exit_price: Decimal, quantity: Decimal) -> Decimal {
        (exit_price - self.levels.entry) * quantity * self.side.direction()
    }
}

/// How one side of a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    TakeProfit,
    StopLoss,
    /// Bracket was complete but the round was aborted
    Canceled,
    /// Bracket was incomplete
    Error,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::TakeProfit => write!(f, "TAKE_PROFIT"),
            Resolution::StopLoss => write!(f, "STOP_LOSS"),
            Resolution::Canceled => write!(f, "CANCELED"),
            Resolution::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    pub side: Side,
    pub resolution: Resolution,
    /// Spot only
    pub realized_pnl: Option<Decimal>,
}
