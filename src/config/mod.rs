//! Configuration management for the straddle bot.
//!
//! Loads settings from environment variables and config files.

use crate::exchange::MarketKind;
use crate::strategy::{StraddleParams, TrailingParams};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Binance API credentials and market selection
    #[serde(default)]
    pub binance: BinanceConfig,
    /// Instrument, sizing and bracket offsets
    #[serde(default)]
    pub trading: TradingConfig,
    /// Trailing stop in place of the fixed take-profit
    #[serde(default)]
    pub trailing: TrailingConfig,
    /// Lot growth after a full loss
    #[serde(default)]
    pub martingale: MartingaleConfig,
    /// Repeat and polling behaviour
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinanceConfig {
    /// API key for authentication
    #[serde(default)]
    pub api_key: String,
    /// Secret key for signing requests
    #[serde(default)]
    pub secret_key: String,
    /// Use testnet instead of production (also disables the fee ceiling)
    #[serde(default)]
    pub testnet: bool,
    /// USDⓈ-M futures or spot
    #[serde(default)]
    pub market: MarketKind,
    /// Futures account runs in hedge mode (send positionSide)
    #[serde(default = "default_hedge_mode")]
    pub hedge_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Initial lot as a percent of the quote balance
    #[serde(default)]
    pub initial_lot_percent: Decimal,
    /// Initial lot floor in quote currency
    #[serde(default = "default_min_lot")]
    pub min_lot: Decimal,
    /// Take-profit distance from entry, in price points
    #[serde(default)]
    pub take_profit_points: Decimal,
    /// Stop-loss distance from entry, in price points
    #[serde(default)]
    pub stop_loss_points: Decimal,
    /// Maker fee must be below this to trade (0.0005 = 0.05%)
    #[serde(default)]
    pub fee_ceiling: Decimal,
    /// Overrides the exchange's quantity precision
    #[serde(default)]
    pub quantity_precision: Option<u32>,
    /// Overrides the exchange's price precision
    #[serde(default)]
    pub price_precision: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrailingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Trailing distance in percent
    #[serde(default)]
    pub callback_rate_percent: Decimal,
    /// Activation distance from entry in percent
    #[serde(default)]
    pub activation_percent: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MartingaleConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Lot multiplier applied after both sides stop out
    #[serde(default = "default_lot_multiplier")]
    pub lot_multiplier: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Run a single round instead of repeating
    #[serde(default)]
    pub auto_stop: bool,
    /// Seconds between supervision polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

// Default value functions
fn default_hedge_mode() -> bool {
    true
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_min_lot() -> Decimal {
    dec!(10)
}

fn default_lot_multiplier() -> Decimal {
    Decimal::ONE
}

fn default_poll_interval_secs() -> u64 {
    3
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .prefix("STRADDLE"),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.trading.symbol.is_empty(), "symbol must be set");

        anyhow::ensure!(
            self.trading.take_profit_points > Decimal::ZERO
                && self.trading.stop_loss_points > Decimal::ZERO,
            "take_profit_points and stop_loss_points must be positive"
        );

        anyhow::ensure!(
            self.trading.initial_lot_percent >= Decimal::ZERO
                && self.trading.initial_lot_percent <= dec!(100),
            "initial_lot_percent must be between 0 and 100"
        );

        anyhow::ensure!(
            self.binance.testnet || self.trading.fee_ceiling > Decimal::ZERO,
            "fee_ceiling must be positive outside testnet"
        );

        anyhow::ensure!(
            !self.trailing.enabled || self.trailing.callback_rate_percent > Decimal::ZERO,
            "callback_rate_percent must be positive when the trailing stop is enabled"
        );

        anyhow::ensure!(
            !self.martingale.enabled || self.martingale.lot_multiplier >= Decimal::ONE,
            "lot_multiplier must be >= 1 when martingale is enabled"
        );

        anyhow::ensure!(
            self.session.poll_interval_secs >= 1,
            "poll_interval_secs must be at least 1"
        );

        Ok(())
    }

    /// Immutable parameter snapshot for the engine.
    pub fn params(&self) -> StraddleParams {
        StraddleParams {
            symbol: self.trading.symbol.clone(),
            market: self.binance.market,
            testnet: self.binance.testnet,
            initial_lot_percent: self.trading.initial_lot_percent,
            min_lot: self.trading.min_lot,
            take_profit_offset: self.trading.take_profit_points,
            stop_loss_offset: self.trading.stop_loss_points,
            fee_ceiling: self.trading.fee_ceiling,
            trailing: self.trailing.enabled.then_some(TrailingParams {
                callback_rate_percent: self.trailing.callback_rate_percent,
                activation_percent: self.trailing.activation_percent,
            }),
            martingale_enabled: self.martingale.enabled,
            lot_multiplier: self.martingale.lot_multiplier,
            quantity_precision: self.trading.quantity_precision,
            price_precision: self.trading.price_precision,
            poll_interval: Duration::from_secs(self.session.poll_interval_secs),
            auto_stop: self.session.auto_stop,
        }
    }
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            testnet: false,
            market: MarketKind::default(),
            hedge_mode: default_hedge_mode(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            initial_lot_percent: Decimal::ZERO,
            min_lot: default_min_lot(),
            take_profit_points: Decimal::ZERO,
            stop_loss_points: Decimal::ZERO,
            fee_ceiling: Decimal::ZERO,
            quantity_precision: None,
            price_precision: None,
        }
    }
}

impl Default for MartingaleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lot_multiplier: default_lot_multiplier(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_stop: false,
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}
