//! # Binance Straddle
//!
//! Two-sided (long + short) entry on Binance with bracket supervision,
//! martingale sizing and automatic repeat.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `exchange`: Binance REST client behind the `ExchangeGateway` trait, plus a scripted mock
//! - `strategy`: Bracket placement, straddle rounds and the session loop
//! - `risk`: Pre-round fee ceiling gate
//! - `utils`: Shared utilities and decimal arithmetic

pub mod config;
pub mod exchange;
pub mod risk;
pub mod strategy;
pub mod utils;

pub use config::Config;
