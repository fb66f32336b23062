//! Exchange integration for the straddle engine.
//!
//! - `traits`: the venue-neutral [`ExchangeGateway`] the engine depends on
//! - `client`: Binance REST implementation (USDⓈ-M futures or spot)
//! - `mock`: scripted in-memory gateway for tests
//! - `error`: gateway errors and the Binance error-code table

mod client;
mod error;
pub mod mock;
mod traits;
mod types;

pub use client::BinanceClient;
pub use error::{ApiErrorBody, ApiErrorKind, GatewayError};
pub use mock::MockExchange;
pub use traits::{
    BookTop, ExchangeGateway, ExitPair, ExitTarget, OrderId, OrderState, SymbolInfo,
};
pub use types::*;

#[cfg(test)]
pub use traits::MockExchangeGateway;
