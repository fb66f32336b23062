//! Maker fee ceiling checked before every round.

use crate::exchange::{ExchangeGateway, GatewayError, MarketKind};
use crate::strategy::StraddleParams;
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// What the session should do about the current fee rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum FeeDecision {
    /// Fee is below the ceiling, or the check is disabled
    Proceed,
    /// Spot: wait and check again at the next round boundary
    SkipRound { fee: Decimal },
    /// Futures: stop trading altogether
    HaltSession { fee: Decimal },
}

/// Compares the maker fee against the configured ceiling.
///
/// Spot skips the round while futures halts the session. Testnet
/// sessions never check.
#[derive(Debug, Clone, Copy)]
pub struct FeeGuard {
    ceiling: Decimal,
    market: MarketKind,
    enabled: bool,
}

impl FeeGuard {
    pub fn new(ceiling: Decimal, market: MarketKind, enabled: bool) -> Self {
        Self {
            ceiling,
            market,
            enabled,
        }
    }

    pub fn from_params(params: &StraddleParams) -> Self {
        Self::new(params.fee_ceiling, params.market, !params.testnet)
    }

    pub fn ceiling(&self) -> Decimal {
        self.ceiling
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn evaluate(&self, fee: Decimal) -> FeeDecision {
        if !self.enabled || fee < self.ceiling {
            return FeeDecision::Proceed;
        }

        match self.market {
            MarketKind::Spot => FeeDecision::SkipRound { fee },
            MarketKind::Futures => FeeDecision::HaltSession { fee },
        }
    }

    /// Fetch the fee for `symbol` and evaluate it.
    pub async fn check(
        &self,
        gateway: &dyn ExchangeGateway,
        symbol: &str,
    ) -> Result<FeeDecision, GatewayError> {
        if !self.enabled {
            return Ok(FeeDecision::Proceed);
        }

        let fee = gateway.get_fee_rate(symbol).await?;
        let decision = self.evaluate(fee);
        match decision {
            FeeDecision::Proceed => debug!(%symbol, %fee, ceiling = %self.ceiling, "Fee check passed"),
            _ => warn!(%symbol, %fee, ceiling = %self.ceiling, ?decision, "Fee above ceiling"),
        }
        Ok(decision)
    }
}
