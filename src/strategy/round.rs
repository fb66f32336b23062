//! One straddle round: concurrent placement, validation and supervision.

use crate::exchange::{ExchangeGateway, OrderId, OrderState};
use crate::strategy::error::StraddleError;
use crate::strategy::events::{EventSink, SessionEvent};
use crate::strategy::placer::OrderPlacer;
use crate::strategy::types::{
    BracketOrder, Leg, Precision, Resolution, RoundOutcome, Side, StraddleParams,
};
use crate::utils::decimal::round_to_precision;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

/// Both outcomes of a supervised round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub reference_price: Decimal,
    pub lot: Decimal,
    pub long: RoundOutcome,
    pub short: RoundOutcome,
}

impl RoundReport {
    pub fn outcomes(&self) -> [RoundOutcome; 2] {
        [self.long, self.short]
    }

    /// Both sides were stopped out.
    pub fn is_full_loss(&self) -> bool {
        is_full_loss(&self.outcomes())
    }

    /// Sum of both sides' price-delta PnL, when the market tracks it.
    pub fn pnl_excluding_fees(&self) -> Option<Decimal> {
        match (self.long.realized_pnl, self.short.realized_pnl) {
            (Some(long), Some(short)) => Some(long + short),
            _ => None,
        }
    }
}

pub fn is_full_loss(outcomes: &[RoundOutcome]) -> bool {
    !outcomes.is_empty()
        && outcomes
            .iter()
            .all(|o| o.resolution == Resolution::StopLoss)
}

/// A complete bracket under supervision.
struct SideWatch {
    bracket: BracketOrder,
    target: OrderId,
    stop: OrderId,
    outcome: Option<RoundOutcome>,
}

impl SideWatch {
    fn new(bracket: &BracketOrder) -> Option<Self> {
        bracket.entry?;
        Some(Self {
            bracket: bracket.clone(),
            target: bracket.take_profit?,
            stop: bracket.stop_loss?,
            outcome: None,
        })
    }
}

pub struct StraddleRound<'a> {
    gateway: &'a dyn ExchangeGateway,
    sink: &'a dyn EventSink,
    params: &'a StraddleParams,
    precision: Precision,
}

impl<'a> StraddleRound<'a> {
    pub fn new(
        gateway: &'a dyn ExchangeGateway,
        sink: &'a dyn EventSink,
        params: &'a StraddleParams,
        precision: Precision,
    ) -> Self {
        Self {
            gateway,
            sink,
            params,
            precision,
        }
    }

    /// Run a round with `lot` per side until both sides resolve.
    ///
    /// Returns [`StraddleError::RoundAborted`] after cancelling every open
    /// order on the symbol when any leg could not be placed.
    pub async fn run(&self, lot: Decimal) -> Result<RoundReport, StraddleError> {
        let symbol = self.params.symbol.as_str();
        let mark = self.gateway.get_reference_price(symbol).await?;
        let reference_price = round_to_precision(mark, self.precision.price);

        info!(%symbol, %lot, %reference_price, "Starting straddle round");

        let placer = OrderPlacer::new(self.gateway, self.sink, self.params, self.precision);
        let (long, short) = tokio::join!(
            placer.place(Side::Long, lot, reference_price),
            placer.place(Side::Short, lot, reference_price),
        );

        let (long, short) = match (SideWatch::new(&long), SideWatch::new(&short)) {
            (Some(long), Some(short)) => (long, short),
            _ => return Err(self.abort(&long, &short).await),
        };

        let [long, short] = self.supervise([long, short]).await;
        Ok(RoundReport {
            reference_price,
            lot,
            long,
            short,
        })
    }

    async fn abort(&self, long: &BracketOrder, short: &BracketOrder) -> StraddleError {
        let symbol = self.params.symbol.as_str();
        let missing: Vec<(Side, Leg)> = [long, short]
            .iter()
            .flat_map(|b| b.missing_legs().into_iter().map(move |leg| (b.side, leg)))
            .collect();

        error!(%symbol, missing = missing.len(), "Bracket incomplete, cancelling all open orders");

        if let Err(e) = self.gateway.cancel_all_open_orders(symbol).await {
            error!(%symbol, error = %e, "Cancel-all failed, open orders may remain");
        }

        for bracket in [long, short] {
            let resolution = if bracket.is_complete() {
                Resolution::Canceled
            } else {
                Resolution::Error
            };
            self.sink.emit(SessionEvent::SideResolved {
                side: bracket.side,
                resolution,
            });
        }

        StraddleError::RoundAborted { missing }
    }

    async fn supervise(&self, mut sides: [SideWatch; 2]) -> [RoundOutcome; 2] {
        loop {
            for watch in sides.iter_mut().filter(|w| w.outcome.is_none()) {
                if let Some(outcome) = self.poll_side(watch).await {
                    info!(
                        side = %outcome.side,
                        resolution = %outcome.resolution,
                        pnl = ?outcome.realized_pnl,
                        "Side resolved"
                    );
                    self.sink.emit(SessionEvent::SideResolved {
                        side: outcome.side,
                        resolution: outcome.resolution,
                    });
                    watch.outcome = Some(outcome);
                }
            }

            if let [SideWatch {
                outcome: Some(long),
                ..
            }, SideWatch {
                outcome: Some(short),
                ..
            }] = &sides
            {
                return [*long, *short];
            }

            tokio::time::sleep(self.params.poll_interval).await;
        }
    }

    /// Stop leg first, so a simultaneous close resolves as a stop-out.
    ///
    /// FILLED or CANCELED decides the side. A leg the exchange retired on its
    /// own (the expired half of an order list, a rejected trigger) only
    /// decides it when its sibling has not filled.
    async fn poll_side(&self, watch: &SideWatch) -> Option<RoundOutcome> {
        let bracket = &watch.bracket;
        let side = bracket.side;

        let stop = self.status(side, Leg::StopLoss, watch.stop).await?;
        if stop.status.resolves_side() {
            self.cancel_sibling(bracket, bracket.target_leg, watch.target)
                .await;
            return Some(self.outcome(
                bracket,
                Resolution::StopLoss,
                &stop,
                bracket.levels.stop_loss,
            ));
        }

        let target = self.status(side, bracket.target_leg, watch.target).await?;
        let stop_sibling = (Leg::StopLoss, &stop, watch.stop);
        let target_sibling = (bracket.target_leg, &target, watch.target);
        let (resolution, closed, (leg, sibling, sibling_id)) = if target.status.resolves_side() {
            (Resolution::TakeProfit, &target, stop_sibling)
        } else if stop.status.is_closed() {
            (Resolution::StopLoss, &stop, target_sibling)
        } else if target.status.is_closed() {
            (Resolution::TakeProfit, &target, stop_sibling)
        } else {
            return None;
        };

        if !sibling.status.is_closed() {
            self.cancel_sibling(bracket, leg, sibling_id).await;
        }
        let trigger = match resolution {
            Resolution::StopLoss => bracket.levels.stop_loss,
            _ => bracket.levels.target_trigger(),
        };
        Some(self.outcome(bracket, resolution, closed, trigger))
    }

    /// Fetch failures are retried on the next tick.
    async fn status(&self, side: Side, leg: Leg, order_id: OrderId) -> Option<OrderState> {
        match self
            .gateway
            .get_order_status(&self.params.symbol, order_id)
            .await
        {
            Ok(state) => {
                debug!(side = %side, leg = %leg, order_id, status = ?state.status, "Polled leg");
                Some(state)
            }
            Err(e) => {
                warn!(side = %side, leg = %leg, order_id, error = %e, "Status fetch failed");
                None
            }
        }
    }

    /// Order lists retire their other half on the exchange side.
    async fn cancel_sibling(&self, bracket: &BracketOrder, leg: Leg, order_id: OrderId) {
        if bracket.linked_exits {
            return;
        }
        let side = bracket.side;
        if let Err(e) = self
            .gateway
            .cancel_order(&self.params.symbol, order_id)
            .await
        {
            warn!(side = %side, leg = %leg, order_id, error = %e, "Failed to cancel sibling leg");
        }
    }

    fn outcome(
        &self,
        bracket: &BracketOrder,
        resolution: Resolution,
        closed: &OrderState,
        trigger: Decimal,
    ) -> RoundOutcome {
        let realized_pnl = self.params.tracks_theoretical_pnl().then(|| {
            let price = closed.fill_price.unwrap_or(trigger);
            let quantity = closed
                .executed_qty
                .filter(|q| *q > Decimal::ZERO)
                .unwrap_or(bracket.quantity);
            bracket.exit_pnl(price, quantity)
        });

        RoundOutcome {
            side: bracket.side,
            resolution,
            realized_pnl,
        }
    }
}
