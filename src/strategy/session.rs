//! Session control: sizing, accounting and the repeat loop.
//!
//! A session resolves the quote currency and precision once, sizes the first
//! lot from the balance, then runs rounds back to back. Between rounds it
//! applies the martingale rule, books the balance delta and samples the
//! auto-stop flag. Nothing interrupts a round once it has started.

use crate::exchange::ExchangeGateway;
use crate::risk::{FeeDecision, FeeGuard};
use crate::strategy::error::StraddleError;
use crate::strategy::events::{EventSink, SessionEvent};
use crate::strategy::round::{RoundReport, StraddleRound};
use crate::strategy::types::{Precision, StraddleParams};
use crate::utils::decimal::percent_of;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// First lot: `percent` of `balance`, never below `min_lot`.
pub fn initial_lot(percent: Decimal, balance: Decimal, min_lot: Decimal) -> Decimal {
    (percent * balance / Decimal::ONE_HUNDRED).max(min_lot)
}

/// Mutable session state, touched only between rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub symbol: String,
    pub quote_currency: String,
    pub initial_lot: Decimal,
    pub current_lot: Decimal,
    pub lot_increment_multiplier: Decimal,
    pub martingale_enabled: bool,
    pub auto_repeat_enabled: bool,
    pub balance_at_start: Decimal,
    pub balance: Decimal,
    pub rounds_completed: u32,
    /// Cumulative, spot only
    pub pnl_excluding_fees: Option<Decimal>,
}

impl SessionState {
    pub fn new(params: &StraddleParams, quote_currency: String, balance: Decimal) -> Self {
        let lot = initial_lot(params.initial_lot_percent, balance, params.min_lot);
        Self {
            symbol: params.symbol.clone(),
            quote_currency,
            initial_lot: lot,
            current_lot: lot,
            lot_increment_multiplier: params.lot_multiplier,
            martingale_enabled: params.martingale_enabled,
            auto_repeat_enabled: !params.auto_stop,
            balance_at_start: balance,
            balance,
            rounds_completed: 0,
            pnl_excluding_fees: params.tracks_theoretical_pnl().then_some(Decimal::ZERO),
        }
    }

    /// Grow the lot after a full loss when martingale is on, otherwise reset it.
    pub fn next_lot(&self, full_loss: bool) -> Decimal {
        if full_loss && self.martingale_enabled {
            self.current_lot * self.lot_increment_multiplier
        } else {
            self.initial_lot
        }
    }

    /// Book a finished round and return its balance delta.
    pub fn record_round(&mut self, report: &RoundReport, balance: Decimal) -> Decimal {
        let pnl = balance - self.balance;
        self.balance = balance;
        self.rounds_completed += 1;
        if let (Some(total), Some(round)) = (self.pnl_excluding_fees, report.pnl_excluding_fees()) {
            self.pnl_excluding_fees = Some(total + round);
        }
        self.current_lot = self.next_lot(report.is_full_loss());
        pnl
    }

    pub fn summary(&self, halt: Option<StraddleError>) -> SessionSummary {
        let total_profit = self.balance - self.balance_at_start;
        SessionSummary {
            symbol: self.symbol.clone(),
            quote_currency: self.quote_currency.clone(),
            rounds_completed: self.rounds_completed,
            start_balance: self.balance_at_start,
            final_balance: self.balance,
            total_profit,
            total_profit_percent: percent_of(total_profit, self.balance_at_start),
            pnl_excluding_fees: self.pnl_excluding_fees,
            final_lot: self.current_lot,
            halt,
        }
    }
}

/// Totals reported when a session ends.
#[derive(Debug)]
pub struct SessionSummary {
    pub symbol: String,
    pub quote_currency: String,
    pub rounds_completed: u32,
    pub start_balance: Decimal,
    pub final_balance: Decimal,
    pub total_profit: Decimal,
    pub total_profit_percent: Decimal,
    pub pnl_excluding_fees: Option<Decimal>,
    pub final_lot: Decimal,
    /// Set when the session stopped on an error instead of the auto-stop flag
    pub halt: Option<StraddleError>,
}

/// Drives rounds until auto-stop or a session-level failure.
pub struct SessionController {
    gateway: Arc<dyn ExchangeGateway>,
    sink: Arc<dyn EventSink>,
    params: StraddleParams,
    fee_guard: FeeGuard,
    auto_stop: Arc<AtomicBool>,
}

impl SessionController {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        sink: Arc<dyn EventSink>,
        params: StraddleParams,
    ) -> Self {
        let auto_stop = Arc::new(AtomicBool::new(params.auto_stop));
        Self {
            gateway,
            sink,
            fee_guard: FeeGuard::from_params(&params),
            params,
            auto_stop,
        }
    }

    /// Share an externally owned auto-stop flag.
    pub fn with_auto_stop(mut self, auto_stop: Arc<AtomicBool>) -> Self {
        if self.params.auto_stop {
            auto_stop.store(true, Ordering::SeqCst);
        }
        self.auto_stop = auto_stop;
        self
    }

    /// Setting the flag ends the session at the next round boundary.
    pub fn auto_stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.auto_stop)
    }

    pub fn params(&self) -> &StraddleParams {
        &self.params
    }

    /// Resolve symbol metadata and size the first lot.
    pub async fn prepare(&self) -> Result<(SessionState, Precision), StraddleError> {
        let symbol = self.params.symbol.as_str();
        let info = self.gateway.get_symbol_info(symbol).await?;
        let precision = Precision::resolve(
            self.params.quantity_precision,
            self.params.price_precision,
            info.quantity_precision,
            info.price_precision,
        );
        let balance = self.gateway.get_balance(&info.quote_asset).await?;
        let state = SessionState::new(&self.params, info.quote_asset, balance);

        info!(
            %symbol,
            market = %self.params.market,
            quote = %state.quote_currency,
            %balance,
            initial_lot = %state.initial_lot,
            quantity_precision = precision.quantity,
            price_precision = precision.price,
            "Session prepared"
        );
        self.log_spread().await;

        Ok((state, precision))
    }

    /// Run rounds until the auto-stop flag is seen at a round boundary.
    ///
    /// Errors before the first round are returned. Later failures end the
    /// session and are carried in [`SessionSummary::halt`].
    pub async fn run(&self) -> Result<SessionSummary, StraddleError> {
        let (mut state, precision) = match self.prepare().await {
            Ok(prepared) => prepared,
            Err(e) => return Err(self.halt(e)),
        };

        loop {
            let round_no = state.rounds_completed + 1;

            match self
                .fee_guard
                .check(self.gateway.as_ref(), &self.params.symbol)
                .await
            {
                Ok(FeeDecision::Proceed) => {}
                Ok(FeeDecision::SkipRound { fee }) => {
                    let reason = StraddleError::FeeExceedsLimit {
                        fee,
                        ceiling: self.fee_guard.ceiling(),
                    };
                    self.sink.emit(SessionEvent::RoundSkipped {
                        round: round_no,
                        reason: reason.to_string(),
                    });
                    tokio::time::sleep(self.params.poll_interval).await;
                    if self.stop_requested(&mut state) {
                        break;
                    }
                    continue;
                }
                Ok(FeeDecision::HaltSession { fee }) => {
                    let halt = self.halt(StraddleError::FeeExceedsLimit {
                        fee,
                        ceiling: self.fee_guard.ceiling(),
                    });
                    return Ok(state.summary(Some(halt)));
                }
                Err(e) => return Ok(state.summary(Some(self.halt(e.into())))),
            }

            self.sink.emit(SessionEvent::RoundStarted {
                round: round_no,
                lot: state.current_lot,
            });

            let round = StraddleRound::new(
                self.gateway.as_ref(),
                self.sink.as_ref(),
                &self.params,
                precision,
            );
            let report = match round.run(state.current_lot).await {
                Ok(report) => report,
                Err(e) => return Ok(state.summary(Some(self.halt(e)))),
            };

            let balance = match self.gateway.get_balance(&state.quote_currency).await {
                Ok(balance) => balance,
                Err(e) => return Ok(state.summary(Some(self.halt(e.into())))),
            };
            let full_loss = report.is_full_loss();
            let pnl = state.record_round(&report, balance);

            info!(
                round = round_no,
                %pnl,
                pnl_excluding_fees = ?report.pnl_excluding_fees(),
                %balance,
                full_loss,
                next_lot = %state.current_lot,
                "Round completed"
            );
            self.sink.emit(SessionEvent::RoundCompleted {
                round: round_no,
                pnl,
                pnl_excluding_fees: report.pnl_excluding_fees(),
                balance,
            });
            self.log_spread().await;

            if self.stop_requested(&mut state) {
                break;
            }
        }

        let summary = state.summary(None);
        info!(
            rounds = summary.rounds_completed,
            total_profit = %summary.total_profit,
            total_profit_percent = %summary.total_profit_percent,
            pnl_excluding_fees = ?summary.pnl_excluding_fees,
            "Session finished"
        );
        Ok(summary)
    }

    fn stop_requested(&self, state: &mut SessionState) -> bool {
        state.auto_repeat_enabled = !self.auto_stop.load(Ordering::SeqCst);
        if !state.auto_repeat_enabled {
            info!(rounds = state.rounds_completed, "Auto-stop set, ending session");
        }
        !state.auto_repeat_enabled
    }

    fn halt(&self, reason: StraddleError) -> StraddleError {
        error!(symbol = %self.params.symbol, error = %reason, "Session halted");
        self.sink.emit(SessionEvent::SessionHalted {
            reason: reason.to_string(),
        });
        reason
    }

    async fn log_spread(&self) {
        match self.gateway.get_order_book_top(&self.params.symbol).await {
            Ok(top) => info!(
                symbol = %self.params.symbol,
                best_bid = %top.best_bid,
                best_ask = %top.best_ask,
                spread = %top.spread(),
                "Order book spread"
            ),
            Err(e) => warn!(symbol = %self.params.symbol, error = %e, "Spread lookup failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{GatewayError, MarketKind, MockExchange, OrderStatus};
    use crate::strategy::types::{Leg, Resolution, RoundOutcome, Side};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records events and raises the auto-stop flag once `stop_on` matches.
    struct StoppingSink {
        flag: Arc<AtomicBool>,
        stop_on: fn(&SessionEvent, &[SessionEvent]) -> bool,
        events: Mutex<Vec<SessionEvent>>,
    }

    impl StoppingSink {
        fn new(flag: Arc<AtomicBool>, stop_on: fn(&SessionEvent, &[SessionEvent]) -> bool) -> Self {
            Self {
                flag,
                stop_on,
                events: Mutex::new(Vec::new()),
            }
        }

        fn events(&self) -> Vec<SessionEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EventSink for StoppingSink {
        fn emit(&self, event: SessionEvent) {
            let mut events = self.events.lock().unwrap();
            if (self.stop_on)(&event, &events) {
                self.flag.store(true, Ordering::SeqCst);
            }
            events.push(event);
        }
    }

    fn params() -> StraddleParams {
        StraddleParams {
            initial_lot_percent: dec!(1),
            take_profit_offset: dec!(2),
            stop_loss_offset: dec!(1),
            poll_interval: Duration::from_millis(1),
            ..StraddleParams::default()
        }
    }

    async fn exchange_at_100() -> Arc<MockExchange> {
        let exchange = Arc::new(MockExchange::new());
        exchange.set_price(dec!(100)).await;
        exchange
    }

    fn controller(
        exchange: Arc<MockExchange>,
        sink: Arc<StoppingSink>,
        params: StraddleParams,
    ) -> SessionController {
        let flag = Arc::clone(&sink.flag);
        SessionController::new(exchange, sink, params).with_auto_stop(flag)
    }

    fn lots_started(events: &[SessionEvent]) -> Vec<Decimal> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::RoundStarted { lot, .. } => Some(*lot),
                _ => None,
            })
            .collect()
    }

    fn report(long: Resolution, short: Resolution) -> RoundReport {
        RoundReport {
            reference_price: dec!(100),
            lot: dec!(10),
            long: RoundOutcome {
                side: Side::Long,
                resolution: long,
                realized_pnl: None,
            },
            short: RoundOutcome {
                side: Side::Short,
                resolution: short,
                realized_pnl: None,
            },
        }
    }

    #[test]
    fn test_initial_lot_floor() {
        assert_eq!(initial_lot(dec!(1), dec!(500), dec!(10)), dec!(10));
        assert_eq!(initial_lot(dec!(5), dec!(1000), dec!(10)), dec!(50));
        assert_eq!(initial_lot(Decimal::ZERO, dec!(1000), dec!(10)), dec!(10));
    }

    #[test]
    fn test_martingale_grows_only_on_full_loss() {
        let params = StraddleParams {
            martingale_enabled: true,
            lot_multiplier: dec!(2),
            ..params()
        };
        let mut state = SessionState::new(&params, "USDT".to_string(), dec!(1000));

        state.record_round(&report(Resolution::StopLoss, Resolution::StopLoss), dec!(990));
        assert_eq!(state.current_lot, dec!(20));
        state.record_round(&report(Resolution::StopLoss, Resolution::StopLoss), dec!(970));
        assert_eq!(state.current_lot, dec!(40));

        let mixed = report(Resolution::TakeProfit, Resolution::StopLoss);
        let pnl = state.record_round(&mixed, dec!(1005));
        assert_eq!(pnl, dec!(35));
        assert_eq!(state.current_lot, dec!(10));
        assert_eq!(state.rounds_completed, 3);
    }

    #[test]
    fn test_take_profit_resets_lot_without_martingale() {
        let mut state = SessionState::new(&params(), "USDT".to_string(), dec!(1000));
        state.current_lot = dec!(80);

        assert_eq!(state.next_lot(true), dec!(10));
        state.record_round(&report(Resolution::TakeProfit, Resolution::TakeProfit), dec!(1001));
        assert_eq!(state.current_lot, dec!(10));
    }

    #[test]
    fn test_summary_totals() {
        let params = StraddleParams {
            market: MarketKind::Spot,
            ..params()
        };
        let mut state = SessionState::new(&params, "USDT".to_string(), dec!(1000));
        let mut spot = report(Resolution::TakeProfit, Resolution::StopLoss);
        spot.long.realized_pnl = Some(dec!(0.2));
        spot.short.realized_pnl = Some(dec!(-0.1));
        state.record_round(&spot, dec!(1050));

        let summary = state.summary(None);
        assert_eq!(summary.total_profit, dec!(50));
        assert_eq!(summary.total_profit_percent, dec!(5));
        assert_eq!(summary.pnl_excluding_fees, Some(dec!(0.1)));
        assert!(summary.halt.is_none());
    }

    #[tokio::test]
    async fn test_full_loss_doubles_lot_and_repeats() {
        let exchange = exchange_at_100().await;
        exchange
            .script_balances(vec![dec!(1000), dec!(990), dec!(980)])
            .await;
        for side in [Side::Long, Side::Short] {
            exchange
                .script_status(side, Leg::StopLoss, vec![OrderStatus::Filled])
                .await;
        }
        let params = StraddleParams {
            martingale_enabled: true,
            lot_multiplier: dec!(2),
            ..params()
        };
        let sink = Arc::new(StoppingSink::new(Arc::new(AtomicBool::new(false)), |event, seen| {
            matches!(event, SessionEvent::RoundStarted { .. })
                && lots_started(seen).len() == 1
        }));

        let summary = controller(Arc::clone(&exchange), Arc::clone(&sink), params)
            .run()
            .await
            .unwrap();

        assert_eq!(lots_started(&sink.events()), vec![dec!(10), dec!(20)]);
        assert_eq!(summary.rounds_completed, 2);
        assert_eq!(summary.final_balance, dec!(980));
        assert_eq!(summary.total_profit, dec!(-20));
        assert_eq!(summary.final_lot, dec!(40));
        assert!(summary.halt.is_none());

        // Second round sized at 20 / 100
        let entries: Vec<_> = exchange
            .orders()
            .await
            .into_iter()
            .filter(|o| o.leg == Leg::Entry)
            .map(|o| o.quantity)
            .collect();
        assert_eq!(entries, vec![dec!(0.1), dec!(0.1), dec!(0.2), dec!(0.2)]);
    }

    #[tokio::test]
    async fn test_auto_stop_preset_runs_one_round() {
        let exchange = exchange_at_100().await;
        for side in [Side::Long, Side::Short] {
            exchange
                .script_status(side, Leg::TakeProfit, vec![OrderStatus::Filled])
                .await;
        }
        let params = StraddleParams {
            auto_stop: true,
            ..params()
        };
        let sink = Arc::new(StoppingSink::new(Arc::new(AtomicBool::new(false)), |_, _| false));

        let summary = controller(exchange, Arc::clone(&sink), params)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.rounds_completed, 1);
        assert_eq!(lots_started(&sink.events()).len(), 1);
    }

    #[tokio::test]
    async fn test_futures_fee_above_ceiling_halts() {
        let exchange = exchange_at_100().await;
        exchange.set_fee_rate(dec!(0.001)).await;
        let params = StraddleParams {
            testnet: false,
            fee_ceiling: dec!(0.0005),
            ..params()
        };
        let sink = Arc::new(StoppingSink::new(Arc::new(AtomicBool::new(false)), |_, _| false));

        let summary = controller(Arc::clone(&exchange), Arc::clone(&sink), params)
            .run()
            .await
            .unwrap();

        assert!(matches!(
            summary.halt,
            Some(StraddleError::FeeExceedsLimit { fee, ceiling })
                if fee == dec!(0.001) && ceiling == dec!(0.0005)
        ));
        assert_eq!(summary.rounds_completed, 0);
        assert!(exchange.orders().await.is_empty());
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, SessionEvent::SessionHalted { .. })));
    }

    #[tokio::test]
    async fn test_spot_fee_above_ceiling_skips_round() {
        let exchange = exchange_at_100().await;
        exchange.set_fee_rate(dec!(0.001)).await;
        let params = StraddleParams {
            market: MarketKind::Spot,
            testnet: false,
            fee_ceiling: dec!(0.0005),
            ..params()
        };
        let sink = Arc::new(StoppingSink::new(Arc::new(AtomicBool::new(false)), |event, _| {
            matches!(event, SessionEvent::RoundSkipped { .. })
        }));

        let summary = controller(Arc::clone(&exchange), Arc::clone(&sink), params)
            .run()
            .await
            .unwrap();

        assert!(summary.halt.is_none());
        assert_eq!(summary.rounds_completed, 0);
        assert!(exchange.orders().await.is_empty());
        assert!(matches!(
            sink.events().as_slice(),
            [SessionEvent::RoundSkipped { round: 1, .. }]
        ));
    }

    #[tokio::test]
    async fn test_aborted_round_halts_session() {
        let exchange = exchange_at_100().await;
        exchange
            .fail_placement(
                Side::Long,
                Leg::StopLoss,
                GatewayError::api(-2021, "Order would immediately trigger."),
            )
            .await;
        let sink = Arc::new(StoppingSink::new(Arc::new(AtomicBool::new(false)), |_, _| false));

        let summary = controller(Arc::clone(&exchange), Arc::clone(&sink), params())
            .run()
            .await
            .unwrap();

        assert!(matches!(summary.halt, Some(StraddleError::RoundAborted { .. })));
        assert_eq!(exchange.cancel_all_calls().await, 1);
        assert!(matches!(
            sink.events().last(),
            Some(SessionEvent::SessionHalted { .. })
        ));
    }

    #[tokio::test]
    async fn test_balance_failure_before_first_round_is_returned() {
        let exchange = exchange_at_100().await;
        exchange
            .fail_balance(GatewayError::Transport("connection refused".to_string()))
            .await;
        let sink = Arc::new(StoppingSink::new(Arc::new(AtomicBool::new(false)), |_, _| false));

        let result = controller(exchange, Arc::clone(&sink), params()).run().await;

        assert!(matches!(result, Err(StraddleError::Gateway(GatewayError::Transport(_)))));
        assert!(matches!(
            sink.events().as_slice(),
            [SessionEvent::SessionHalted { .. }]
        ));
    }
}
