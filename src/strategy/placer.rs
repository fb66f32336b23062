//! Bracket placement for one side of a straddle.

use crate::exchange::{ExchangeGateway, ExitTarget, GatewayError, OrderId};
use crate::strategy::error::PlacementError;
use crate::strategy::events::{EventSink, SessionEvent};
use crate::strategy::types::{BracketOrder, Leg, Precision, PriceLevels, Side, StraddleParams};
use crate::utils::decimal::{round_to_precision, safe_div};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

/// Quote-currency lot to base quantity, rounded to `precision` decimals.
pub fn compute_quantity(lot: Decimal, reference_price: Decimal, precision: u32) -> Decimal {
    if lot <= Decimal::ZERO || reference_price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_to_precision(safe_div(lot, reference_price), precision)
}

/// Trigger that rounded onto the entry price, which no venue accepts.
fn collapsed_trigger(
    side: Side,
    levels: &PriceLevels,
    target_leg: Leg,
) -> Option<PlacementError> {
    if levels.is_ordered(side) {
        return None;
    }
    let target_beyond_entry =
        (levels.take_profit - levels.entry) * side.direction() > Decimal::ZERO;
    let (leg, price) = if target_beyond_entry {
        (Leg::StopLoss, levels.stop_loss)
    } else {
        (target_leg, levels.take_profit)
    };
    Some(PlacementError::TriggerAtEntry { side, leg, price })
}

/// Submits entry, target and stop orders for one side.
///
/// Failures never escape: each failed leg is classified, reported and left
/// empty on the returned [`BracketOrder`] for the round to validate.
pub struct OrderPlacer<'a> {
    gateway: &'a dyn ExchangeGateway,
    sink: &'a dyn EventSink,
    params: &'a StraddleParams,
    precision: Precision,
}

impl<'a> OrderPlacer<'a> {
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

    /// Place the bracket for `side`, legs strictly entry, target, stop.
    pub async fn place(&self, side: Side, lot: Decimal, reference_price: Decimal) -> BracketOrder {
        let symbol = self.params.symbol.as_str();
        let quantity = compute_quantity(lot, reference_price, self.precision.quantity);
        let levels = PriceLevels::compute(
            side,
            reference_price,
            self.params.take_profit_offset,
            self.params.stop_loss_offset,
            self.params.trailing.as_ref(),
            self.precision.price,
        );
        let mut bracket = BracketOrder::new(side, quantity, levels);

        info!(
            %symbol,
            side = %side,
            %lot,
            %quantity,
            entry = %levels.entry,
            target = %levels.target_trigger(),
            stop_loss = %levels.stop_loss,
            "Placing bracket"
        );

        if quantity <= Decimal::ZERO {
            self.reject(PlacementError::InsufficientQuantity {
                side,
                leg: Leg::Entry,
                quantity,
            });
            return bracket;
        }

        if let Some(failure) = collapsed_trigger(side, &levels, bracket.target_leg) {
            self.reject(failure);
            return bracket;
        }

        let entry = self
            .gateway
            .place_entry_order(symbol, side, quantity, levels.entry)
            .await;
        bracket.entry = match entry {
            Ok(order_id) => Some(self.placed(side, Leg::Entry, order_id, levels.entry)),
            Err(e) => {
                let failure =
                    PlacementError::classify(side, Leg::Entry, e, quantity, levels.entry, None);
                let untradable = matches!(failure, PlacementError::InsufficientQuantity { .. });
                self.reject(failure);
                // Protective legs would fail the same way
                if untradable {
                    return bracket;
                }
                None
            }
        };

        if self.params.links_exit_orders() {
            self.place_linked_exits(&mut bracket).await;
        } else {
            self.place_separate_exits(&mut bracket).await;
        }
        bracket
    }

    async fn place_separate_exits(&self, bracket: &mut BracketOrder) {
        let symbol = self.params.symbol.as_str();
        let (side, quantity, levels) = (bracket.side, bracket.quantity, bracket.levels);

        bracket.take_profit = match levels.exit_target() {
            ExitTarget::TrailingStop {
                activation_price,
                callback_rate_percent,
            } => {
                let result = self
                    .gateway
                    .place_trailing_stop_order(
                        symbol,
                        side,
                        quantity,
                        activation_price,
                        callback_rate_percent,
                    )
                    .await;
                self.record(
                    side,
                    Leg::TrailingStop,
                    result,
                    quantity,
                    activation_price,
                    Some(callback_rate_percent),
                )
            }
            ExitTarget::TakeProfit { stop_price } => {
                let result = self
                    .gateway
                    .place_take_profit_order(symbol, side, stop_price, quantity, true)
                    .await;
                self.record(side, Leg::TakeProfit, result, quantity, stop_price, None)
            }
        };

        let stop = self
            .gateway
            .place_stop_loss_order(symbol, side, levels.stop_loss, quantity, true)
            .await;
        bracket.stop_loss = self.record(side, Leg::StopLoss, stop, quantity, levels.stop_loss, None);
    }

    /// Target and stop as one order list; both land or neither does.
    async fn place_linked_exits(&self, bracket: &mut BracketOrder) {
        let symbol = self.params.symbol.as_str();
        let (side, quantity, levels) = (bracket.side, bracket.quantity, bracket.levels);
        let target = levels.exit_target();
        bracket.linked_exits = true;

        let result = self
            .gateway
            .place_exit_pair(symbol, side, quantity, target, levels.stop_loss)
            .await;
        match result {
            Ok(pair) => {
                bracket.take_profit =
                    Some(self.placed(side, target.leg(), pair.target, target.trigger()));
                bracket.stop_loss =
                    Some(self.placed(side, Leg::StopLoss, pair.stop, levels.stop_loss));
            }
            Err(e) => {
                self.reject(PlacementError::classify(
                    side,
                    target.leg(),
                    e.clone(),
                    quantity,
                    target.trigger(),
                    target.callback_rate(),
                ));
                self.reject(PlacementError::classify(
                    side,
                    Leg::StopLoss,
                    e,
                    quantity,
                    levels.stop_loss,
                    None,
                ));
            }
        }
    }

    fn record(
        &self,
        side: Side,
        leg: Leg,
        result: Result<OrderId, GatewayError>,
        quantity: Decimal,
        price: Decimal,
        callback_rate: Option<Decimal>,
    ) -> Option<OrderId> {
        match result {
            Ok(order_id) => Some(self.placed(side, leg, order_id, price)),
            Err(e) => {
                self.reject(PlacementError::classify(
                    side,
                    leg,
                    e,
                    quantity,
                    price,
                    callback_rate,
                ));
                None
            }
        }
    }

    fn placed(&self, side: Side, leg: Leg, order_id: OrderId, price: Decimal) -> OrderId {
        info!(side = %side, leg = %leg, order_id, %price, "Leg placed");
        self.sink.emit(SessionEvent::LegPlaced {
            side,
            leg,
            order_id,
        });
        order_id
    }

    fn reject(&self, failure: PlacementError) {
        let side = failure.side();
        let leg = failure.leg();
        match failure {
            PlacementError::Unclassified { .. } => {
                error!(side = %side, leg = %leg, error = %failure, "Leg rejected")
            }
            _ => warn!(side = %side, leg = %leg, error = %failure, "Leg rejected"),
        }

        self.sink.emit(SessionEvent::LegRejected {
            side,
            leg,
            reason_code: failure.reason_code().to_string(),
            message: failure.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{MarketKind, MockExchange};
    use crate::strategy::events::ChannelSink;
    use crate::strategy::types::TrailingParams;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn futures_params() -> StraddleParams {
        StraddleParams {
            take_profit_offset: dec!(200),
            stop_loss_offset: dec!(100),
            ..StraddleParams::default()
        }
    }

    fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_compute_quantity() {
        assert_eq!(compute_quantity(dec!(100), dec!(50000), 3), dec!(0.002));
        assert_eq!(compute_quantity(dec!(25), dec!(0.5231), 0), dec!(48));
        assert_eq!(compute_quantity(dec!(10), dec!(50000), 3), Decimal::ZERO);
        assert_eq!(compute_quantity(dec!(100), Decimal::ZERO, 3), Decimal::ZERO);
        assert_eq!(compute_quantity(dec!(-5), dec!(50000), 3), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_futures_scenario_brackets() {
        let exchange = MockExchange::new();
        let (sink, mut rx) = ChannelSink::new();
        let params = futures_params();
        let placer = OrderPlacer::new(&exchange, &sink, &params, Precision::default());

        let long = placer.place(Side::Long, dec!(100), dec!(50000)).await;
        let short = placer.place(Side::Short, dec!(100), dec!(50000)).await;

        assert!(long.is_complete());
        assert!(short.is_complete());
        assert_eq!(long.quantity, dec!(0.002));

        let prices = |side: Side, orders: &[crate::exchange::mock::MockOrder]| {
            orders
                .iter()
                .filter(|o| o.side == side)
                .map(|o| (o.leg, o.price))
                .collect::<Vec<_>>()
        };
        let orders = exchange.orders().await;
        assert_eq!(
            prices(Side::Long, &orders[..]),
            vec![
                (Leg::Entry, dec!(50000)),
                (Leg::TakeProfit, dec!(50200)),
                (Leg::StopLoss, dec!(49900)),
            ]
        );
        assert_eq!(
            prices(Side::Short, &orders[..]),
            vec![
                (Leg::Entry, dec!(50000)),
                (Leg::TakeProfit, dec!(49800)),
                (Leg::StopLoss, dec!(50100)),
            ]
        );

        let events = drain(&mut rx);
        assert_eq!(events.len(), 6);
        assert!(events
            .iter()
            .all(|e| matches!(e, SessionEvent::LegPlaced { .. })));
    }

    #[tokio::test]
    async fn test_zero_quantity_submits_nothing() {
        let exchange = MockExchange::new();
        let (sink, mut rx) = ChannelSink::new();
        let params = futures_params();
        let placer = OrderPlacer::new(&exchange, &sink, &params, Precision::default());

        let bracket = placer.place(Side::Long, dec!(10), dec!(50000)).await;

        assert_eq!(bracket.quantity, Decimal::ZERO);
        assert_eq!(
            bracket.missing_legs(),
            vec![Leg::Entry, Leg::TakeProfit, Leg::StopLoss]
        );
        assert!(exchange.orders().await.is_empty());
        match drain(&mut rx).as_slice() {
            [SessionEvent::LegRejected {
                side,
                leg,
                reason_code,
                message,
            }] => {
                assert_eq!((*side, *leg), (Side::Long, Leg::Entry));
                assert_eq!(reason_code, "INSUFFICIENT_QUANTITY");
                assert!(message.starts_with("LONG entry: quantity 0"));
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_trailing_stop_replaces_take_profit() {
        let exchange = MockExchange::new();
        let (sink, _rx) = ChannelSink::new();
        let params = StraddleParams {
            trailing: Some(TrailingParams {
                callback_rate_percent: dec!(1),
                activation_percent: dec!(1),
            }),
            ..futures_params()
        };
        let placer = OrderPlacer::new(&exchange, &sink, &params, Precision::default());

        let bracket = placer.place(Side::Long, dec!(100), dec!(50000)).await;

        assert!(bracket.is_complete());
        assert_eq!(bracket.target_leg, Leg::TrailingStop);
        let legs: Vec<_> = exchange
            .orders()
            .await
            .iter()
            .map(|o| (o.leg, o.price))
            .collect();
        assert_eq!(
            legs,
            vec![
                (Leg::Entry, dec!(50000)),
                (Leg::TrailingStop, dec!(50500)),
                (Leg::StopLoss, dec!(49900)),
            ]
        );
    }

    #[tokio::test]
    async fn test_unclassified_entry_failure_still_places_protection() {
        let exchange = MockExchange::new();
        exchange
            .fail_placement(
                Side::Short,
                Leg::Entry,
                GatewayError::api(-1021, "Timestamp outside of recvWindow."),
            )
            .await;
        let (sink, mut rx) = ChannelSink::new();
        let params = futures_params();
        let placer = OrderPlacer::new(&exchange, &sink, &params, Precision::default());

        let bracket = placer.place(Side::Short, dec!(100), dec!(50000)).await;

        assert_eq!(bracket.missing_legs(), vec![Leg::Entry]);
        assert_eq!(exchange.orders().await.len(), 2);
        let events = drain(&mut rx);
        assert!(matches!(
            &events[0],
            SessionEvent::LegRejected { reason_code, .. } if reason_code == "UNCLASSIFIED"
        ));
    }

    #[tokio::test]
    async fn test_exchange_quantity_rejection_stops_the_side() {
        let exchange = MockExchange::new();
        exchange
            .fail_placement(
                Side::Long,
                Leg::Entry,
                GatewayError::api(-1013, "Filter failure: NOTIONAL"),
            )
            .await;
        let (sink, mut rx) = ChannelSink::new();
        let params = futures_params();
        let placer = OrderPlacer::new(&exchange, &sink, &params, Precision::default());

        let bracket = placer.place(Side::Long, dec!(100), dec!(50000)).await;

        assert!(bracket.entry.is_none());
        assert!(exchange.orders().await.is_empty());
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_crossed_stop_is_classified() {
        let exchange = MockExchange::new();
        exchange
            .fail_placement(
                Side::Long,
                Leg::StopLoss,
                GatewayError::api(-2021, "Order would immediately trigger."),
            )
            .await;
        let (sink, mut rx) = ChannelSink::new();
        let params = futures_params();
        let placer = OrderPlacer::new(&exchange, &sink, &params, Precision::default());

        let bracket = placer.place(Side::Long, dec!(100), dec!(50000)).await;

        assert_eq!(bracket.missing_legs(), vec![Leg::StopLoss]);
        let rejected: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::LegRejected {
                    leg, reason_code, ..
                } => Some((leg, reason_code)),
                _ => None,
            })
            .collect();
        assert_eq!(
            rejected,
            vec![(Leg::StopLoss, "TRIGGER_WOULD_FIRE_IMMEDIATELY".to_string())]
        );
    }

    fn rejections(events: Vec<SessionEvent>) -> Vec<(Leg, String)> {
        events
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::LegRejected {
                    leg, reason_code, ..
                } => Some((leg, reason_code)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_spot_exits_go_in_as_one_order_list() {
        let exchange = MockExchange::new();
        let (sink, mut rx) = ChannelSink::new();
        let params = StraddleParams {
            market: MarketKind::Spot,
            ..futures_params()
        };
        let placer = OrderPlacer::new(&exchange, &sink, &params, Precision::default());

        let bracket = placer.place(Side::Long, dec!(100), dec!(50000)).await;

        assert!(bracket.is_complete());
        assert!(bracket.linked_exits);
        let orders = exchange.orders().await;
        let target = orders.iter().find(|o| o.leg == Leg::TakeProfit).unwrap();
        let stop = orders.iter().find(|o| o.leg == Leg::StopLoss).unwrap();
        assert_eq!(target.linked, Some(stop.order_id));
        assert_eq!(stop.linked, Some(target.order_id));
        assert_eq!((target.price, stop.price), (dec!(50200), dec!(49900)));
        assert_eq!(bracket.take_profit, Some(target.order_id));
        assert_eq!(drain(&mut rx).len(), 3);
    }

    #[tokio::test]
    async fn test_rejected_order_list_reports_both_legs() {
        let exchange = MockExchange::new();
        exchange
            .fail_placement(
                Side::Short,
                Leg::StopLoss,
                GatewayError::api(-2010, "Stop price would trigger immediately."),
            )
            .await;
        let (sink, mut rx) = ChannelSink::new();
        let params = StraddleParams {
            market: MarketKind::Spot,
            ..futures_params()
        };
        let placer = OrderPlacer::new(&exchange, &sink, &params, Precision::default());

        let bracket = placer.place(Side::Short, dec!(100), dec!(50000)).await;

        assert_eq!(bracket.missing_legs(), vec![Leg::TakeProfit, Leg::StopLoss]);
        assert_eq!(
            rejections(drain(&mut rx)),
            vec![
                (Leg::TakeProfit, "TRIGGER_WOULD_FIRE_IMMEDIATELY".to_string()),
                (Leg::StopLoss, "TRIGGER_WOULD_FIRE_IMMEDIATELY".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_trigger_rounding_onto_entry_submits_nothing() {
        let exchange = MockExchange::new();
        let (sink, mut rx) = ChannelSink::new();
        let params = StraddleParams {
            take_profit_offset: dec!(200),
            stop_loss_offset: dec!(0.004),
            ..StraddleParams::default()
        };
        let placer = OrderPlacer::new(&exchange, &sink, &params, Precision::default());

        let bracket = placer.place(Side::Long, dec!(100), dec!(50000)).await;

        assert!(bracket.entry.is_none());
        assert!(exchange.orders().await.is_empty());
        assert_eq!(
            rejections(drain(&mut rx)),
            vec![(Leg::StopLoss, "TRIGGER_AT_ENTRY".to_string())]
        );
    }
}
