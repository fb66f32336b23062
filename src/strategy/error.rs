//! Errors raised while placing and running straddle rounds.

use crate::exchange::{ApiErrorKind, GatewayError};
use crate::strategy::types::{Leg, Side};
use rust_decimal::Decimal;
use thiserror::Error;

/// Why one leg of a bracket could not be placed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("{side} {leg}: quantity {quantity} is not tradable, increase the lot")]
    InsufficientQuantity {
        side: Side,
        leg: Leg,
        quantity: Decimal,
    },

    #[error("{side} {leg}: maximum number of open conditional orders reached")]
    AlgoOrderLimitExceeded { side: Side, leg: Leg },

    #[error("{side} {leg}: trigger {price} would fire immediately, widen the offset")]
    TriggerWouldFireImmediately { side: Side, leg: Leg, price: Decimal },

    #[error("{side} {leg}: trigger {price} rounds onto the entry, widen the offset")]
    TriggerAtEntry { side: Side, leg: Leg, price: Decimal },

    #[error("{side} {leg}: callback rate {rate}% rejected")]
    InvalidCallbackRate { side: Side, leg: Leg, rate: Decimal },

    #[error("{side} {leg}: {source}")]
    Unclassified {
        side: Side,
        leg: Leg,
        source: GatewayError,
    },
}

impl PlacementError {
    /// Classify a gateway failure for `leg`.
    ///
    /// `price` is the entry or trigger price that was submitted. An invalid
    /// parameter only means a bad callback rate on a trailing-stop leg.
    pub fn classify(
        side: Side,
        leg: Leg,
        error: GatewayError,
        quantity: Decimal,
        price: Decimal,
        callback_rate: Option<Decimal>,
    ) -> Self {
        match error.kind() {
            ApiErrorKind::InsufficientQuantity => {
                PlacementError::InsufficientQuantity { side, leg, quantity }
            }
            ApiErrorKind::AlgoOrderLimitExceeded => {
                PlacementError::AlgoOrderLimitExceeded { side, leg }
            }
            ApiErrorKind::TriggerWouldFireImmediately if leg != Leg::Entry => {
                PlacementError::TriggerWouldFireImmediately { side, leg, price }
            }
            ApiErrorKind::InvalidCallbackRate | ApiErrorKind::InvalidParameter
                if leg == Leg::TrailingStop =>
            {
                PlacementError::InvalidCallbackRate {
                    side,
                    leg,
                    rate: callback_rate.unwrap_or_default(),
                }
            }
            _ => PlacementError::Unclassified {
                side,
                leg,
                source: error,
            },
        }
    }

    pub fn side(&self) -> Side {
        match self {
            PlacementError::InsufficientQuantity { side, .. }
            | PlacementError::AlgoOrderLimitExceeded { side, .. }
            | PlacementError::TriggerWouldFireImmediately { side, .. }
            | PlacementError::TriggerAtEntry { side, .. }
            | PlacementError::InvalidCallbackRate { side, .. }
            | PlacementError::Unclassified { side, .. } => *side,
        }
    }

    pub fn leg(&self) -> Leg {
        match self {
            PlacementError::InsufficientQuantity { leg, .. }
            | PlacementError::AlgoOrderLimitExceeded { leg, .. }
            | PlacementError::TriggerWouldFireImmediately { leg, .. }
            | PlacementError::TriggerAtEntry { leg, .. }
            | PlacementError::InvalidCallbackRate { leg, .. }
            | PlacementError::Unclassified { leg, .. } => *leg,
        }
    }

    /// Stable machine-readable reason for events.
    pub fn reason_code(&self) -> &'static str {
        match self {
            PlacementError::InsufficientQuantity { .. } => "INSUFFICIENT_QUANTITY",
            PlacementError::AlgoOrderLimitExceeded { .. } => "ALGO_ORDER_LIMIT_EXCEEDED",
            PlacementError::TriggerWouldFireImmediately { .. } => "TRIGGER_WOULD_FIRE_IMMEDIATELY",
            PlacementError::TriggerAtEntry { .. } => "TRIGGER_AT_ENTRY",
            PlacementError::InvalidCallbackRate { .. } => "INVALID_CALLBACK_RATE",
            PlacementError::Unclassified { .. } => "UNCLASSIFIED",
        }
    }
}

/// Round- and session-level failures.
#[derive(Debug, Error)]
pub enum StraddleError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("fee rate {fee} is not below the ceiling {ceiling}")]
    FeeExceedsLimit { fee: Decimal, ceiling: Decimal },

    #[error("round aborted, legs not placed: {}", describe_legs(.missing))]
    RoundAborted { missing: Vec<(Side, Leg)> },
}

fn describe_legs(legs: &[(Side, Leg)]) -> String {
    legs.iter()
        .map(|(side, leg)| format!("{} {}", side, leg))
        .collect::<Vec<_>>()
        .join(", ")
}
