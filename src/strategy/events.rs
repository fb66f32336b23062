//! Structured session events.
//!
//! Every placement, resolution and session transition is reported through an
//! [`EventSink`]. The production sink writes one JSON line per event on the
//! `straddle_event` tracing target so the log can be parsed without scraping
//! free-form messages.

use crate::exchange::OrderId;
use crate::strategy::types::{Leg, Resolution, Side};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    RoundStarted {
        round: u32,
        lot: Decimal,
    },
    LegPlaced {
        side: Side,
        leg: Leg,
        order_id: OrderId,
    },
    LegRejected {
        side: Side,
        leg: Leg,
        reason_code: String,
        message: String,
    },
    SideResolved {
        side: Side,
        resolution: Resolution,
    },
    RoundCompleted {
        round: u32,
        /// Balance delta over the round, fees included
        pnl: Decimal,
        /// Spot only
        pnl_excluding_fees: Option<Decimal>,
        balance: Decimal,
    },
    RoundSkipped {
        round: u32,
        reason: String,
    },
    SessionHalted {
        reason: String,
    },
}

impl SessionEvent {
    /// Events that mean something went wrong.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            SessionEvent::LegRejected { .. }
                | SessionEvent::RoundSkipped { .. }
                | SessionEvent::SessionHalted { .. }
        )
    }
}

/// Receiver of session events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SessionEvent);
}

/// Writes events to the log as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SessionEvent) {
        let json = serde_json::to_string(&event).unwrap_or_default();

        if event.is_warning() {
            warn!(target: "straddle_event", "STRADDLE_EVENT: {}", json);
        } else {
            info!(target: "straddle_event", "STRADDLE_EVENT: {}", json);
        }
    }
}

/// Forwards events over a channel, for embedding the engine or observing it in tests.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: SessionEvent) {
        // A dropped receiver only means nobody is listening any more
        let _ = self.tx.send(event);
    }
}
