//! Straddle engine.
//!
//! Contains the core logic for:
//! - Bracket placement for one side (entry, target, stop)
//! - Rounds that place both sides concurrently and supervise them
//! - Sessions that size lots, book PnL and repeat rounds
//! - Structured events describing all of the above

mod error;
mod events;
mod placer;
mod round;
mod session;
mod types;

pub use error::{PlacementError, StraddleError};
pub use events::{ChannelSink, EventSink, SessionEvent, TracingSink};
pub use placer::{compute_quantity, OrderPlacer};
pub use round::{is_full_loss, RoundReport, StraddleRound};
pub use session::{initial_lot, SessionController, SessionState, SessionSummary};
pub use types::*;
