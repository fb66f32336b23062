//! Pre-round risk gates.
//!
//! - Maker fee ceiling (skip the round on spot, halt the session on futures)

mod fee_guard;

pub use fee_guard::{FeeDecision, FeeGuard};
