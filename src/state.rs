//! State management module - the relay's detection record
//!
//! Holds the latest directional command posted by the vision frontend and
//! polled by the motor controller. One record, one lock, last writer wins.

mod clock;
mod store;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{ResetOutcome, StateStore};
pub use types::{http_date, iso_timestamp, DetectionState, Position, PositionReport};
