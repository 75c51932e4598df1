//! Vest relay
//!
//! Relays directional commands from a vision frontend to an ESP32 motor
//! controller. The frontend posts detections, the controller polls the latest
//! one, and a watchdog drops the motors back to STOP when the frontend goes
//! quiet.

pub mod api;
pub mod config;
pub mod error;
pub mod state;
pub mod watchdog;

pub use config::AppConfig;
pub use error::{RelayError, RelayResult};
pub use state::{DetectionState, Position, StateStore};
pub use watchdog::{Watchdog, WatchdogHandle};
