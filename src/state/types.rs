//! Detection state types
//!
//! Defines the directional command sent to the motor controller and the
//! single detection record the relay keeps in memory.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::RelayError;

/// Directional command polled by the motor controller
///
/// `Left`, `Right` and `Center` are active states; `Stop` is the safe idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Left,
    Right,
    Center,
    Stop,
}

impl Position {
    /// All accepted positions, in the order they are listed to clients
    pub const ALL: [Position; 4] = [
        Position::Left,
        Position::Right,
        Position::Center,
        Position::Stop,
    ];

    /// Wire name of the position
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Left => "LEFT",
            Position::Right => "RIGHT",
            Position::Center => "CENTER",
            Position::Stop => "STOP",
        }
    }

    /// True for any position that drives the motors
    pub fn is_active(&self) -> bool {
        *self != Position::Stop
    }

    /// Error message listing the valid values, e.g.
    /// `Invalid position. Must be one of: ['LEFT', 'RIGHT', 'CENTER', 'STOP']`
    pub fn invalid_message() -> String {
        let names: Vec<String> = Self::ALL
            .iter()
            .map(|p| format!("'{}'", p.as_str()))
            .collect();
        format!("Invalid position. Must be one of: [{}]", names.join(", "))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = RelayError;

    /// Case-insensitive parse; input is uppercased before matching
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LEFT" => Ok(Position::Left),
            "RIGHT" => Ok(Position::Right),
            "CENTER" => Ok(Position::Center),
            "STOP" => Ok(Position::Stop),
            _ => Err(RelayError::invalid(Position::invalid_message())),
        }
    }
}

/// The relay's single detection/command record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionState {
    pub position: Position,
    /// Producer certainty, stored as given (not range-checked)
    pub confidence: f64,
    pub object_detected: bool,
    /// ISO-8601 local time of the last mutation, watchdog resets included
    pub timestamp: String,
    /// Time of the last external write; never set by the watchdog
    #[serde(serialize_with = "serialize_http_date")]
    pub last_update: Option<DateTime<Local>>,
}

impl DetectionState {
    /// Startup record: STOP, nothing detected, never updated
    pub fn initial(now: DateTime<Local>) -> Self {
        Self {
            position: Position::Stop,
            confidence: 0.0,
            object_detected: false,
            timestamp: iso_timestamp(&now),
            last_update: None,
        }
    }

    /// The subset of the record the motor controller polls
    pub fn position_report(&self) -> PositionReport {
        PositionReport {
            position: self.position,
            timestamp: self.timestamp.clone(),
            object_detected: self.object_detected,
        }
    }
}

/// Response body for `GET /api/position`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionReport {
    pub position: Position,
    pub timestamp: String,
    pub object_detected: bool,
}

/// Format a wall-clock time as ISO-8601 local time with microseconds
pub fn iso_timestamp(dt: &DateTime<Local>) -> String {
    dt.naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Format a wall-clock time as an HTTP date (`Sat, 18 Oct 2026 10:00:00 GMT`)
pub fn http_date(dt: &DateTime<Local>) -> String {
    dt.with_timezone(&Utc)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn serialize_http_date<S>(value: &Option<DateTime<Local>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(dt) => serializer.serialize_str(&http_date(dt)),
        None => serializer.serialize_none(),
    }
}
