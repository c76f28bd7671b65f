//! Transfer State Machine
//!
//! Defines the lifecycle states, events, and transition function for
//! stock transfers between warehouses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transfer lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferStatus {
    /// Submitted, goods not yet confirmed at the destination
    #[serde(alias = "pending")]
    Pending,
    /// Receipt confirmed at the destination (terminal)
    #[serde(alias = "received")]
    Received,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "Pending",
            TransferStatus::Received => "Received",
        }
    }

    /// Check if this is a terminal state (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Received)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" | "pending" => Ok(TransferStatus::Pending),
            "Received" | "received" => Ok(TransferStatus::Received),
            _ => Err(format!("Invalid transfer status: {}", s)),
        }
    }
}

/// Events that drive the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEvent {
    /// Destination confirmed receipt of the goods
    Receive,
}

/// State transition function
///
/// Invalid transitions return the current state (no change).
pub fn transition(current: TransferStatus, event: TransferEvent) -> TransferStatus {
    use TransferEvent::*;
    use TransferStatus::*;

    match (current, event) {
        (Pending, Receive) => Received,
        // Received is terminal
        (Received, _) => current,
    }
}

/// Whether `event` moves a transfer out of `current`
pub fn can_apply(current: TransferStatus, event: TransferEvent) -> bool {
    transition(current, event) != current
}
