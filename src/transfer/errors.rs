// Error types for stock transfers
use std::fmt;

use crate::transfer::types::TransferId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // Validation errors (raised before any remote call)
    MissingField(&'static str),
    InvalidQuantity(i64),
    SameWarehouse(String),

    // Lifecycle errors
    AlreadyReceived(TransferId),
    NotFound(TransferId),

    // Backend rejected the call or the network failed
    OperationFailed { message: String },

    // Local store I/O or codec failure
    Storage(String),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "Missing required field: {}", field),
            Self::InvalidQuantity(qty) => {
                write!(f, "Invalid quantity {}: must be a positive integer", qty)
            }
            Self::SameWarehouse(id) => {
                write!(f, "Source and destination warehouse are the same: {}", id)
            }
            Self::AlreadyReceived(id) => write!(f, "Transfer {} already received", id),
            Self::NotFound(id) => write!(f, "Transfer {} not found", id),
            Self::OperationFailed { message } => write!(f, "Operation failed: {}", message),
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for TransferError {}

impl TransferError {
    pub fn operation_failed(message: impl Into<String>) -> Self {
        Self::OperationFailed {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::InvalidQuantity(_) => "INVALID_QUANTITY",
            Self::SameWarehouse(_) => "SAME_WAREHOUSE",
            Self::AlreadyReceived(_) => "ALREADY_RECEIVED",
            Self::NotFound(_) => "TRANSFER_NOT_FOUND",
            Self::OperationFailed { .. } => "OPERATION_FAILED",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// True for errors raised by client-side validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_) | Self::InvalidQuantity(_) | Self::SameWarehouse(_)
        )
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        Self::operation_failed(err.to_string())
    }
}

impl From<sled::Error> for TransferError {
    fn from(err: sled::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("codec: {}", err))
    }
}
