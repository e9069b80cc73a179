//! Pharmacy domain errors

use thiserror::Error;

/// Errors that can occur in the pharmacy domain
#[derive(Debug, Error)]
pub enum PharmacyError {
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Medicine not found: {0}")]
    MedicineNotFound(String),

    #[error("Insufficient stock for {medicine}: requested {requested}, available {available}")]
    InsufficientStock {
        medicine: String,
        requested: i32,
        available: i32,
    },

    /// Receiving would push stock past what the column can hold
    #[error("Receiving {quantity} of {medicine} would exceed the stock limit")]
    StockLimitExceeded { medicine: String, quantity: i32 },

    #[error("Invalid purchase status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    /// Cancelling a received purchase would leave negative stock
    #[error("Cannot reverse {quantity} of {medicine}: only {on_hand} on hand")]
    ReversalExceedsStock {
        medicine: String,
        quantity: i32,
        on_hand: i32,
    },
}

impl PharmacyError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PharmacyError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, PharmacyError::Validation { .. })
    }
}
