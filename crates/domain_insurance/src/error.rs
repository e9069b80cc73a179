//! Insurance domain errors

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{MoneyError, TemporalError};

/// Errors that can occur in the insurance domain
#[derive(Debug, Error)]
pub enum InsuranceError {
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Claim {claim_number} is {status} and can no longer be modified")]
    ClaimFinalized { claim_number: String, status: String },

    #[error("Bill already has an open insurance claim ({status})")]
    OpenClaimExists { status: String },

    #[error("Approved amount {approved} exceeds claimed amount {claimed}")]
    ApprovedExceedsClaim { approved: Decimal, claimed: Decimal },

    #[error("Policy is referenced by {0} claim(s) and cannot be deleted")]
    PolicyInUse(i64),

    #[error("Provider has {0} polic(ies) and cannot be deleted")]
    ProviderInUse(i64),

    #[error("Document index {0} does not exist on this claim")]
    DocumentNotFound(usize),

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Temporal error: {0}")]
    Temporal(#[from] TemporalError),
}

impl InsuranceError {
    /// Creates a field-keyed validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        InsuranceError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error came from malformed input rather than a business rule
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            InsuranceError::Validation { .. } | InsuranceError::Money(_) | InsuranceError::Temporal(_)
        )
    }
}
