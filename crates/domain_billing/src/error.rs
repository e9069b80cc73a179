//! Billing domain errors

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::MoneyError;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    /// Bill has been voided
    #[error("Bill {0} is voided")]
    BillVoided(String),

    /// Only unpaid bills can be voided
    #[error("Bill has payments totalling {amount_paid} and cannot be voided")]
    BillHasPayments { amount_paid: Decimal },

    #[error("Payment amount {amount} exceeds amount due {amount_due}")]
    PaymentExceedsDue { amount: Decimal, amount_due: Decimal },

    #[error("Payment {0} is already voided")]
    PaymentAlreadyVoided(String),

    #[error("Payment has refunds totalling {refunded} and cannot be voided")]
    PaymentHasRefunds { refunded: Decimal },

    #[error("Payment is {status} and cannot be refunded")]
    PaymentNotRefundable { status: String },

    #[error("Refund amount {requested} exceeds remaining refundable amount {remaining}")]
    RefundExceedsRemaining { requested: Decimal, remaining: Decimal },

    /// Insurance credits follow their claim and are not reversed by hand
    #[error("Payment {0} is an insurance claim credit and cannot be voided or refunded")]
    InsuranceCredit(String),

    /// Payment and bill passed together do not belong to each other
    #[error("Payment {payment} does not belong to bill {bill}")]
    PaymentBillMismatch { payment: String, bill: String },

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),
}

impl BillingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true for malformed input, false for business-rule conflicts
    pub fn is_validation(&self) -> bool {
        matches!(self, BillingError::Validation { .. } | BillingError::Money(_))
    }
}
