//! Billing Domain - Bills, Payments and Refunds
//!
//! This crate holds the bill aggregate and the reconciliation ledger that
//! moves money against it.
//!
//! # Balance Invariant
//!
//! After every mutation a bill satisfies:
//! - `total_amount = sub_total + tax - discount`
//! - `amount_due = total_amount - amount_paid`
//! - `payment_status` is derived from the two (`paid` when nothing is due,
//!   `partial` when something was paid, `pending` otherwise)
//!
//! `amount_paid` always equals completed payments minus refunds; the
//! ledger functions are the only code that changes it.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{ledger, NewPayment, PaymentMethod};
//!
//! let receipt = ledger::record_payment(&mut bill, NewPayment::cash(dec!(100), Some(dec!(120))), &caller)?;
//! assert_eq!(receipt.change_due, dec!(20));
//! ```

pub mod bill;
pub mod payment;
pub mod refund;
pub mod ledger;
pub mod statistics;
pub mod error;

pub use bill::{Bill, BillItem, BillItemInput, BillCharges, BillChargesPatch, PaymentStatus, bill_number};
pub use payment::{Payment, PaymentMethod, PaymentState, NewPayment};
pub use refund::BillRefund;
pub use ledger::PaymentReceipt;
pub use statistics::{PaymentStatistics, BillingSummary};
pub use error::BillingError;
