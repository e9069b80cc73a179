//! Payments against bills

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{BillId, PaymentId, UserId};
use crate::error::BillingError;

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Cheque,
    MobileMoney,
    /// Credit from an approved insurance claim
    Insurance,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Insurance => "insurance",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "cheque" => Ok(PaymentMethod::Cheque),
            "mobile_money" => Ok(PaymentMethod::MobileMoney),
            "insurance" => Ok(PaymentMethod::Insurance),
            other => Err(BillingError::validation(
                "payment_method",
                format!("Unknown payment method '{}'", other),
            )),
        }
    }
}

/// Lifecycle of a payment row; `completed -> voided` is the only transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Completed,
    Voided,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Completed => "completed",
            PaymentState::Voided => "voided",
        }
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentState {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(PaymentState::Completed),
            "voided" => Ok(PaymentState::Voided),
            other => Err(BillingError::validation("status", format!("Unknown payment status '{}'", other))),
        }
    }
}

/// Payment details supplied by the cashier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub amount: Decimal,
    pub method: PaymentMethod,
    /// Cash handed over; only meaningful for cash payments
    pub amount_tendered: Option<Decimal>,
    pub transaction_reference: Option<String>,
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn cash(amount: Decimal, amount_tendered: Option<Decimal>) -> Self {
        Self {
            amount,
            method: PaymentMethod::Cash,
            amount_tendered,
            transaction_reference: None,
            notes: None,
        }
    }

    pub fn with_method(amount: Decimal, method: PaymentMethod, reference: Option<String>) -> Self {
        Self {
            amount,
            method,
            amount_tendered: None,
            transaction_reference: reference,
            notes: None,
        }
    }
}

/// A payment recorded against a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub bill_id: BillId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentState,
    pub amount_tendered: Option<Decimal>,
    pub change_due: Decimal,
    pub transaction_reference: Option<String>,
    pub notes: Option<String>,
    pub received_by: UserId,
    pub payment_date: DateTime<Utc>,
    pub voided_at: Option<DateTime<Utc>>,
    pub voided_by: Option<UserId>,
    pub void_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_voided(&self) -> bool {
        self.status == PaymentState::Voided
    }
}
