//! Payment and refund ledger
//!
//! The functions here are the only code that moves `Bill::amount_paid`.
//! Each one validates against the current rows, mutates the bill and the
//! payment in memory, and returns the new rows to persist. Persistence
//! wraps every call in one transaction holding row locks on the bill and
//! payment, so the checks below see a stable balance.
//!
//! # Invariants
//!
//! - `amount_paid` = completed payments - refunds
//! - A payment is voided at most once and never after a refund
//! - Refunds on a payment never exceed its amount
//! - Insurance credits are never voided or refunded

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::{
    Caller, PaymentId, RefundId,
    money::{ensure_positive, round_money},
};
use crate::bill::Bill;
use crate::error::BillingError;
use crate::payment::{NewPayment, Payment, PaymentMethod, PaymentState};
use crate::refund::BillRefund;

/// Minimum length of a void reason
pub const MIN_VOID_REASON_LEN: usize = 10;

/// Outcome of recording a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub change_due: Decimal,
}

fn ensure_same_bill(bill: &Bill, payment: &Payment) -> Result<(), BillingError> {
    if payment.bill_id != bill.id {
        return Err(BillingError::PaymentBillMismatch {
            payment: payment.id.to_string(),
            bill: bill.id.to_string(),
        });
    }
    Ok(())
}

fn ensure_manual(payment: &Payment) -> Result<(), BillingError> {
    if payment.method == PaymentMethod::Insurance {
        return Err(BillingError::InsuranceCredit(payment.id.to_string()));
    }
    Ok(())
}

/// Records a payment against an open bill
///
/// # Errors
///
/// - `Validation` for a non-positive amount or cash tendered below the amount
/// - `BillVoided` when the bill is voided
/// - `PaymentExceedsDue` when the amount is larger than what is owed
pub fn record_payment(
    bill: &mut Bill,
    input: NewPayment,
    caller: &Caller,
) -> Result<PaymentReceipt, BillingError> {
    let amount = ensure_positive(round_money(input.amount))
        .map_err(|e| BillingError::validation("amount", e.to_string()))?;
    bill.ensure_open()?;
    if amount > bill.amount_due {
        return Err(BillingError::PaymentExceedsDue { amount, amount_due: bill.amount_due });
    }

    let amount_tendered = input
        .amount_tendered
        .map(|t| ensure_positive(round_money(t)))
        .transpose()
        .map_err(|e| BillingError::validation("amount_tendered", e.to_string()))?;
    let change_due = match (input.method, amount_tendered) {
        (PaymentMethod::Cash, Some(tendered)) if tendered < amount => {
            return Err(BillingError::validation(
                "amount_tendered",
                "Amount tendered is less than the payment amount",
            ));
        }
        (PaymentMethod::Cash, Some(tendered)) => tendered - amount,
        _ => Decimal::ZERO,
    };

    let now = Utc::now();
    let payment = Payment {
        id: PaymentId::new_v7(),
        bill_id: bill.id,
        amount,
        method: input.method,
        status: PaymentState::Completed,
        amount_tendered,
        change_due,
        transaction_reference: input.transaction_reference,
        notes: input.notes,
        received_by: caller.user_id,
        payment_date: now,
        voided_at: None,
        voided_by: None,
        void_reason: None,
        created_at: now,
    };

    bill.apply_paid_delta(amount);
    debug!(bill = %bill.bill_number, %amount, due = %bill.amount_due, "payment applied");

    Ok(PaymentReceipt { payment, change_due })
}

/// Voids a completed payment and reverses it on the bill
///
/// `refunded` is the sum of refunds already recorded for the payment.
pub fn void_payment(
    bill: &mut Bill,
    payment: &mut Payment,
    refunded: Decimal,
    reason: &str,
    caller: &Caller,
) -> Result<(), BillingError> {
    let reason = reason.trim();
    if reason.chars().count() < MIN_VOID_REASON_LEN {
        return Err(BillingError::validation(
            "reason",
            format!("Void reason must be at least {} characters", MIN_VOID_REASON_LEN),
        ));
    }
    ensure_same_bill(bill, payment)?;
    ensure_manual(payment)?;
    if payment.is_voided() {
        return Err(BillingError::PaymentAlreadyVoided(payment.id.to_string()));
    }
    if refunded > Decimal::ZERO {
        return Err(BillingError::PaymentHasRefunds { refunded });
    }
    bill.ensure_open()?;

    let now = Utc::now();
    payment.status = PaymentState::Voided;
    payment.voided_at = Some(now);
    payment.voided_by = Some(caller.user_id);
    payment.void_reason = Some(reason.to_string());

    bill.apply_paid_delta(-payment.amount);
    debug!(bill = %bill.bill_number, payment = %payment.id, "payment voided");
    Ok(())
}

/// Refunds part or all of a completed payment
///
/// `refunded` is the sum of refunds already recorded for the payment.
pub fn refund_payment(
    bill: &mut Bill,
    payment: &Payment,
    refunded: Decimal,
    amount: Decimal,
    reason: &str,
    caller: &Caller,
) -> Result<BillRefund, BillingError> {
    let amount = ensure_positive(round_money(amount))
        .map_err(|e| BillingError::validation("refund_amount", e.to_string()))?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(BillingError::validation("reason", "Refund reason is required"));
    }
    ensure_same_bill(bill, payment)?;
    ensure_manual(payment)?;
    if payment.status != PaymentState::Completed {
        return Err(BillingError::PaymentNotRefundable { status: payment.status.to_string() });
    }
    bill.ensure_open()?;

    let remaining = payment.amount - refunded;
    if amount > remaining {
        return Err(BillingError::RefundExceedsRemaining { requested: amount, remaining });
    }

    bill.apply_paid_delta(-amount);
    debug!(bill = %bill.bill_number, payment = %payment.id, %amount, "refund applied");

    Ok(BillRefund {
        id: RefundId::new_v7(),
        payment_id: payment.id,
        bill_id: bill.id,
        refund_amount: amount,
        reason: reason.to_string(),
        requested_by: caller.user_id,
        approved_by: caller.user_id,
        processed_by: caller.user_id,
        created_at: Utc::now(),
    })
}

/// Credits an approved insurance claim to its bill
///
/// The credit is `min(approved_amount, amount_due)` and is recorded as an
/// insurance payment referencing the claim number. Returns `None` when
/// nothing is owed.
pub fn settle_insurance_claim(
    bill: &mut Bill,
    claim_number: &str,
    approved_amount: Decimal,
    caller: &Caller,
) -> Result<Option<Payment>, BillingError> {
    bill.ensure_open()?;
    let credit = round_money(approved_amount).min(bill.amount_due);
    if credit <= Decimal::ZERO {
        return Ok(None);
    }

    let input = NewPayment {
        amount: credit,
        method: PaymentMethod::Insurance,
        amount_tendered: None,
        transaction_reference: Some(claim_number.to_string()),
        notes: Some(format!("Insurance claim {} approved for {}", claim_number, approved_amount)),
    };
    record_payment(bill, input, caller).map(|receipt| Some(receipt.payment))
}
