//! Read-side figures for payments and bills

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::PaymentId;
use crate::bill::{Bill, PaymentStatus};
use crate::payment::Payment;
use crate::refund::{total_refunded, BillRefund};

/// Refund position of a single payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatistics {
    pub payment_id: PaymentId,
    pub amount: Decimal,
    pub total_refunded: Decimal,
    pub remaining_refundable: Decimal,
    pub refund_count: usize,
    pub is_voided: bool,
    pub is_fully_refunded: bool,
}

impl PaymentStatistics {
    pub fn compute(payment: &Payment, refunds: &[BillRefund]) -> Self {
        let refunded = total_refunded(refunds);
        let remaining = if payment.is_voided() {
            Decimal::ZERO
        } else {
            (payment.amount - refunded).max(Decimal::ZERO)
        };
        Self {
            payment_id: payment.id,
            amount: payment.amount,
            total_refunded: refunded,
            remaining_refundable: remaining,
            refund_count: refunds.len(),
            is_voided: payment.is_voided(),
            is_fully_refunded: refunded >= payment.amount,
        }
    }
}

/// Totals over non-voided bills
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSummary {
    pub bill_count: i64,
    pub total_billed: Decimal,
    pub total_collected: Decimal,
    pub total_outstanding: Decimal,
    pub pending_count: i64,
    pub partial_count: i64,
    pub paid_count: i64,
}

impl BillingSummary {
    /// Folds bills into a summary, skipping voided ones
    pub fn from_bills<'a>(bills: impl IntoIterator<Item = &'a Bill>) -> Self {
        bills
            .into_iter()
            .filter(|b| !b.is_voided())
            .fold(Self::default(), |mut acc, bill| {
                acc.bill_count += 1;
                acc.total_billed += bill.total_amount;
                acc.total_collected += bill.amount_paid;
                acc.total_outstanding += bill.amount_due.max(Decimal::ZERO);
                match bill.payment_status {
                    PaymentStatus::Pending => acc.pending_count += 1,
                    PaymentStatus::Partial => acc.partial_count += 1,
                    PaymentStatus::Paid => acc.paid_count += 1,
                }
                acc
            })
    }
}
