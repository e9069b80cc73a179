//! Refunds against completed payments

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{BillId, PaymentId, RefundId, UserId};

/// An immutable refund row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillRefund {
    pub id: RefundId,
    pub payment_id: PaymentId,
    pub bill_id: BillId,
    pub refund_amount: Decimal,
    pub reason: String,
    pub requested_by: UserId,
    pub approved_by: UserId,
    pub processed_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Sum of refunds already recorded for a payment
pub fn total_refunded<'a>(refunds: impl IntoIterator<Item = &'a BillRefund>) -> Decimal {
    refunds.into_iter().map(|r| r.refund_amount).sum()
}
