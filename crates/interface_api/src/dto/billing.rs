//! Billing DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_billing::{Bill, BillCharges, BillChargesPatch, BillItemInput, BillRefund, Payment};

#[derive(Debug, Deserialize, Validate)]
pub struct BillItemRequest {
    #[validate(length(min = 1, max = 255, message = "Description is required"))]
    pub description: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl From<BillItemRequest> for BillItemInput {
    fn from(item: BillItemRequest) -> Self {
        BillItemInput { description: item.description, quantity: item.quantity, unit_price: item.unit_price }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBillRequest {
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    /// Ignored when `items` is non-empty
    #[serde(default)]
    pub sub_total: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<BillItemRequest>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl CreateBillRequest {
    pub fn charges(&mut self) -> BillCharges {
        BillCharges {
            sub_total: self.sub_total,
            discount: self.discount,
            tax: self.tax,
            items: std::mem::take(&mut self.items).into_iter().map(Into::into).collect(),
        }
    }
}

/// Edit of an open bill; absent fields keep their stored values
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBillRequest {
    pub doctor_id: Option<Uuid>,
    pub sub_total: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub tax: Option<Decimal>,
    /// Replaces every stored item when present; an empty list removes them
    pub items: Option<Vec<BillItemRequest>>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl UpdateBillRequest {
    /// The charge fields of the edit; merged over the bill once it is locked
    pub fn patch(&mut self) -> BillChargesPatch {
        BillChargesPatch {
            sub_total: self.sub_total,
            discount: self.discount,
            tax: self.tax,
            items: self.items.take().map(|items| items.into_iter().map(Into::into).collect()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListBillsQuery {
    pub patient_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct VoidBillQuery {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
    pub amount_tendered: Option<Decimal>,
    #[validate(length(max = 100))]
    pub transaction_reference: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VoidPaymentRequest {
    #[validate(length(min = 10, max = 500, message = "Void reason must be at least 10 characters"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundPaymentRequest {
    pub refund_amount: Decimal,
    #[validate(length(min = 1, max = 500, message = "Refund reason is required"))]
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub payment: Payment,
    pub change_due: Decimal,
    pub bill: Bill,
}

#[derive(Debug, Serialize)]
pub struct VoidPaymentResponse {
    pub payment: Payment,
    pub bill: Bill,
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub refund: BillRefund,
    pub bill: Bill,
}
