//! Bill aggregate
//!
//! A bill is the invoice for one patient encounter. Its derived fields
//! (`total_amount`, `amount_due`, `payment_status`) are never set directly:
//! every mutation goes through [`Bill::recalculate`].

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    BillId, BillItemId, Caller, DoctorId, PatientId, UserId,
    money::{checked_total, ensure_non_negative, ensure_storable, line_total, round_money},
};
use crate::error::BillingError;

/// Formats a bill number: `BILL<year><5-digit sequence>`
pub fn bill_number(year: i32, sequence: i64) -> String {
    format!("BILL{}{:05}", year, sequence)
}

/// Derived label summarizing how much of a bill has been paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
}

impl PaymentStatus {
    /// Derives the label from the bill totals
    pub fn derive(total_amount: Decimal, amount_due: Decimal) -> Self {
        if amount_due <= Decimal::ZERO {
            PaymentStatus::Paid
        } else if amount_due < total_amount {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "partial" => Ok(PaymentStatus::Partial),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(BillingError::validation(
                "payment_status",
                format!("Unknown payment status '{}'", other),
            )),
        }
    }
}

/// A line on a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillItem {
    pub id: BillItemId,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Line item as supplied by a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillItemInput {
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl BillItemInput {
    fn into_item(self, index: usize) -> Result<BillItem, BillingError> {
        let field = |name: &str| format!("items.{}.{}", index, name);
        if self.description.trim().is_empty() {
            return Err(BillingError::validation(field("description"), "Description is required"));
        }
        if self.quantity < 1 {
            return Err(BillingError::validation(field("quantity"), "Quantity must be at least 1"));
        }
        let unit_price = ensure_non_negative(round_money(self.unit_price))
            .map_err(|e| BillingError::validation(field("unit_price"), e.to_string()))?;
        let line_total = line_total(unit_price, self.quantity)
            .map_err(|e| BillingError::validation(field("quantity"), e.to_string()))?;

        Ok(BillItem {
            id: BillItemId::new_v7(),
            description: self.description.trim().to_string(),
            quantity: self.quantity,
            unit_price,
            line_total,
        })
    }
}

/// The chargeable part of a bill, as supplied on create or update
///
/// When `items` is non-empty the sub-total is their sum and `sub_total`
/// is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillCharges {
    pub sub_total: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub items: Vec<BillItemInput>,
}

/// A partial edit of a bill's charges; absent fields keep their stored values
///
/// `items: Some(vec![])` removes every stored item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillChargesPatch {
    pub sub_total: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub items: Option<Vec<BillItemInput>>,
}

impl BillChargesPatch {
    /// Merges the edit over the charges currently stored on `bill`
    pub fn merge(self, bill: &Bill) -> BillCharges {
        let items = self.items.unwrap_or_else(|| {
            bill.items
                .iter()
                .map(|i| BillItemInput {
                    description: i.description.clone(),
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                })
                .collect()
        });
        BillCharges {
            sub_total: self.sub_total.unwrap_or(bill.sub_total),
            discount: self.discount.unwrap_or(bill.discount),
            tax: self.tax.unwrap_or(bill.tax),
            items,
        }
    }
}

/// The invoice for one patient encounter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub bill_number: String,
    pub patient_id: PatientId,
    pub doctor_id: Option<DoctorId>,
    pub bill_date: NaiveDate,
    pub items: Vec<BillItem>,
    pub sub_total: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub voided_at: Option<DateTime<Utc>>,
    pub voided_by: Option<UserId>,
    pub void_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// Creates a bill from validated charges
    ///
    /// # Arguments
    ///
    /// * `bill_number` - Number reserved from the yearly sequence
    /// * `patient_id` - Billed patient
    /// * `doctor_id` - Attending doctor, if any
    /// * `charges` - Sub-total or items, discount and tax
    /// * `caller` - Stamped as `created_by`
    pub fn create(
        bill_number: String,
        patient_id: PatientId,
        doctor_id: Option<DoctorId>,
        charges: BillCharges,
        notes: Option<String>,
        caller: &Caller,
    ) -> Result<Self, BillingError> {
        Self::create_at(Utc::now(), bill_number, patient_id, doctor_id, charges, notes, caller)
    }

    /// Creates a bill dated `now`; the bill number must come from the same year
    pub fn create_at(
        now: DateTime<Utc>,
        bill_number: String,
        patient_id: PatientId,
        doctor_id: Option<DoctorId>,
        charges: BillCharges,
        notes: Option<String>,
        caller: &Caller,
    ) -> Result<Self, BillingError> {
        let mut bill = Self {
            id: BillId::new_v7(),
            bill_number,
            patient_id,
            doctor_id,
            bill_date: now.date_naive(),
            items: Vec::new(),
            sub_total: Decimal::ZERO,
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            amount_paid: Decimal::ZERO,
            amount_due: Decimal::ZERO,
            payment_status: PaymentStatus::Pending,
            notes,
            created_by: caller.user_id,
            voided_at: None,
            voided_by: None,
            void_reason: None,
            created_at: now,
            updated_at: now,
        };
        bill.set_charges(charges)?;
        Ok(bill)
    }

    /// Replaces the charges of an open bill
    pub fn update_charges(&mut self, charges: BillCharges) -> Result<(), BillingError> {
        self.ensure_open()?;
        self.set_charges(charges)
    }

    /// Applies a partial edit over the stored charges of an open bill
    pub fn patch_charges(&mut self, patch: BillChargesPatch) -> Result<(), BillingError> {
        let charges = patch.merge(self);
        self.update_charges(charges)
    }

    fn set_charges(&mut self, charges: BillCharges) -> Result<(), BillingError> {
        let discount = ensure_non_negative(round_money(charges.discount))
            .map_err(|e| BillingError::validation("discount", e.to_string()))?;
        let tax = ensure_non_negative(round_money(charges.tax))
            .map_err(|e| BillingError::validation("tax", e.to_string()))?;

        let (items, sub_total) = if charges.items.is_empty() {
            let sub_total = ensure_non_negative(round_money(charges.sub_total))
                .map_err(|e| BillingError::validation("sub_total", e.to_string()))?;
            (Vec::new(), sub_total)
        } else {
            let items = charges
                .items
                .into_iter()
                .enumerate()
                .map(|(i, item)| item.into_item(i))
                .collect::<Result<Vec<_>, _>>()?;
            let sub_total = checked_total(items.iter().map(|i| i.line_total))
                .map_err(|e| BillingError::validation("items", e.to_string()))?;
            (items, sub_total)
        };

        let total = sub_total + tax - discount;
        if total < Decimal::ZERO {
            return Err(BillingError::validation("discount", "Discount exceeds sub-total plus tax"));
        }
        ensure_storable(total).map_err(|e| BillingError::validation("total_amount", e.to_string()))?;

        self.items = items;
        self.sub_total = sub_total;
        self.discount = discount;
        self.tax = tax;
        self.recalculate();
        Ok(())
    }

    /// Recomputes every derived field from the stored amounts
    pub fn recalculate(&mut self) {
        self.total_amount = self.sub_total + self.tax - self.discount;
        self.amount_due = self.total_amount - self.amount_paid;
        self.payment_status = PaymentStatus::derive(self.total_amount, self.amount_due);
        self.updated_at = Utc::now();
    }

    /// Moves `amount_paid` by `delta` and recomputes; ledger use only
    pub(crate) fn apply_paid_delta(&mut self, delta: Decimal) {
        self.amount_paid += delta;
        self.recalculate();
    }

    pub fn is_voided(&self) -> bool {
        self.voided_at.is_some()
    }

    pub fn ensure_open(&self) -> Result<(), BillingError> {
        if self.is_voided() {
            return Err(BillingError::BillVoided(self.bill_number.clone()));
        }
        Ok(())
    }

    /// Voids an unpaid bill
    pub fn void(&mut self, reason: Option<String>, caller: &Caller) -> Result<(), BillingError> {
        self.ensure_open()?;
        if !self.amount_paid.is_zero() {
            return Err(BillingError::BillHasPayments { amount_paid: self.amount_paid });
        }
        let now = Utc::now();
        self.voided_at = Some(now);
        self.voided_by = Some(caller.user_id);
        self.void_reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        self.updated_at = now;
        Ok(())
    }

    /// True when the stored derived fields agree with the amounts
    pub fn is_balanced(&self) -> bool {
        self.total_amount == self.sub_total + self.tax - self.discount
            && self.amount_due == self.total_amount - self.amount_paid
            && self.payment_status == PaymentStatus::derive(self.total_amount, self.amount_due)
    }
}
