//! Custom Test Assertions
//!
//! Domain-aware assertions that print the offending record instead of a
//! bare `false`.

use rust_decimal::Decimal;

use domain_billing::{Bill, PaymentStatus};
use domain_insurance::{CoverageBreakdown, InsurancePolicy};
use domain_pharmacy::{Medicine, StockMovement};

/// Asserts that a bill's derived fields agree with its amounts
pub fn assert_bill_balanced(bill: &Bill) {
    assert_eq!(
        bill.total_amount,
        bill.sub_total + bill.tax - bill.discount,
        "{}: total {} != sub_total {} + tax {} - discount {}",
        bill.bill_number,
        bill.total_amount,
        bill.sub_total,
        bill.tax,
        bill.discount
    );
    assert_eq!(
        bill.amount_due,
        bill.total_amount - bill.amount_paid,
        "{}: amount_due {} != total {} - paid {}",
        bill.bill_number,
        bill.amount_due,
        bill.total_amount,
        bill.amount_paid
    );
    assert_eq!(
        bill.payment_status,
        PaymentStatus::derive(bill.total_amount, bill.amount_due),
        "{}: status does not match amounts",
        bill.bill_number
    );
}

/// Asserts a bill's paid/due figures and that it stays balanced
pub fn assert_bill_amounts(bill: &Bill, paid: Decimal, due: Decimal, status: PaymentStatus) {
    assert_eq!(bill.amount_paid, paid, "{}: amount_paid", bill.bill_number);
    assert_eq!(bill.amount_due, due, "{}: amount_due", bill.bill_number);
    assert_eq!(bill.payment_status, status, "{}: payment_status", bill.bill_number);
    assert_bill_balanced(bill);
}

/// Asserts the insurer and patient shares add back up to the charge
pub fn assert_coverage_conserved(breakdown: &CoverageBreakdown) {
    assert_eq!(
        breakdown.insurance_coverage + breakdown.patient_responsibility,
        breakdown.charge_amount,
        "coverage {} + patient {} != charge {}",
        breakdown.insurance_coverage,
        breakdown.patient_responsibility,
        breakdown.charge_amount
    );
    assert!(
        breakdown.insurance_coverage >= Decimal::ZERO,
        "negative insurer share {}",
        breakdown.insurance_coverage
    );
    assert!(
        breakdown.patient_responsibility >= Decimal::ZERO,
        "negative patient share {}",
        breakdown.patient_responsibility
    );
}

/// Asserts that the insurer share respects the policy's remaining annual cap
pub fn assert_within_annual_limit(breakdown: &CoverageBreakdown, policy: &InsurancePolicy) {
    if let Some(remaining) = policy.annual_remaining() {
        assert!(
            breakdown.insurance_coverage <= remaining.max(Decimal::ZERO),
            "insurer share {} exceeds remaining annual limit {}",
            breakdown.insurance_coverage,
            remaining
        );
    }
}

/// Asserts that stock equals the opening quantity plus every movement
pub fn assert_stock_reconciles(medicine: &Medicine, opening: i32, movements: &[StockMovement]) {
    let net: i32 = movements
        .iter()
        .filter(|m| m.medicine_id == medicine.id)
        .map(|m| m.quantity_change)
        .sum();
    assert_eq!(
        medicine.stock_quantity,
        opening + net,
        "{}: stock {} != opening {} + movements {}",
        medicine.sku,
        medicine.stock_quantity,
        opening,
        net
    );
}
