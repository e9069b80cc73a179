//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use proptest::prelude::*;
use rust_decimal::Decimal;

use domain_billing::{BillCharges, BillItemInput, PaymentMethod};
use domain_insurance::InsurancePolicy;

use crate::builders::PolicyBuilder;

/// Non-negative money amounts with two decimal places, up to 1,000,000
pub fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strictly positive money amounts
pub fn positive_amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Percentages between 0 and 100 with two decimal places
pub fn percentage_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|n| Decimal::new(n, 2))
}

/// Payment methods a cashier can record by hand
pub fn cashier_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::Card),
        Just(PaymentMethod::BankTransfer),
        Just(PaymentMethod::Cheque),
        Just(PaymentMethod::MobileMoney),
    ]
}

/// Bill charges whose discount never exceeds sub-total plus tax
pub fn charges_strategy() -> impl Strategy<Value = BillCharges> {
    (positive_amount_strategy(), amount_strategy(), 0u32..=100u32).prop_map(
        |(sub_total, tax, discount_pct)| {
            let discount = ((sub_total + tax) * Decimal::new(discount_pct as i64, 2)).round_dp(2);
            BillCharges { sub_total, tax, discount, items: Vec::new() }
        },
    )
}

/// Itemized charges with one to five lines
pub fn itemized_charges_strategy() -> impl Strategy<Value = BillCharges> {
    proptest::collection::vec((1i32..20i32, positive_amount_strategy()), 1..=5).prop_map(|lines| {
        let items = lines
            .into_iter()
            .enumerate()
            .map(|(i, (quantity, unit_price))| BillItemInput {
                description: format!("Service {}", i + 1),
                quantity,
                unit_price: unit_price.min(Decimal::new(100_000, 2)),
            })
            .collect();
        BillCharges { sub_total: Decimal::ZERO, tax: Decimal::ZERO, discount: Decimal::ZERO, items }
    })
}

/// Active policies with arbitrary cost-sharing and consumption
///
/// Covers fixed and percentage co-pays, uncapped plans and plans already
/// past their annual cap.
pub fn policy_strategy() -> impl Strategy<Value = InsurancePolicy> {
    (
        amount_strategy(),
        0u32..=100u32,
        prop_oneof![Just(Decimal::ZERO), amount_strategy()],
        percentage_strategy(),
        prop::option::of(amount_strategy()),
        0u32..=120u32,
    )
        .prop_map(|(deductible, met_pct, fixed_co_pay, co_pay_pct, cap, used_pct)| {
            let met = (deductible * Decimal::new(met_pct as i64, 2)).round_dp(2);
            let used = cap
                .map(|c| (c * Decimal::new(used_pct as i64, 2)).round_dp(2))
                .unwrap_or(Decimal::ZERO);
            PolicyBuilder::new()
                .with_deductible(deductible, met)
                .with_fixed_co_pay(fixed_co_pay)
                .with_co_pay_percentage(co_pay_pct)
                .with_annual_limit(cap, used)
                .build()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::{assert_bill_balanced, assert_coverage_conserved, assert_within_annual_limit};
    use crate::builders::BillBuilder;
    use domain_insurance::calculate_coverage;

    proptest! {
        #[test]
        fn coverage_splits_the_whole_charge(charge in amount_strategy(), policy in policy_strategy()) {
            let breakdown = calculate_coverage(charge, &policy).unwrap();
            assert_coverage_conserved(&breakdown);
            assert_within_annual_limit(&breakdown, &policy);
            prop_assert!(breakdown.deductible_applied <= policy.deductible_remaining());
        }

        #[test]
        fn generated_bills_are_balanced(charges in charges_strategy()) {
            let bill = BillBuilder::new()
                .with_amounts(charges.sub_total, charges.tax, charges.discount)
                .build();
            assert_bill_balanced(&bill);
            prop_assert!(bill.total_amount >= Decimal::ZERO);
        }

        #[test]
        fn itemized_sub_total_is_sum_of_lines(charges in itemized_charges_strategy()) {
            let expected: Decimal = charges
                .items
                .iter()
                .map(|i| i.unit_price * Decimal::from(i.quantity))
                .sum();
            let mut builder = BillBuilder::new().with_amounts(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
            for item in &charges.items {
                builder = builder.with_item(&item.description, item.quantity, item.unit_price);
            }
            let bill = builder.build();
            prop_assert_eq!(bill.sub_total, expected);
        }
    }
}
