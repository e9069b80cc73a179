//! Comprehensive tests for domain_billing

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{Caller, PatientId, UserId};

use domain_billing::bill::{bill_number, Bill, BillCharges, PaymentStatus};
use domain_billing::ledger::{record_payment, refund_payment, settle_insurance_claim, void_payment};
use domain_billing::payment::{NewPayment, PaymentMethod, PaymentState};
use domain_billing::refund::total_refunded;
use domain_billing::statistics::{BillingSummary, PaymentStatistics};
use domain_billing::BillingError;

fn caller() -> Caller {
    Caller::admin(UserId::new_v7())
}

fn bill(sub_total: Decimal, tax: Decimal, discount: Decimal, caller: &Caller) -> Bill {
    Bill::create(
        bill_number(2024, 1),
        PatientId::new_v7(),
        None,
        BillCharges { sub_total, tax, discount, items: vec![] },
        None,
        caller,
    )
    .unwrap()
}

// ============================================================================
// Payment Tests
// ============================================================================

mod payment_tests {
    use super::*;

    #[test]
    fn test_full_payment_marks_bill_paid() {
        let caller = caller();
        let mut bill = bill(dec!(200), dec!(20), dec!(10), &caller);
        assert_eq!(bill.total_amount, dec!(210));

        record_payment(&mut bill, NewPayment::cash(dec!(210), None), &caller).unwrap();

        assert_eq!(bill.amount_due, dec!(0));
        assert_eq!(bill.payment_status, PaymentStatus::Paid);
        assert!(bill.is_balanced());
    }

    #[test]
    fn test_partial_payment_then_void() {
        let caller = caller();
        let mut bill = bill(dec!(200), dec!(20), dec!(10), &caller);

        let mut payment = record_payment(&mut bill, NewPayment::cash(dec!(100), None), &caller)
            .unwrap()
            .payment;
        assert_eq!(bill.amount_due, dec!(110));
        assert_eq!(bill.payment_status, PaymentStatus::Partial);

        void_payment(&mut bill, &mut payment, dec!(0), "Entered against wrong patient", &caller).unwrap();

        assert_eq!(payment.status, PaymentState::Voided);
        assert_eq!(payment.voided_by, Some(caller.user_id));
        assert_eq!(bill.amount_paid, dec!(0));
        assert_eq!(bill.amount_due, dec!(210));
        assert_eq!(bill.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_second_void_fails_without_double_reversal() {
        let caller = caller();
        let mut bill = bill(dec!(300), dec!(0), dec!(0), &caller);
        record_payment(&mut bill, NewPayment::cash(dec!(50), None), &caller).unwrap();
        let mut payment = record_payment(&mut bill, NewPayment::cash(dec!(100), None), &caller)
            .unwrap()
            .payment;

        void_payment(&mut bill, &mut payment, dec!(0), "Card terminal double charge", &caller).unwrap();
        let err = void_payment(&mut bill, &mut payment, dec!(0), "Card terminal double charge", &caller)
            .unwrap_err();

        assert!(matches!(err, BillingError::PaymentAlreadyVoided(_)));
        assert_eq!(bill.amount_paid, dec!(50));
    }

    #[test]
    fn test_void_requires_reason_and_no_refunds() {
        let caller = caller();
        let mut bill = bill(dec!(100), dec!(0), dec!(0), &caller);
        let mut payment = record_payment(&mut bill, NewPayment::cash(dec!(100), None), &caller)
            .unwrap()
            .payment;

        assert!(void_payment(&mut bill, &mut payment, dec!(0), "oops", &caller)
            .unwrap_err()
            .is_validation());
        assert!(matches!(
            void_payment(&mut bill, &mut payment, dec!(5), "Customer disputed charge", &caller),
            Err(BillingError::PaymentHasRefunds { .. })
        ));
    }

    #[test]
    fn test_payment_rejections() {
        let caller = caller();
        let mut bill = bill(dec!(100), dec!(0), dec!(0), &caller);

        assert!(record_payment(&mut bill, NewPayment::cash(dec!(0), None), &caller)
            .unwrap_err()
            .is_validation());
        assert!(matches!(
            record_payment(&mut bill, NewPayment::cash(dec!(100.01), None), &caller),
            Err(BillingError::PaymentExceedsDue { .. })
        ));

        bill.void(None, &caller).unwrap();
        assert!(matches!(
            record_payment(&mut bill, NewPayment::cash(dec!(10), None), &caller),
            Err(BillingError::BillVoided(_))
        ));
    }

    #[test]
    fn test_card_payment_has_no_change() {
        let caller = caller();
        let mut bill = bill(dec!(100), dec!(0), dec!(0), &caller);
        let receipt = record_payment(
            &mut bill,
            NewPayment::with_method(dec!(40), PaymentMethod::Card, Some("TXN-991".into())),
            &caller,
        )
        .unwrap();
        assert_eq!(receipt.change_due, dec!(0));
        assert_eq!(receipt.payment.transaction_reference.as_deref(), Some("TXN-991"));
    }
}

// ============================================================================
// Refund Tests
// ============================================================================

mod refund_tests {
    use super::*;

    #[test]
    fn test_partial_refund_then_overdraw() {
        let caller = caller();
        let mut bill = bill(dec!(100), dec!(0), dec!(0), &caller);
        let payment = record_payment(&mut bill, NewPayment::cash(dec!(100), None), &caller)
            .unwrap()
            .payment;

        let first = refund_payment(&mut bill, &payment, dec!(0), dec!(30), "Overcharged lab fee", &caller)
            .unwrap();
        let stats = PaymentStatistics::compute(&payment, std::slice::from_ref(&first));
        assert_eq!(stats.remaining_refundable, dec!(70));
        assert_eq!(bill.amount_paid, dec!(70));
        assert_eq!(bill.payment_status, PaymentStatus::Partial);

        let err = refund_payment(&mut bill, &payment, first.refund_amount, dec!(80), "More", &caller)
            .unwrap_err();
        assert!(matches!(
            err,
            BillingError::RefundExceedsRemaining { requested, remaining }
                if requested == dec!(80) && remaining == dec!(70)
        ));
        assert_eq!(bill.amount_paid, dec!(70));
    }

    #[test]
    fn test_exact_remaining_refund_succeeds() {
        let caller = caller();
        let mut bill = bill(dec!(100), dec!(0), dec!(0), &caller);
        let payment = record_payment(&mut bill, NewPayment::cash(dec!(100), None), &caller)
            .unwrap()
            .payment;

        let mut refunds = vec![refund_payment(&mut bill, &payment, dec!(0), dec!(30), "Partial", &caller).unwrap()];
        let already = total_refunded(&refunds);
        refunds.push(refund_payment(&mut bill, &payment, already, dec!(70), "Rest", &caller).unwrap());

        let stats = PaymentStatistics::compute(&payment, &refunds);
        assert_eq!(stats.remaining_refundable, dec!(0));
        assert!(stats.is_fully_refunded);
        assert_eq!(stats.refund_count, 2);
        assert_eq!(bill.amount_paid, dec!(0));
        assert_eq!(bill.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_voided_payment_not_refundable() {
        let caller = caller();
        let mut bill = bill(dec!(100), dec!(0), dec!(0), &caller);
        let mut payment = record_payment(&mut bill, NewPayment::cash(dec!(60), None), &caller)
            .unwrap()
            .payment;
        void_payment(&mut bill, &mut payment, dec!(0), "Duplicate posting", &caller).unwrap();

        let err = refund_payment(&mut bill, &payment, dec!(0), dec!(10), "Too late", &caller).unwrap_err();
        assert!(matches!(err, BillingError::PaymentNotRefundable { .. }));

        let stats = PaymentStatistics::compute(&payment, &[]);
        assert!(stats.is_voided);
        assert_eq!(stats.remaining_refundable, dec!(0));
    }
}

// ============================================================================
// Insurance Settlement and Summary Tests
// ============================================================================

mod settlement_tests {
    use super::*;

    #[test]
    fn test_approved_claim_credits_bill() {
        let caller = caller();
        let mut bill = bill(dec!(500), dec!(0), dec!(0), &caller);

        let credit = settle_insurance_claim(&mut bill, "CLM202400003", dec!(352), &caller)
            .unwrap()
            .unwrap();

        assert_eq!(credit.amount, dec!(352));
        assert_eq!(bill.amount_due, dec!(148));
        assert_eq!(bill.payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn test_claim_credit_cannot_be_voided() {
        let caller = caller();
        let mut bill = bill(dec!(200), dec!(20), dec!(10), &caller);
        let mut credit = settle_insurance_claim(&mut bill, "CLM202400004", dec!(150), &caller)
            .unwrap()
            .unwrap();

        let err = void_payment(&mut bill, &mut credit, dec!(0), "Reverse insurance payout", &caller)
            .unwrap_err();

        assert!(matches!(err, BillingError::InsuranceCredit(_)));
        assert!(!err.is_validation());
        assert_eq!(credit.status, PaymentState::Completed);
        assert_eq!(bill.amount_paid, dec!(150));
        assert_eq!(bill.amount_due, dec!(60));
    }

    #[test]
    fn test_claim_credit_cannot_be_refunded() {
        let caller = caller();
        let mut bill = bill(dec!(200), dec!(20), dec!(10), &caller);
        let credit = settle_insurance_claim(&mut bill, "CLM202400005", dec!(150), &caller)
            .unwrap()
            .unwrap();

        let err = refund_payment(&mut bill, &credit, dec!(0), dec!(150), "Insurer clawback", &caller)
            .unwrap_err();

        assert!(matches!(err, BillingError::InsuranceCredit(_)));
        assert_eq!(bill.amount_paid, dec!(150));
        assert_eq!(bill.payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn test_summary_skips_voided_bills() {
        let caller = caller();
        let mut paid = bill(dec!(100), dec!(0), dec!(0), &caller);
        record_payment(&mut paid, NewPayment::cash(dec!(100), None), &caller).unwrap();
        let open = bill(dec!(50), dec!(5), dec!(0), &caller);
        let mut voided = bill(dec!(999), dec!(0), dec!(0), &caller);
        voided.void(Some("Created in error".into()), &caller).unwrap();

        let summary = BillingSummary::from_bills([&paid, &open, &voided]);

        assert_eq!(summary.bill_count, 2);
        assert_eq!(summary.total_billed, dec!(155));
        assert_eq!(summary.total_collected, dec!(100));
        assert_eq!(summary.total_outstanding, dec!(55));
        assert_eq!(summary.paid_count, 1);
        assert_eq!(summary.pending_count, 1);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Pay(i64),
        Void(usize),
        Refund(usize, i64),
        Recharge(i64, i64, i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..50_000).prop_map(Op::Pay),
            (0usize..8).prop_map(Op::Void),
            ((0usize..8), (1i64..50_000)).prop_map(|(i, c)| Op::Refund(i, c)),
            ((0i64..100_000), (0i64..10_000), (0i64..10_000)).prop_map(|(s, t, d)| Op::Recharge(s, t, d)),
        ]
    }

    proptest! {
        #[test]
        fn bill_stays_balanced(ops in proptest::collection::vec(op(), 1..30)) {
            let caller = caller();
            let mut bill = bill(dec!(500), dec!(50), dec!(25), &caller);
            let mut payments = Vec::new();
            let mut refunded: Vec<Decimal> = Vec::new();

            for op in ops {
                match op {
                    Op::Pay(cents) => {
                        if let Ok(receipt) = record_payment(&mut bill, NewPayment::cash(Decimal::new(cents, 2), None), &caller) {
                            payments.push(receipt.payment);
                            refunded.push(Decimal::ZERO);
                        }
                    }
                    Op::Void(i) if i < payments.len() => {
                        let _ = void_payment(&mut bill, &mut payments[i], refunded[i], "Reversal for testing", &caller);
                    }
                    Op::Refund(i, cents) if i < payments.len() => {
                        if let Ok(r) = refund_payment(&mut bill, &payments[i], refunded[i], Decimal::new(cents, 2), "Test", &caller) {
                            refunded[i] += r.refund_amount;
                        }
                    }
                    Op::Recharge(s, t, d) => {
                        let _ = bill.update_charges(BillCharges {
                            sub_total: Decimal::new(s, 2),
                            tax: Decimal::new(t, 2),
                            discount: Decimal::new(d, 2),
                            items: vec![],
                        });
                    }
                    _ => {}
                }
                prop_assert!(bill.is_balanced());
            }

            let collected: Decimal = payments
                .iter()
                .zip(&refunded)
                .filter(|(p, _)| p.status == PaymentState::Completed)
                .map(|(p, r)| p.amount - *r)
                .sum();
            prop_assert_eq!(bill.amount_paid, collected);
        }
    }
}
