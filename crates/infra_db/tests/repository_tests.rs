//! Repository Integration Tests
//!
//! Exercise the repositories against a real PostgreSQL container. Each
//! test gets its own database so concurrent scenarios never see each
//! other's rows. Run with `cargo test -p infra_db -- --ignored`.

use std::collections::HashSet;

use chrono::Utc;
use rust_decimal_macros::dec;

use core_kernel::PatientId;
use domain_billing::{BillChargesPatch, BillingError, NewPayment, PaymentMethod, PaymentStatus};
use domain_insurance::{ClaimDocument, ClaimStatus, InsuranceError, InsuranceProvider, StatusChange};
use domain_pharmacy::{PharmacyError, PurchaseLine, PurchaseStatus, SaleLine};
use infra_db::{BillingRepository, ClaimsRepository, DatabaseError, InsuranceRepository, PharmacyRepository};
use test_utils::{
    assert_bill_amounts, assert_stock_reconciles, create_isolated_test_database, BillBuilder,
    CallerFixtures, MedicineBuilder, PolicyBuilder, TestDatabase,
};

async fn setup() -> TestDatabase {
    create_isolated_test_database()
        .await
        .expect("Failed to create test database")
}

mod billing_flows {
    use super::*;

    /// Partial then full payment walks the bill through every status
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_payment_lifecycle() {
        let db = setup().await;
        let repo = BillingRepository::new(db.pool.clone());
        let cashier = CallerFixtures::cashier();

        let bill = repo
            .create_bill(PatientId::new_v7(), None, BillBuilder::new().charges(), None, &cashier)
            .await
            .unwrap();
        assert_eq!(bill.total_amount, dec!(210));

        let first = repo
            .record_payment(bill.id, NewPayment::cash(dec!(100), Some(dec!(120))), &cashier)
            .await
            .unwrap();
        assert_eq!(first.entry.change_due, dec!(20));
        assert_bill_amounts(&first.bill, dec!(100), dec!(110), PaymentStatus::Partial);

        let second = repo
            .record_payment(
                bill.id,
                NewPayment::with_method(dec!(110), PaymentMethod::Card, Some("AUTH-1".into())),
                &cashier,
            )
            .await
            .unwrap();
        assert_bill_amounts(&second.bill, dec!(210), dec!(0), PaymentStatus::Paid);

        let stored = repo.get_bill(bill.id).await.unwrap();
        assert_bill_amounts(&stored, dec!(210), dec!(0), PaymentStatus::Paid);
        assert_eq!(repo.list_payments(bill.id).await.unwrap().len(), 2);
    }

    /// Voiding and refunding both reverse the bill balance
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_void_and_refund_restore_balance() {
        let db = setup().await;
        let repo = BillingRepository::new(db.pool.clone());
        let cashier = CallerFixtures::cashier();
        let admin = CallerFixtures::admin();

        let bill = repo
            .create_bill(PatientId::new_v7(), None, BillBuilder::new().charges(), None, &cashier)
            .await
            .unwrap();
        let paid = repo
            .record_payment(bill.id, NewPayment::cash(dec!(210), None), &cashier)
            .await
            .unwrap();

        let refund = repo
            .refund_payment(paid.entry.payment.id, dec!(50), "Duplicate test", &admin)
            .await
            .unwrap();
        assert_bill_amounts(&refund.bill, dec!(160), dec!(50), PaymentStatus::Partial);

        let stats = repo.payment_statistics(paid.entry.payment.id).await.unwrap();
        assert_eq!(stats.total_refunded, dec!(50));
        assert_eq!(stats.remaining_refundable, dec!(160));

        // A refunded payment can no longer be voided
        let err = repo
            .void_payment(paid.entry.payment.id, "Entered in error", &admin)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Billing(BillingError::PaymentHasRefunds { .. })));

        let other = repo
            .record_payment(bill.id, NewPayment::cash(dec!(50), None), &cashier)
            .await
            .unwrap();
        let voided = repo.void_payment(other.entry.payment.id, "Entered in error", &admin).await.unwrap();
        assert!(voided.entry.is_voided());
        assert_bill_amounts(&voided.bill, dec!(160), dec!(50), PaymentStatus::Partial);
    }

    /// Two cashiers paying the full amount at once: exactly one wins
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_concurrent_payments_never_overpay() {
        let db = setup().await;
        let repo = BillingRepository::new(db.pool.clone());
        let cashier = CallerFixtures::cashier();

        let bill = repo
            .create_bill(PatientId::new_v7(), None, BillBuilder::new().charges(), None, &cashier)
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            repo.record_payment(bill.id, NewPayment::cash(dec!(150), None), &cashier),
            repo.record_payment(bill.id, NewPayment::cash(dec!(150), None), &cashier),
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(DatabaseError::Billing(BillingError::PaymentExceedsDue { .. }))
        )));

        let stored = repo.get_bill(bill.id).await.unwrap();
        assert_bill_amounts(&stored, dec!(150), dec!(60), PaymentStatus::Partial);
    }

    /// Bill numbers stay unique under concurrent creation
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_concurrent_bill_numbers_are_unique() {
        let db = setup().await;
        let repo = BillingRepository::new(db.pool.clone());
        let cashier = CallerFixtures::cashier();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let repo = repo.clone();
                let caller = cashier.clone();
                tokio::spawn(async move {
                    repo.create_bill(PatientId::new_v7(), None, BillBuilder::new().charges(), None, &caller)
                        .await
                })
            })
            .collect();

        let mut numbers = HashSet::new();
        for handle in handles {
            let bill = handle.await.unwrap().unwrap();
            assert!(bill.bill_number.starts_with(&format!("BILL{}", Utc::now().format("%Y"))));
            numbers.insert(bill.bill_number);
        }
        assert_eq!(numbers.len(), 10);
    }

    /// Bills with payments cannot be voided; the summary skips voided bills
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_void_bill_and_summary() {
        let db = setup().await;
        let repo = BillingRepository::new(db.pool.clone());
        let cashier = CallerFixtures::cashier();

        let paid = repo
            .create_bill(PatientId::new_v7(), None, BillBuilder::new().charges(), None, &cashier)
            .await
            .unwrap();
        repo.record_payment(paid.id, NewPayment::cash(dec!(10), None), &cashier)
            .await
            .unwrap();
        let err = repo.void_bill(paid.id, None, &cashier).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Billing(BillingError::BillHasPayments { .. })));

        let unpaid = repo
            .create_bill(PatientId::new_v7(), None, BillBuilder::new().charges(), None, &cashier)
            .await
            .unwrap();
        let voided = repo
            .void_bill(unpaid.id, Some("Entered twice".into()), &cashier)
            .await
            .unwrap();
        assert!(voided.voided_at.is_some());

        let summary = repo.summary().await.unwrap();
        assert_eq!(summary.bill_count, 1);
        assert_eq!(summary.total_collected, dec!(10));
    }

    /// Concurrent edits of different charges both survive
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_concurrent_partial_edits_keep_both_fields() {
        let db = setup().await;
        let repo = BillingRepository::new(db.pool.clone());
        let cashier = CallerFixtures::cashier();

        let bill = repo
            .create_bill(PatientId::new_v7(), None, BillBuilder::new().charges(), None, &cashier)
            .await
            .unwrap();

        let tax_edit = BillChargesPatch { tax: Some(dec!(30)), ..Default::default() };
        let discount_edit = BillChargesPatch { discount: Some(dec!(5)), ..Default::default() };
        let (a, b) = tokio::join!(
            repo.update_bill(bill.id, tax_edit, None, None),
            repo.update_bill(bill.id, discount_edit, None, Some("Loyalty discount".into())),
        );
        a.unwrap();
        b.unwrap();

        let stored = repo.get_bill(bill.id).await.unwrap();
        assert_eq!(stored.tax, dec!(30));
        assert_eq!(stored.discount, dec!(5));
        assert_eq!(stored.total_amount, dec!(225));
        assert_eq!(stored.notes.as_deref(), Some("Loyalty discount"));
        assert!(stored.is_balanced());
    }
}

mod insurance_flows {
    use super::*;

    /// A second primary policy demotes the first
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_single_primary_policy() {
        let db = setup().await;
        let repo = InsuranceRepository::new(db.pool.clone());
        let provider = repo
            .create_provider(InsuranceProvider::new("Blue Shield", "BSH").unwrap())
            .await
            .unwrap();
        let patient = PatientId::new_v7();

        let first = repo
            .create_policy(patient, provider.id, PolicyBuilder::new().terms(), None, true)
            .await
            .unwrap();
        assert!(first.is_primary);
        assert_eq!(first.priority_order, 1);

        let second = repo
            .create_policy(
                patient,
                provider.id,
                PolicyBuilder::new().with_policy_number("POL-0002").terms(),
                None,
                true,
            )
            .await
            .unwrap();
        assert!(second.is_primary);
        assert_eq!(second.priority_order, 2);

        let policies = repo.list_policies(patient).await.unwrap();
        assert_eq!(policies.iter().filter(|p| p.is_primary).count(), 1);
        assert_eq!(policies[0].id, second.id);

        let restored = repo.set_primary(first.id).await.unwrap();
        assert!(restored.is_primary);
        assert!(!repo.get_policy(second.id).await.unwrap().is_primary);
    }

    /// Providers referenced by policies cannot be deleted
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_provider_in_use() {
        let db = setup().await;
        let repo = InsuranceRepository::new(db.pool.clone());
        let provider = repo
            .create_provider(InsuranceProvider::new("Aetna", "AET").unwrap())
            .await
            .unwrap();
        repo.create_policy(PatientId::new_v7(), provider.id, PolicyBuilder::new().terms(), None, false)
            .await
            .unwrap();

        let err = repo.delete_provider(provider.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Insurance(InsuranceError::ProviderInUse(1))));

        let duplicate = repo
            .create_provider(InsuranceProvider::new("Aetna Again", "aet").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(duplicate, DatabaseError::DuplicateEntry(_)));
    }

    /// Manual counter adjustments clamp at zero and the deductible
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_usage_adjustments() {
        let db = setup().await;
        let repo = InsuranceRepository::new(db.pool.clone());
        let provider = repo
            .create_provider(InsuranceProvider::new("Cigna", "CIG").unwrap())
            .await
            .unwrap();
        let policy = repo
            .create_policy(PatientId::new_v7(), provider.id, PolicyBuilder::new().terms(), None, false)
            .await
            .unwrap();

        let policy_id = policy.id;
        let over = repo.adjust_deductible(policy_id, dec!(500)).await.unwrap();
        assert_eq!(over.deductible_met, dec!(100));
        let under = repo.adjust_annual_used(policy_id, dec!(-20)).await.unwrap();
        assert_eq!(under.annual_used_amount, dec!(0));
    }
}

mod claim_flows {
    use super::*;

    /// Approval credits the bill and consumes the annual limit atomically
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_approval_credits_bill() {
        let db = setup().await;
        let billing = BillingRepository::new(db.pool.clone());
        let insurance = InsuranceRepository::new(db.pool.clone());
        let claims = ClaimsRepository::new(db.pool.clone());
        let officer = CallerFixtures::claims_officer();
        let patient = PatientId::new_v7();

        let provider = insurance
            .create_provider(InsuranceProvider::new("Blue Shield", "BSH").unwrap())
            .await
            .unwrap();
        let policy = insurance
            .create_policy(patient, provider.id, PolicyBuilder::new().terms(), None, true)
            .await
            .unwrap();
        let bill = billing
            .create_bill(patient, None, BillBuilder::new().charges(), None, &officer)
            .await
            .unwrap();

        let claim = claims
            .create_claim(bill.id, policy.id, dec!(150), None, &officer)
            .await
            .unwrap();
        assert_eq!(claim.status, ClaimStatus::Draft);
        assert!(claim.claim_number.starts_with("CLM"));

        // Only one open claim per bill
        let err = claims
            .create_claim(bill.id, policy.id, dec!(10), None, &officer)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Insurance(InsuranceError::OpenClaimExists { .. })));

        claims.submit_claim(claim.id, &officer).await.unwrap();
        let decision = claims
            .change_status(claim.id, StatusChange::Approve { approved_amount: dec!(150) }, &officer)
            .await
            .unwrap();

        assert_eq!(decision.claim.status, ClaimStatus::Approved);
        let payment = decision.payment.expect("approval should credit the bill");
        assert_eq!(payment.method, PaymentMethod::Insurance);
        assert_eq!(payment.amount, dec!(150));
        assert_bill_amounts(&billing.get_bill(bill.id).await.unwrap(), dec!(150), dec!(60), PaymentStatus::Partial);
        assert_eq!(insurance.get_policy(policy.id).await.unwrap().annual_used_amount, dec!(150));

        // The credit follows the claim; it cannot be reversed at the till
        let admin = CallerFixtures::admin();
        let err = billing
            .void_payment(payment.id, "Reverse insurance payout", &admin)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Billing(BillingError::InsuranceCredit(_))));
        let err = billing
            .refund_payment(payment.id, dec!(150), "Insurer clawback", &admin)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Billing(BillingError::InsuranceCredit(_))));
        assert_bill_amounts(&billing.get_bill(bill.id).await.unwrap(), dec!(150), dec!(60), PaymentStatus::Partial);
    }

    /// Open claims can be edited, documented and deleted; finalized ones cannot
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_claim_edit_attach_and_delete() {
        let db = setup().await;
        let billing = BillingRepository::new(db.pool.clone());
        let insurance = InsuranceRepository::new(db.pool.clone());
        let claims = ClaimsRepository::new(db.pool.clone());
        let officer = CallerFixtures::claims_officer();
        let patient = PatientId::new_v7();

        let provider = insurance
            .create_provider(InsuranceProvider::new("Cigna", "CGN").unwrap())
            .await
            .unwrap();
        let policy = insurance
            .create_policy(patient, provider.id, PolicyBuilder::new().terms(), None, true)
            .await
            .unwrap();
        let bill = billing
            .create_bill(patient, None, BillBuilder::new().charges(), None, &officer)
            .await
            .unwrap();

        let draft = claims
            .create_claim(bill.id, policy.id, dec!(150), None, &officer)
            .await
            .unwrap();
        let edited = claims
            .update_claim(draft.id, Some(dec!(120)), Some("Ward charges only".into()))
            .await
            .unwrap();
        assert_eq!(edited.claim_amount, dec!(120));
        assert_eq!(edited.notes.as_deref(), Some("Ward charges only"));

        let scan = ClaimDocument::new(draft.id, "discharge summary.pdf", 2048, "application/pdf");
        let documented = claims.attach_document(draft.id, scan.clone()).await.unwrap();
        assert_eq!(documented.documents, vec![scan.clone()]);

        let removed = claims.delete_claim(draft.id).await.unwrap();
        assert_eq!(removed, vec![scan]);
        assert!(claims.get_claim(draft.id).await.unwrap_err().is_not_found());

        // With the draft gone a new claim may be opened and finalized
        let claim = claims
            .create_claim(bill.id, policy.id, dec!(100), None, &officer)
            .await
            .unwrap();
        claims.submit_claim(claim.id, &officer).await.unwrap();
        claims
            .change_status(claim.id, StatusChange::Approve { approved_amount: dec!(100) }, &officer)
            .await
            .unwrap();

        let finalized = |err: DatabaseError| {
            matches!(err, DatabaseError::Insurance(InsuranceError::ClaimFinalized { .. }))
        };
        assert!(finalized(claims.update_claim(claim.id, Some(dec!(90)), None).await.unwrap_err()));
        let late = ClaimDocument::new(claim.id, "late.pdf", 10, "application/pdf");
        assert!(finalized(claims.attach_document(claim.id, late).await.unwrap_err()));
        assert!(finalized(claims.delete_claim(claim.id).await.unwrap_err()));

        let kept = claims.get_claim(claim.id).await.unwrap();
        assert_eq!(kept.status, ClaimStatus::Approved);
        assert_eq!(kept.claim_amount, dec!(100));
        assert!(kept.documents.is_empty());
    }

    /// A failed approval leaves bill, claim and policy untouched
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_rejected_transition_rolls_back() {
        let db = setup().await;
        let billing = BillingRepository::new(db.pool.clone());
        let insurance = InsuranceRepository::new(db.pool.clone());
        let claims = ClaimsRepository::new(db.pool.clone());
        let officer = CallerFixtures::claims_officer();
        let patient = PatientId::new_v7();

        let provider = insurance
            .create_provider(InsuranceProvider::new("Humana", "HUM").unwrap())
            .await
            .unwrap();
        let policy = insurance
            .create_policy(patient, provider.id, PolicyBuilder::new().terms(), None, true)
            .await
            .unwrap();
        let bill = billing
            .create_bill(patient, None, BillBuilder::new().charges(), None, &officer)
            .await
            .unwrap();
        let claim = claims
            .create_claim(bill.id, policy.id, dec!(100), None, &officer)
            .await
            .unwrap();

        // Draft claims cannot be approved directly
        let err = claims
            .change_status(claim.id, StatusChange::Approve { approved_amount: dec!(100) }, &officer)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Insurance(InsuranceError::InvalidStatusTransition { .. })));

        assert_eq!(claims.get_claim(claim.id).await.unwrap().status, ClaimStatus::Draft);
        assert_eq!(billing.get_bill(bill.id).await.unwrap().amount_paid, dec!(0));
        assert_eq!(insurance.get_policy(policy.id).await.unwrap().annual_used_amount, dec!(0));
    }
}

mod pharmacy_flows {
    use super::*;

    /// Concurrent sales can never drive stock negative
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_concurrent_sales_respect_stock() {
        let db = setup().await;
        let repo = PharmacyRepository::new(db.pool.clone());
        let cashier = CallerFixtures::cashier();

        let medicine = repo
            .create_medicine(MedicineBuilder::new("Amoxicillin 500mg").with_stock(5).build())
            .await
            .unwrap();
        let line = || vec![SaleLine { medicine_id: medicine.id, quantity: 3, unit_price: None }];

        let (a, b) = tokio::join!(
            repo.create_sale(line(), None, "cash", &cashier),
            repo.create_sale(line(), None, "cash", &cashier),
        );
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(DatabaseError::Pharmacy(PharmacyError::InsufficientStock { available: 2, .. }))
        )));

        let stored = repo.get_medicine(medicine.id).await.unwrap();
        let movements = repo.stock_movements(medicine.id).await.unwrap();
        assert_eq!(stored.stock_quantity, 2);
        assert_stock_reconciles(&stored, 5, &movements);
    }

    /// Receiving then cancelling a purchase nets out to the opening stock
    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn test_purchase_receive_and_cancel() {
        let db = setup().await;
        let repo = PharmacyRepository::new(db.pool.clone());
        let admin = CallerFixtures::admin();

        let medicine = repo
            .create_medicine(MedicineBuilder::new("Paracetamol").with_stock(4).with_reorder_level(10).build())
            .await
            .unwrap();
        assert_eq!(repo.low_stock().await.unwrap().len(), 1);

        let purchase = repo
            .create_purchase(
                "Acme Pharma",
                vec![PurchaseLine { medicine_id: medicine.id, quantity: 50, unit_cost: dec!(0.40) }],
                &admin,
            )
            .await
            .unwrap();
        assert_eq!(purchase.total_cost, dec!(20.00));

        repo.mark_ordered(purchase.id).await.unwrap();
        let (received, movements) = repo.receive_purchase(purchase.id, &admin).await.unwrap();
        assert_eq!(received.status, PurchaseStatus::Received);
        assert_eq!(movements.len(), 1);
        assert_eq!(repo.get_medicine(medicine.id).await.unwrap().stock_quantity, 54);
        assert!(repo.low_stock().await.unwrap().is_empty());

        let (cancelled, _) = repo.cancel_purchase(purchase.id, &admin).await.unwrap();
        assert_eq!(cancelled.status, PurchaseStatus::Cancelled);

        let stored = repo.get_medicine(medicine.id).await.unwrap();
        assert_stock_reconciles(&stored, 4, &repo.stock_movements(medicine.id).await.unwrap());
        assert_eq!(stored.stock_quantity, 4);
    }
}
