//! Comprehensive tests for domain_pharmacy

use std::collections::HashMap;

use rust_decimal_macros::dec;

use core_kernel::{Caller, MedicineId, UserId};

use domain_pharmacy::medicine::{Medicine, NewMedicine};
use domain_pharmacy::purchase::{Purchase, PurchaseLine, PurchaseStatus};
use domain_pharmacy::sale::{Sale, SaleLine};
use domain_pharmacy::stock::MovementType;
use domain_pharmacy::PharmacyError;

fn caller() -> Caller {
    Caller::admin(UserId::new_v7())
}

fn medicine(name: &str, stock: i32) -> Medicine {
    Medicine::register(NewMedicine {
        name: name.to_string(),
        generic_name: None,
        sku: name.to_uppercase(),
        unit: "tablet".into(),
        stock_quantity: stock,
        reorder_level: 10,
        cost_price: dec!(0.40),
        selling_price: dec!(1.25),
        expiry_date: None,
    })
    .unwrap()
}

fn shelf(medicines: Vec<Medicine>) -> HashMap<MedicineId, Medicine> {
    medicines.into_iter().map(|m| (m.id, m)).collect()
}

// ============================================================================
// Sale Tests
// ============================================================================

mod sale_tests {
    use super::*;

    #[test]
    fn test_sale_decrements_and_audits() {
        let caller = caller();
        let ibuprofen = medicine("ibuprofen", 30);
        let id = ibuprofen.id;
        let mut stock = shelf(vec![ibuprofen]);

        let (sale, movements) = Sale::checkout(
            vec![SaleLine { medicine_id: id, quantity: 4, unit_price: None }],
            &mut stock,
            None,
            "cash",
            &caller,
        )
        .unwrap();

        assert_eq!(sale.total_amount, dec!(5.00));
        assert_eq!(stock[&id].stock_quantity, 26);
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::Sale);
        assert_eq!((movements[0].quantity_before, movements[0].quantity_after), (30, 26));
        assert_eq!(movements[0].quantity_change, -4);
        assert_eq!(movements[0].reference_id, *sale.id.as_uuid());
    }

    #[test]
    fn test_insufficient_line_rejects_whole_sale() {
        let caller = caller();
        let a = medicine("amoxicillin", 10);
        let b = medicine("cetirizine", 2);
        let (a_id, b_id) = (a.id, b.id);
        let mut stock = shelf(vec![a, b]);

        let err = Sale::checkout(
            vec![
                SaleLine { medicine_id: a_id, quantity: 5, unit_price: None },
                SaleLine { medicine_id: b_id, quantity: 3, unit_price: None },
            ],
            &mut stock,
            None,
            "cash",
            &caller,
        )
        .unwrap_err();

        assert!(matches!(err, PharmacyError::InsufficientStock { requested: 3, available: 2, .. }));
        assert_eq!(stock[&a_id].stock_quantity, 10);
        assert_eq!(stock[&b_id].stock_quantity, 2);
    }

    #[test]
    fn test_duplicate_lines_are_summed_before_checking() {
        let caller = caller();
        let med = medicine("omeprazole", 5);
        let id = med.id;
        let mut stock = shelf(vec![med]);

        let lines = vec![
            SaleLine { medicine_id: id, quantity: 3, unit_price: None },
            SaleLine { medicine_id: id, quantity: 3, unit_price: Some(dec!(1.00)) },
        ];
        let err = Sale::checkout(lines, &mut stock, None, "cash", &caller).unwrap_err();

        assert!(matches!(err, PharmacyError::InsufficientStock { requested: 6, .. }));
        assert_eq!(stock[&id].stock_quantity, 5);
    }

    #[test]
    fn test_unknown_medicine() {
        let mut stock = HashMap::new();
        let err = Sale::checkout(
            vec![SaleLine { medicine_id: MedicineId::new(), quantity: 1, unit_price: None }],
            &mut stock,
            None,
            "cash",
            &caller(),
        )
        .unwrap_err();
        assert!(matches!(err, PharmacyError::MedicineNotFound(_)));
    }

    #[test]
    fn test_quantity_overflow_is_a_validation_error() {
        let caller = caller();
        let med = medicine("heparin", 40);
        let id = med.id;
        let mut stock = shelf(vec![med]);

        let lines = vec![
            SaleLine { medicine_id: id, quantity: i32::MAX, unit_price: None },
            SaleLine { medicine_id: id, quantity: i32::MAX, unit_price: None },
        ];
        let err = Sale::checkout(lines, &mut stock, None, "cash", &caller).unwrap_err();

        assert!(matches!(err, PharmacyError::Validation { ref field, .. } if field == "items.1.quantity"));
        assert_eq!(stock[&id].stock_quantity, 40);
    }

    #[test]
    fn test_line_total_beyond_money_limit_is_rejected() {
        let caller = caller();
        let med = medicine("albumin", 40);
        let id = med.id;
        let mut stock = shelf(vec![med]);

        let lines = vec![SaleLine { medicine_id: id, quantity: i32::MAX, unit_price: Some(dec!(10)) }];
        let err = Sale::checkout(lines, &mut stock, None, "cash", &caller).unwrap_err();

        assert!(matches!(err, PharmacyError::Validation { ref field, .. } if field == "items.0.quantity"));
        assert_eq!(stock[&id].stock_quantity, 40);
    }
}

// ============================================================================
// Purchase Tests
// ============================================================================

mod purchase_tests {
    use super::*;

    fn purchase(id: MedicineId, quantity: i32, caller: &Caller) -> Purchase {
        Purchase::create(
            "MedSupply Ltd",
            vec![PurchaseLine { medicine_id: id, quantity, unit_cost: dec!(0.35) }],
            caller,
        )
        .unwrap()
    }

    #[test]
    fn test_receive_increments_stock() {
        let caller = caller();
        let med = medicine("metformin", 3);
        let id = med.id;
        let mut stock = shelf(vec![med]);
        let mut order = purchase(id, 100, &caller);
        assert_eq!(order.total_cost, dec!(35.00));

        order.mark_ordered().unwrap();
        let movements = order.receive(&mut stock, &caller).unwrap();

        assert_eq!(order.status, PurchaseStatus::Received);
        assert!(order.received_at.is_some());
        assert_eq!(stock[&id].stock_quantity, 103);
        assert_eq!(movements[0].movement_type, MovementType::PurchaseReceipt);
        assert_eq!(movements[0].quantity_change, 100);
    }

    #[test]
    fn test_cannot_receive_before_ordering() {
        let caller = caller();
        let med = medicine("losartan", 0);
        let id = med.id;
        let mut stock = shelf(vec![med]);
        let mut order = purchase(id, 10, &caller);

        assert!(matches!(
            order.receive(&mut stock, &caller),
            Err(PharmacyError::InvalidStatusTransition { .. })
        ));
        assert_eq!(stock[&id].stock_quantity, 0);
    }

    #[test]
    fn test_cancel_pending_leaves_stock_alone() {
        let caller = caller();
        let med = medicine("salbutamol", 7);
        let id = med.id;
        let mut stock = shelf(vec![med]);
        let mut order = purchase(id, 10, &caller);

        let movements = order.cancel(&mut stock, &caller).unwrap();

        assert!(movements.is_empty());
        assert_eq!(order.status, PurchaseStatus::Cancelled);
        assert_eq!(stock[&id].stock_quantity, 7);
        assert!(order.cancel(&mut stock, &caller).is_err());
    }

    #[test]
    fn test_cancel_received_reverses_stock() {
        let caller = caller();
        let med = medicine("atorvastatin", 5);
        let id = med.id;
        let mut stock = shelf(vec![med]);
        let mut order = purchase(id, 20, &caller);
        order.mark_ordered().unwrap();
        order.receive(&mut stock, &caller).unwrap();

        let movements = order.cancel(&mut stock, &caller).unwrap();

        assert_eq!(stock[&id].stock_quantity, 5);
        assert_eq!(movements[0].movement_type, MovementType::PurchaseCancellation);
        assert_eq!((movements[0].quantity_before, movements[0].quantity_after), (25, 5));
    }

    #[test]
    fn test_cancel_refused_when_stock_already_sold() {
        let caller = caller();
        let med = medicine("insulin", 0);
        let id = med.id;
        let mut stock = shelf(vec![med]);
        let mut order = purchase(id, 10, &caller);
        order.mark_ordered().unwrap();
        order.receive(&mut stock, &caller).unwrap();
        Sale::checkout(
            vec![SaleLine { medicine_id: id, quantity: 4, unit_price: None }],
            &mut stock,
            None,
            "card",
            &caller,
        )
        .unwrap();

        let err = order.cancel(&mut stock, &caller).unwrap_err();

        assert!(matches!(err, PharmacyError::ReversalExceedsStock { quantity: 10, on_hand: 6, .. }));
        assert_eq!(order.status, PurchaseStatus::Received);
        assert_eq!(stock[&id].stock_quantity, 6);
    }

    #[test]
    fn test_purchase_quantity_overflow_is_rejected() {
        let id = MedicineId::new();
        let err = Purchase::create(
            "MedSupply Ltd",
            vec![
                PurchaseLine { medicine_id: id, quantity: i32::MAX, unit_cost: dec!(0.01) },
                PurchaseLine { medicine_id: id, quantity: 1, unit_cost: dec!(0.01) },
            ],
            &caller(),
        )
        .unwrap_err();

        assert!(matches!(err, PharmacyError::Validation { ref field, .. } if field == "items.1.quantity"));
    }

    #[test]
    fn test_receive_refused_past_stock_limit() {
        let caller = caller();
        let med = medicine("saline", i32::MAX - 5);
        let id = med.id;
        let mut stock = shelf(vec![med]);
        let mut order = purchase(id, 10, &caller);
        order.mark_ordered().unwrap();

        let err = order.receive(&mut stock, &caller).unwrap_err();

        assert!(matches!(err, PharmacyError::StockLimitExceeded { quantity: 10, .. }));
        assert_eq!(order.status, PurchaseStatus::Ordered);
        assert_eq!(stock[&id].stock_quantity, i32::MAX - 5);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn stock_never_negative(initial in 0i32..50, sales in proptest::collection::vec(1i32..20, 1..20)) {
            let caller = caller();
            let med = medicine("aspirin", initial);
            let id = med.id;
            let mut stock = shelf(vec![med]);

            let mut sold = 0;
            for quantity in sales {
                let line = SaleLine { medicine_id: id, quantity, unit_price: None };
                if Sale::checkout(vec![line], &mut stock, None, "cash", &caller).is_ok() {
                    sold += quantity;
                }
                prop_assert!(stock[&id].stock_quantity >= 0);
            }
            prop_assert_eq!(stock[&id].stock_quantity, initial - sold);
        }
    }
}
