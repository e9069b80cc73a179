//! Tests for core_kernel error types

use core_kernel::error::CoreError;
use core_kernel::money::MoneyError;
use core_kernel::temporal::TemporalError;
use core_kernel::{Caller, Permission, UserId};

#[test]
fn test_core_error_validation() {
    let error = CoreError::validation("Invalid input");

    match error {
        CoreError::Validation(msg) => assert_eq!(msg, "Invalid input"),
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_core_error_not_found() {
    let error = CoreError::not_found("Bill not found");

    match error {
        CoreError::NotFound(msg) => assert_eq!(msg, "Bill not found"),
        _ => panic!("Expected NotFound error"),
    }
}

#[test]
fn test_core_error_from_money_error() {
    let money_error = MoneyError::InvalidAmount("-1".to_string());
    let core_error: CoreError = money_error.into();

    assert!(matches!(core_error, CoreError::Money(_)));
}

#[test]
fn test_core_error_from_temporal_error() {
    let temporal_error = TemporalError::InvalidPeriod {
        start: "2024-02-01".to_string(),
        end: "2024-01-01".to_string(),
    };
    let core_error: CoreError = temporal_error.into();

    assert!(core_error.to_string().contains("2024-02-01"));
}

#[test]
fn test_missing_permission_display() {
    let caller = Caller::new(UserId::new(), ["nurse"], ["view-billing"]);
    let error = caller.require(Permission::RefundPayments).unwrap_err();

    assert_eq!(error.to_string(), "Missing permission: refund-payments");
}
