//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for common entities across the billing system.
//! These fixtures are designed to be consistent and predictable for unit tests.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{Caller, DoctorId, PatientId, Permission, UserId};

static COVERAGE_YEAR_START: Lazy<NaiveDate> =
    Lazy::new(|| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default());

/// Fixture for amounts used across the worked examples
pub struct AmountFixtures;

impl AmountFixtures {
    /// Charge used in the coverage examples
    pub fn charge() -> Decimal {
        dec!(500.00)
    }

    pub fn deductible() -> Decimal {
        dec!(100.00)
    }

    pub fn deductible_met() -> Decimal {
        dec!(40.00)
    }

    pub fn co_pay_percentage() -> Decimal {
        dec!(20)
    }

    pub fn annual_max() -> Decimal {
        dec!(1000.00)
    }

    /// Bill sub-total used in the ledger examples
    pub fn sub_total() -> Decimal {
        dec!(200.00)
    }

    pub fn tax() -> Decimal {
        dec!(20.00)
    }

    pub fn discount() -> Decimal {
        dec!(10.00)
    }

    /// `sub_total + tax - discount`
    pub fn bill_total() -> Decimal {
        dec!(210.00)
    }
}

/// Fixture for coverage dates
pub struct DateFixtures;

impl DateFixtures {
    /// First day of the coverage year
    pub fn coverage_start() -> NaiveDate {
        *COVERAGE_YEAR_START
    }

    /// Last day of the coverage year
    pub fn coverage_end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default()
    }

    /// A day inside the coverage year
    pub fn mid_year() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap_or_default()
    }

    pub fn before_coverage() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 12, 1).unwrap_or_default()
    }

    pub fn after_coverage() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 1).unwrap_or_default()
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    pub fn patient_id() -> PatientId {
        PatientId::new_v7()
    }

    pub fn doctor_id() -> DoctorId {
        DoctorId::new_v7()
    }

    pub fn user_id() -> UserId {
        UserId::new_v7()
    }
}

/// Fixture for authenticated callers
pub struct CallerFixtures;

impl CallerFixtures {
    /// A caller holding the `admin` role
    pub fn admin() -> Caller {
        Caller::admin(UserId::new_v7())
    }

    /// Front-desk cashier: bills and payments, no voids or refunds
    pub fn cashier() -> Caller {
        Caller::new(
            UserId::new_v7(),
            ["cashier".to_string()],
            [Permission::ViewBilling, Permission::CreateBilling, Permission::CreatePayments]
                .map(|p| p.as_str()),
        )
    }

    /// Claims officer: insurance views and claim processing
    pub fn claims_officer() -> Caller {
        Caller::new(
            UserId::new_v7(),
            ["claims-officer".to_string()],
            [
                Permission::ViewInsurance,
                Permission::ViewInsuranceClaims,
                Permission::CreateInsuranceClaims,
                Permission::EditInsuranceClaims,
            ]
            .map(|p| p.as_str()),
        )
    }

    /// Caller without any permission
    pub fn visitor() -> Caller {
        Caller::new(UserId::new_v7(), Vec::<String>::new(), Vec::<String>::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bill_total_matches_parts() {
        assert_eq!(
            AmountFixtures::sub_total() + AmountFixtures::tax() - AmountFixtures::discount(),
            AmountFixtures::bill_total()
        );
    }

    #[test]
    fn test_caller_permissions() {
        assert!(CallerFixtures::cashier().can(Permission::CreatePayments));
        assert!(!CallerFixtures::cashier().can(Permission::VoidPayments));
        assert!(CallerFixtures::admin().can(Permission::ManagePharmacy));
        assert!(!CallerFixtures::visitor().can(Permission::ViewBilling));
    }

    #[test]
    fn test_dates_are_ordered() {
        assert!(DateFixtures::before_coverage() < DateFixtures::coverage_start());
        assert!(DateFixtures::mid_year() < DateFixtures::coverage_end());
        assert!(DateFixtures::coverage_end() < DateFixtures::after_coverage());
    }
}
