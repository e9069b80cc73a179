//! Policy eligibility report

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::PeriodPosition;
use crate::policy::InsurancePolicy;
use crate::provider::InsuranceProvider;

/// Share of the annual cap under which a low-coverage warning is raised
const LOW_ANNUAL_COVERAGE_RATIO: Decimal = dec!(0.10);

/// A problem that makes the policy unusable for new charges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationIssue {
    PolicyInactive,
    CoverageNotStarted { starts_on: NaiveDate },
    CoverageExpired { ended_on: NaiveDate },
    ProviderMissing,
    ProviderInactive { provider: String },
    AnnualLimitExhausted { annual_max_coverage: Decimal, annual_used_amount: Decimal },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PolicyInactive => write!(f, "Insurance policy is inactive"),
            Self::CoverageNotStarted { starts_on } => {
                write!(f, "Coverage has not started yet (starts {})", starts_on)
            }
            Self::CoverageExpired { ended_on } => write!(f, "Coverage expired on {}", ended_on),
            Self::ProviderMissing => write!(f, "Insurance provider not found"),
            Self::ProviderInactive { provider } => {
                write!(f, "Insurance provider {} is inactive", provider)
            }
            Self::AnnualLimitExhausted { .. } => write!(f, "Annual coverage limit has been reached"),
        }
    }
}

/// Informational findings that do not block use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationWarning {
    DeductibleMet,
    AnnualCoverageLow { remaining: Decimal },
    FixedCoPayOverridesPercentage,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeductibleMet => write!(f, "Deductible has been fully met"),
            Self::AnnualCoverageLow { remaining } => {
                write!(f, "Less than 10% of annual coverage remains ({})", remaining)
            }
            Self::FixedCoPayOverridesPercentage => {
                write!(f, "Both co-pay amount and percentage are set; the fixed amount is used")
            }
        }
    }
}

/// Outcome of validating a policy on a given day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyValidation {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationWarning>,
}

/// Checks whether a policy can be used on `today`
///
/// `provider` is `None` when the referenced provider no longer exists.
pub fn validate_policy(
    policy: &InsurancePolicy,
    provider: Option<&InsuranceProvider>,
    today: NaiveDate,
) -> PolicyValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !policy.is_active {
        errors.push(ValidationIssue::PolicyInactive);
    }

    match policy.coverage.position(today) {
        PeriodPosition::NotStarted => errors.push(ValidationIssue::CoverageNotStarted {
            starts_on: policy.coverage.start,
        }),
        PeriodPosition::Expired => {
            if let Some(ended_on) = policy.coverage.end {
                errors.push(ValidationIssue::CoverageExpired { ended_on });
            }
        }
        PeriodPosition::Active => {}
    }

    match provider {
        None => errors.push(ValidationIssue::ProviderMissing),
        Some(p) if !p.is_active => errors.push(ValidationIssue::ProviderInactive {
            provider: p.name.clone(),
        }),
        Some(_) => {}
    }

    if let (Some(cap), Some(remaining)) = (policy.annual_max_coverage, policy.annual_remaining()) {
        if remaining <= Decimal::ZERO {
            errors.push(ValidationIssue::AnnualLimitExhausted {
                annual_max_coverage: cap,
                annual_used_amount: policy.annual_used_amount,
            });
        } else if remaining < cap * LOW_ANNUAL_COVERAGE_RATIO {
            warnings.push(ValidationWarning::AnnualCoverageLow { remaining });
        }
    }

    if policy.deductible_amount > Decimal::ZERO && policy.deductible_remaining().is_zero() {
        warnings.push(ValidationWarning::DeductibleMet);
    }
    if policy.has_conflicting_co_pay() {
        warnings.push(ValidationWarning::FixedCoPayOverridesPercentage);
    }

    PolicyValidation {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{PatientId, ProviderId};
    use crate::policy::PolicyTerms;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (InsurancePolicy, InsuranceProvider) {
        let provider = InsuranceProvider::new("Acme Health", "ACME").unwrap();
        let terms = PolicyTerms {
            policy_number: "ACME-77".to_string(),
            group_number: None,
            co_pay_amount: dec!(0),
            co_pay_percentage: dec!(20),
            deductible_amount: dec!(100),
            annual_max_coverage: Some(dec!(1000)),
            coverage_start: date(2024, 1, 1),
            coverage_end: Some(date(2024, 12, 31)),
        };
        let policy = InsurancePolicy::enroll(PatientId::new(), provider.id, terms, 1).unwrap();
        (policy, provider)
    }

    #[test]
    fn test_valid_policy() {
        let (policy, provider) = setup();
        let report = validate_policy(&policy, Some(&provider), date(2024, 6, 1));
        assert!(report.is_valid);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_blocking_errors_accumulate() {
        let (mut policy, mut provider) = setup();
        policy.deactivate();
        provider.deactivate();

        let report = validate_policy(&policy, Some(&provider), date(2025, 2, 1));

        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors.contains(&ValidationIssue::PolicyInactive));
        assert!(report
            .errors
            .contains(&ValidationIssue::CoverageExpired { ended_on: date(2024, 12, 31) }));
    }

    #[test]
    fn test_missing_provider_and_not_started() {
        let (policy, _) = setup();
        let report = validate_policy(&policy, None, date(2023, 12, 1));
        assert_eq!(
            report.errors,
            vec![
                ValidationIssue::CoverageNotStarted { starts_on: date(2024, 1, 1) },
                ValidationIssue::ProviderMissing,
            ]
        );
    }

    #[test]
    fn test_exhausted_and_low_coverage() {
        let (mut policy, provider) = setup();
        policy.annual_used_amount = dec!(1000);
        let report = validate_policy(&policy, Some(&provider), date(2024, 6, 1));
        assert!(matches!(report.errors[0], ValidationIssue::AnnualLimitExhausted { .. }));

        policy.annual_used_amount = dec!(950);
        let report = validate_policy(&policy, Some(&provider), date(2024, 6, 1));
        assert!(report.is_valid);
        assert_eq!(report.warnings, vec![ValidationWarning::AnnualCoverageLow { remaining: dec!(50) }]);
    }

    #[test]
    fn test_warnings_for_met_deductible_and_co_pay_conflict() {
        let (mut policy, provider) = setup();
        policy.deductible_met = dec!(100);
        policy.co_pay_amount = dec!(15);

        let report = validate_policy(&policy, Some(&provider), date(2024, 6, 1));

        assert!(report.is_valid);
        assert!(report.warnings.contains(&ValidationWarning::DeductibleMet));
        assert!(report.warnings.contains(&ValidationWarning::FixedCoPayOverridesPercentage));
    }

    #[test]
    fn test_issue_serializes_with_code() {
        let json = serde_json::to_value(ValidationIssue::PolicyInactive).unwrap();
        assert_eq!(json["code"], "policy_inactive");
    }
}
