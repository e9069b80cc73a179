//! Coverage calculator
//!
//! Splits a charge between the insurer and the patient. The order is fixed:
//! the unmet deductible is taken first, then the co-pay, and the remainder
//! is covered up to whatever is left of the annual cap.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::money::{ensure_non_negative, round_money};
use crate::error::InsuranceError;
use crate::policy::InsurancePolicy;

/// How the co-pay portion was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoPayBasis {
    /// Fixed co-pay amount
    Fixed,
    /// Percentage of the amount left after the deductible
    Percentage,
    /// No co-pay configured
    None,
}

/// Result of splitting a charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageBreakdown {
    pub charge_amount: Decimal,
    pub deductible_remaining: Decimal,
    pub deductible_applied: Decimal,
    pub amount_after_deductible: Decimal,
    pub co_pay: Decimal,
    pub co_pay_basis: CoPayBasis,
    pub insurance_coverage: Decimal,
    pub patient_responsibility: Decimal,
    /// Remaining annual payout before this charge; `None` when uncapped
    pub annual_remaining: Option<Decimal>,
    pub capped_by_annual_limit: bool,
}

/// Computes the insurer/patient split for a charge under a policy
///
/// Pure computation: the policy is not modified.
///
/// # Errors
///
/// Returns a validation error when `charge_amount` is negative.
pub fn calculate_coverage(
    charge_amount: Decimal,
    policy: &InsurancePolicy,
) -> Result<CoverageBreakdown, InsuranceError> {
    let charge_amount = ensure_non_negative(round_money(charge_amount))
        .map_err(|e| InsuranceError::validation("amount", e.to_string()))?;

    let deductible_remaining = policy.deductible_remaining();
    let deductible_applied = deductible_remaining.min(charge_amount);
    let amount_after_deductible = charge_amount - deductible_applied;

    let (co_pay, co_pay_basis) = if policy.co_pay_amount > Decimal::ZERO {
        (policy.co_pay_amount, CoPayBasis::Fixed)
    } else if policy.co_pay_percentage > Decimal::ZERO {
        (policy.co_pay_rate().apply(amount_after_deductible), CoPayBasis::Percentage)
    } else {
        (Decimal::ZERO, CoPayBasis::None)
    };

    let mut insurance_coverage = (amount_after_deductible - co_pay).max(Decimal::ZERO);

    let annual_remaining = policy.annual_remaining();
    let mut capped_by_annual_limit = false;
    if let Some(remaining) = annual_remaining {
        let remaining = remaining.max(Decimal::ZERO);
        if insurance_coverage > remaining {
            insurance_coverage = remaining;
            capped_by_annual_limit = true;
        }
    }

    Ok(CoverageBreakdown {
        charge_amount,
        deductible_remaining,
        deductible_applied,
        amount_after_deductible,
        co_pay,
        co_pay_basis,
        insurance_coverage,
        patient_responsibility: charge_amount - insurance_coverage,
        annual_remaining,
        capped_by_annual_limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{PatientId, ProviderId};
    use rust_decimal_macros::dec;
    use crate::policy::PolicyTerms;

    fn policy(co_pay_amount: Decimal, co_pay_percentage: Decimal) -> InsurancePolicy {
        let terms = PolicyTerms {
            policy_number: "P-1".to_string(),
            group_number: None,
            co_pay_amount,
            co_pay_percentage,
            deductible_amount: dec!(100),
            annual_max_coverage: Some(dec!(1000)),
            coverage_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            coverage_end: None,
        };
        let mut policy = InsurancePolicy::enroll(PatientId::new(), ProviderId::new(), terms, 1).unwrap();
        policy.deductible_met = dec!(40);
        policy
    }

    #[test]
    fn test_fixed_co_pay_takes_precedence() {
        let result = calculate_coverage(dec!(500), &policy(dec!(25), dec!(20))).unwrap();
        assert_eq!(result.co_pay_basis, CoPayBasis::Fixed);
        assert_eq!(result.co_pay, dec!(25));
        assert_eq!(result.insurance_coverage, dec!(415));
    }

    #[test]
    fn test_fixed_co_pay_larger_than_remainder() {
        let result = calculate_coverage(dec!(70), &policy(dec!(25), dec!(0))).unwrap();
        assert_eq!(result.deductible_applied, dec!(60));
        assert_eq!(result.insurance_coverage, dec!(0));
        assert_eq!(result.patient_responsibility, dec!(70));
    }

    #[test]
    fn test_no_co_pay() {
        let result = calculate_coverage(dec!(160), &policy(dec!(0), dec!(0))).unwrap();
        assert_eq!(result.co_pay_basis, CoPayBasis::None);
        assert_eq!(result.insurance_coverage, dec!(100));
    }

    #[test]
    fn test_uncapped_policy() {
        let mut p = policy(dec!(0), dec!(20));
        p.annual_max_coverage = None;
        p.annual_used_amount = dec!(50000);
        let result = calculate_coverage(dec!(500), &p).unwrap();
        assert_eq!(result.annual_remaining, None);
        assert_eq!(result.insurance_coverage, dec!(352));
    }

    #[test]
    fn test_negative_charge_rejected() {
        let result = calculate_coverage(dec!(-1), &policy(dec!(0), dec!(20)));
        assert!(matches!(result, Err(InsuranceError::Validation { .. })));
    }
}
