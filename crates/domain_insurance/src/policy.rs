//! Patient insurance policies
//!
//! A policy links one patient to one provider and carries the cost-sharing
//! terms the coverage calculator works from: deductible, co-pay and the
//! annual payout cap, together with how much of each has been consumed.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{
    CoveragePeriod, InsurancePolicyId, PatientId, ProviderId, Rate,
    money::{ensure_non_negative, round_money, MAX_AMOUNT},
};
use crate::error::InsuranceError;

/// Cost-sharing terms supplied when enrolling or editing a policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTerms {
    pub policy_number: String,
    pub group_number: Option<String>,
    /// Fixed co-pay; when non-zero it takes precedence over the percentage
    pub co_pay_amount: Decimal,
    pub co_pay_percentage: Decimal,
    pub deductible_amount: Decimal,
    /// `None` means the policy has no annual payout cap
    pub annual_max_coverage: Option<Decimal>,
    pub coverage_start: NaiveDate,
    pub coverage_end: Option<NaiveDate>,
}

impl PolicyTerms {
    /// Checks every field and returns the coverage period they describe
    pub fn validate(&self) -> Result<CoveragePeriod, InsuranceError> {
        if self.policy_number.trim().is_empty() {
            return Err(InsuranceError::validation("policy_number", "Policy number is required"));
        }
        ensure_non_negative(self.co_pay_amount)
            .map_err(|e| InsuranceError::validation("co_pay_amount", e.to_string()))?;
        ensure_non_negative(self.deductible_amount)
            .map_err(|e| InsuranceError::validation("deductible_amount", e.to_string()))?;
        if let Some(cap) = self.annual_max_coverage {
            ensure_non_negative(cap)
                .map_err(|e| InsuranceError::validation("annual_max_coverage", e.to_string()))?;
        }
        Rate::from_percentage(self.co_pay_percentage)
            .map_err(|e| InsuranceError::validation("co_pay_percentage", e.to_string()))?;

        CoveragePeriod::new(self.coverage_start, self.coverage_end)
            .map_err(|e| InsuranceError::validation("coverage_end", e.to_string()))
    }
}

/// A patient's enrollment with an insurance provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub id: InsurancePolicyId,
    pub patient_id: PatientId,
    pub provider_id: ProviderId,
    pub policy_number: String,
    pub group_number: Option<String>,
    pub co_pay_amount: Decimal,
    pub co_pay_percentage: Decimal,
    pub deductible_amount: Decimal,
    pub deductible_met: Decimal,
    pub annual_max_coverage: Option<Decimal>,
    pub annual_used_amount: Decimal,
    pub is_primary: bool,
    pub priority_order: i32,
    pub is_active: bool,
    pub coverage: CoveragePeriod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InsurancePolicy {
    /// Enrolls a patient with a provider
    ///
    /// # Arguments
    ///
    /// * `patient_id` - The insured patient
    /// * `provider_id` - The insurer
    /// * `terms` - Cost-sharing terms, validated here
    /// * `priority_order` - Billing order among the patient's policies (1 = first)
    pub fn enroll(
        patient_id: PatientId,
        provider_id: ProviderId,
        terms: PolicyTerms,
        priority_order: i32,
    ) -> Result<Self, InsuranceError> {
        let coverage = terms.validate()?;
        if priority_order < 1 {
            return Err(InsuranceError::validation("priority_order", "Priority order starts at 1"));
        }

        let now = Utc::now();
        Ok(Self {
            id: InsurancePolicyId::new_v7(),
            patient_id,
            provider_id,
            policy_number: terms.policy_number.trim().to_string(),
            group_number: terms.group_number,
            co_pay_amount: terms.co_pay_amount,
            co_pay_percentage: terms.co_pay_percentage,
            deductible_amount: terms.deductible_amount,
            deductible_met: Decimal::ZERO,
            annual_max_coverage: terms.annual_max_coverage,
            annual_used_amount: Decimal::ZERO,
            is_primary: false,
            priority_order,
            is_active: true,
            coverage,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replaces the cost-sharing terms, keeping consumption counters
    ///
    /// `deductible_met` is clamped to the new deductible.
    pub fn apply_terms(&mut self, terms: PolicyTerms) -> Result<(), InsuranceError> {
        let coverage = terms.validate()?;
        self.policy_number = terms.policy_number.trim().to_string();
        self.group_number = terms.group_number;
        self.co_pay_amount = terms.co_pay_amount;
        self.co_pay_percentage = terms.co_pay_percentage;
        self.deductible_amount = terms.deductible_amount;
        self.deductible_met = self.deductible_met.min(self.deductible_amount);
        self.annual_max_coverage = terms.annual_max_coverage;
        self.coverage = coverage;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Portion of the deductible still to be paid by the patient
    pub fn deductible_remaining(&self) -> Decimal {
        (self.deductible_amount - self.deductible_met).max(Decimal::ZERO)
    }

    /// Payout left under the annual cap; `None` when uncapped
    ///
    /// May be negative if manual adjustments pushed usage past the cap.
    pub fn annual_remaining(&self) -> Option<Decimal> {
        self.annual_max_coverage.map(|cap| cap - self.annual_used_amount)
    }

    /// The co-pay percentage as a rate
    pub fn co_pay_rate(&self) -> Rate {
        Rate::from_percentage(self.co_pay_percentage).unwrap_or(Rate::new(Decimal::ZERO))
    }

    /// Returns true when both co-pay styles are configured
    pub fn has_conflicting_co_pay(&self) -> bool {
        self.co_pay_amount > Decimal::ZERO && self.co_pay_percentage > Decimal::ZERO
    }

    /// Manual deductible adjustment; the result is clamped to `[0, deductible_amount]`
    pub fn adjust_deductible(&mut self, delta: Decimal) -> Decimal {
        self.deductible_met = round_money(self.deductible_met.saturating_add(delta))
            .max(Decimal::ZERO)
            .min(self.deductible_amount);
        self.updated_at = Utc::now();
        self.deductible_met
    }

    /// Manual annual-usage adjustment; the result is clamped to `[0, MAX_AMOUNT]`
    pub fn adjust_annual_used(&mut self, delta: Decimal) -> Decimal {
        self.annual_used_amount = round_money(self.annual_used_amount.saturating_add(delta))
            .max(Decimal::ZERO)
            .min(MAX_AMOUNT);
        self.updated_at = Utc::now();
        self.annual_used_amount
    }

    /// Records an insurer payout against the annual cap
    pub fn record_payout(&mut self, amount: Decimal) {
        self.adjust_annual_used(amount.max(Decimal::ZERO));
    }

    /// Soft-deletes the policy
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.is_primary = false;
        self.updated_at = Utc::now();
    }
}

/// Makes `primary` the only primary policy among one patient's policies
///
/// Returns the ids whose flag changed so callers persist only those rows.
pub fn assign_primary(
    policies: &mut [InsurancePolicy],
    primary: InsurancePolicyId,
) -> Result<Vec<InsurancePolicyId>, InsuranceError> {
    let target = policies
        .iter()
        .find(|p| p.id == primary)
        .ok_or_else(|| InsuranceError::validation("policy_id", "Policy does not belong to this patient"))?;
    if !target.is_active {
        return Err(InsuranceError::validation("policy_id", "An inactive policy cannot be primary"));
    }

    let now = Utc::now();
    let mut changed = Vec::new();
    for policy in policies.iter_mut() {
        let should_be_primary = policy.id == primary;
        if policy.is_primary != should_be_primary {
            policy.is_primary = should_be_primary;
            policy.updated_at = now;
            changed.push(policy.id);
        }
    }
    Ok(changed)
}

/// Next free priority slot for a patient
pub fn next_priority_order(existing: &[InsurancePolicy]) -> i32 {
    existing
        .iter()
        .filter(|p| p.is_active)
        .map(|p| p.priority_order)
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}
