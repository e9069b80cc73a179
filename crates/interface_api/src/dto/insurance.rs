//! Insurance provider and patient policy DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_insurance::{InsurancePolicy, InsuranceProvider, PolicyTerms};
use infra_db::ProviderUpdate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProviderRequest {
    #[validate(length(min = 1, max = 255, message = "Provider name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 20, message = "Provider code is required"))]
    pub code: String,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(length(max = 30))]
    pub contact_phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProviderRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(length(max = 30))]
    pub contact_phone: Option<String>,
    pub is_active: Option<bool>,
}

impl From<UpdateProviderRequest> for ProviderUpdate {
    fn from(r: UpdateProviderRequest) -> Self {
        ProviderUpdate {
            name: r.name,
            contact_email: r.contact_email,
            contact_phone: r.contact_phone,
            is_active: r.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListProvidersQuery {
    #[serde(default)]
    pub active_only: bool,
}

/// Cost-sharing terms shared by create and update
#[derive(Debug, Deserialize, Validate)]
pub struct PolicyTermsRequest {
    #[validate(length(min = 1, max = 100, message = "Policy number is required"))]
    pub policy_number: String,
    #[validate(length(max = 100))]
    pub group_number: Option<String>,
    #[serde(default)]
    pub co_pay_amount: Decimal,
    #[serde(default)]
    pub co_pay_percentage: Decimal,
    #[serde(default)]
    pub deductible_amount: Decimal,
    /// Absent means no annual cap
    pub annual_max_coverage: Option<Decimal>,
    pub coverage_start_date: NaiveDate,
    pub coverage_end_date: Option<NaiveDate>,
}

impl From<PolicyTermsRequest> for PolicyTerms {
    fn from(r: PolicyTermsRequest) -> Self {
        PolicyTerms {
            policy_number: r.policy_number,
            group_number: r.group_number,
            co_pay_amount: r.co_pay_amount,
            co_pay_percentage: r.co_pay_percentage,
            deductible_amount: r.deductible_amount,
            annual_max_coverage: r.annual_max_coverage,
            coverage_start: r.coverage_start_date,
            coverage_end: r.coverage_end_date,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePolicyRequest {
    pub patient_id: Uuid,
    pub insurance_provider_id: Uuid,
    #[serde(flatten)]
    #[validate(nested)]
    pub terms: PolicyTermsRequest,
    #[validate(range(min = 1, max = 1000, message = "Priority order must be between 1 and 1000"))]
    pub priority_order: Option<i32>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePolicyRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub terms: PolicyTermsRequest,
    #[validate(range(min = 1, max = 1000, message = "Priority order must be between 1 and 1000"))]
    pub priority_order: Option<i32>,
}

/// Signed manual adjustment of a usage counter
#[derive(Debug, Deserialize, Validate)]
pub struct AdjustmentRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CoverageRequest {
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PolicyDetails {
    #[serde(flatten)]
    pub policy: InsurancePolicy,
    pub provider: Option<InsuranceProvider>,
    pub deductible_remaining: Decimal,
    pub annual_remaining: Option<Decimal>,
}

impl PolicyDetails {
    pub fn new(policy: InsurancePolicy, provider: Option<InsuranceProvider>) -> Self {
        Self {
            deductible_remaining: policy.deductible_remaining(),
            annual_remaining: policy.annual_remaining(),
            policy,
            provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flattened_terms() {
        let request: CreatePolicyRequest = serde_json::from_value(serde_json::json!({
            "patient_id": Uuid::new_v4(),
            "insurance_provider_id": Uuid::new_v4(),
            "policy_number": "POL-1",
            "co_pay_percentage": "20",
            "deductible_amount": 100,
            "coverage_start_date": "2024-01-01",
            "is_primary": true
        }))
        .unwrap();
        assert!(request.validate().is_ok());

        let terms: PolicyTerms = request.terms.into();
        assert_eq!(terms.annual_max_coverage, None);
        assert_eq!(terms.deductible_amount, Decimal::from(100));
    }

    #[test]
    fn test_bad_email_rejected() {
        let request = CreateProviderRequest {
            name: "Blue Shield".into(),
            code: "BSH".into(),
            contact_email: Some("not-an-email".into()),
            contact_phone: None,
        };
        assert!(request.validate().is_err());
    }
}
