//! Patient insurance policy handlers

use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::Utc;
use uuid::Uuid;

use core_kernel::{Caller, InsurancePolicyId, PatientId, Permission, ProviderId};
use domain_insurance::{calculate_coverage as compute_coverage, validate_policy, CoverageBreakdown, InsurancePolicy, PolicyValidation};

use crate::auth::authorize;
use crate::dto::insurance::{
    AdjustmentRequest, CoverageRequest, CreatePolicyRequest, PolicyDetails, UpdatePolicyRequest,
};
use crate::dto::{created, ApiResponse, ApiResult, CreatedResult};
use crate::extract::ValidatedJson;
use crate::AppState;

/// Enrolls a patient in a provider's plan
pub async fn create_policy(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ValidatedJson(request): ValidatedJson<CreatePolicyRequest>,
) -> CreatedResult<InsurancePolicy> {
    authorize(&caller, Permission::ManageInsurance)?;
    let policy = state
        .insurance
        .create_policy(
            PatientId::from_uuid(request.patient_id),
            ProviderId::from_uuid(request.insurance_provider_id),
            request.terms.into(),
            request.priority_order,
            request.is_primary,
        )
        .await?;
    Ok(created(policy))
}

/// A patient's policies, primary first
pub async fn list_patient_policies(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<Vec<InsurancePolicy>> {
    authorize(&caller, Permission::ViewInsurance)?;
    Ok(ApiResponse::ok(state.insurance.list_policies(PatientId::from_uuid(patient_id)).await?))
}

/// The policy with its provider and remaining allowances
pub async fn get_policy(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<PolicyDetails> {
    authorize(&caller, Permission::ViewInsurance)?;
    let (policy, provider) = state
        .insurance
        .policy_with_provider(InsurancePolicyId::from_uuid(id))
        .await?;
    Ok(ApiResponse::ok(PolicyDetails::new(policy, provider)))
}

pub async fn update_policy(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdatePolicyRequest>,
) -> ApiResult<InsurancePolicy> {
    authorize(&caller, Permission::ManageInsurance)?;
    let policy = state
        .insurance
        .update_policy(InsurancePolicyId::from_uuid(id), request.terms.into(), request.priority_order)
        .await?;
    Ok(ApiResponse::ok(policy))
}

/// Deactivates a policy no claim references
pub async fn delete_policy(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<InsurancePolicy> {
    authorize(&caller, Permission::ManageInsurance)?;
    let policy = state.insurance.delete_policy(InsurancePolicyId::from_uuid(id)).await?;
    Ok(ApiResponse::with_message(policy, "Patient insurance removed"))
}

pub async fn set_primary(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<InsurancePolicy> {
    authorize(&caller, Permission::ManageInsurance)?;
    let policy = state.insurance.set_primary(InsurancePolicyId::from_uuid(id)).await?;
    Ok(ApiResponse::with_message(policy, "Primary insurance updated"))
}

/// Signed adjustment of the deductible met, clamped to the deductible
pub async fn update_deductible(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<AdjustmentRequest>,
) -> ApiResult<InsurancePolicy> {
    authorize(&caller, Permission::ManageInsurance)?;
    let policy = state
        .insurance
        .adjust_deductible(InsurancePolicyId::from_uuid(id), request.amount)
        .await?;
    Ok(ApiResponse::ok(policy))
}

/// Signed adjustment of the annual amount used, never below zero
pub async fn update_annual_used(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<AdjustmentRequest>,
) -> ApiResult<InsurancePolicy> {
    authorize(&caller, Permission::ManageInsurance)?;
    let policy = state
        .insurance
        .adjust_annual_used(InsurancePolicyId::from_uuid(id), request.amount)
        .await?;
    Ok(ApiResponse::ok(policy))
}

/// Splits a charge between insurer and patient; nothing is persisted
pub async fn calculate_coverage(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CoverageRequest>,
) -> ApiResult<CoverageBreakdown> {
    authorize(&caller, Permission::ViewInsurance)?;
    let policy = state.insurance.get_policy(InsurancePolicyId::from_uuid(id)).await?;
    Ok(ApiResponse::ok(compute_coverage(request.amount, &policy)?))
}

pub async fn validate(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<PolicyValidation> {
    authorize(&caller, Permission::ViewInsurance)?;
    let (policy, provider) = state
        .insurance
        .policy_with_provider(InsurancePolicyId::from_uuid(id))
        .await?;
    let today = Utc::now().date_naive();
    Ok(ApiResponse::ok(validate_policy(&policy, provider.as_ref(), today)))
}
