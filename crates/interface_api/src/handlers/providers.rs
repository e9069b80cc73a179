//! Insurance provider handlers

use axum::{
    extract::{Path, Query, State},
    Extension,
};
use uuid::Uuid;

use core_kernel::{Caller, Permission, ProviderId};
use domain_insurance::InsuranceProvider;

use crate::auth::authorize;
use crate::dto::insurance::{CreateProviderRequest, ListProvidersQuery, UpdateProviderRequest};
use crate::dto::{created, ApiResponse, ApiResult, CreatedResult};
use crate::extract::ValidatedJson;
use crate::AppState;

pub async fn list_providers(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListProvidersQuery>,
) -> ApiResult<Vec<InsuranceProvider>> {
    authorize(&caller, Permission::ViewInsurance)?;
    Ok(ApiResponse::ok(state.insurance.list_providers(query.active_only).await?))
}

/// Registers a provider; codes are unique
pub async fn create_provider(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ValidatedJson(request): ValidatedJson<CreateProviderRequest>,
) -> CreatedResult<InsuranceProvider> {
    authorize(&caller, Permission::ManageInsurance)?;
    let provider = InsuranceProvider::new(request.name, request.code)?
        .with_contact(request.contact_email, request.contact_phone);
    Ok(created(state.insurance.create_provider(provider).await?))
}

pub async fn get_provider(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<InsuranceProvider> {
    authorize(&caller, Permission::ViewInsurance)?;
    Ok(ApiResponse::ok(state.insurance.get_provider(ProviderId::from_uuid(id)).await?))
}

pub async fn update_provider(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateProviderRequest>,
) -> ApiResult<InsuranceProvider> {
    authorize(&caller, Permission::ManageInsurance)?;
    let provider = state
        .insurance
        .update_provider(ProviderId::from_uuid(id), request.into())
        .await?;
    Ok(ApiResponse::ok(provider))
}

/// Deactivates a provider that no policy references
pub async fn delete_provider(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<InsuranceProvider> {
    authorize(&caller, Permission::ManageInsurance)?;
    let provider = state.insurance.delete_provider(ProviderId::from_uuid(id)).await?;
    Ok(ApiResponse::with_message(provider, "Insurance provider deactivated"))
}
