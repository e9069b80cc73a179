//! Pharmacy handlers

use axum::{
    extract::{Path, State},
    Extension,
};
use uuid::Uuid;

use core_kernel::{Caller, MedicineId, PatientId, Permission, PurchaseId};
use domain_pharmacy::{Medicine, Purchase, StockMovement};

use crate::auth::authorize;
use crate::dto::pharmacy::{
    CreateMedicineRequest, CreatePurchaseRequest, CreateSaleRequest, PurchaseResponse, SaleResponse,
};
use crate::dto::{created, ApiResponse, ApiResult, CreatedResult};
use crate::extract::ValidatedJson;
use crate::AppState;

pub async fn list_medicines(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<Medicine>> {
    authorize(&caller, Permission::ViewPharmacy)?;
    Ok(ApiResponse::ok(state.pharmacy.list_medicines().await?))
}

pub async fn create_medicine(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ValidatedJson(request): ValidatedJson<CreateMedicineRequest>,
) -> CreatedResult<Medicine> {
    authorize(&caller, Permission::ManagePharmacy)?;
    Ok(created(state.pharmacy.create_medicine(request.into()).await?))
}

/// Medicines at or below their reorder level
pub async fn low_stock(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<Medicine>> {
    authorize(&caller, Permission::ViewPharmacy)?;
    Ok(ApiResponse::ok(state.pharmacy.low_stock().await?))
}

pub async fn get_medicine(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<Medicine> {
    authorize(&caller, Permission::ViewPharmacy)?;
    Ok(ApiResponse::ok(state.pharmacy.get_medicine(MedicineId::from_uuid(id)).await?))
}

pub async fn stock_movements(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<StockMovement>> {
    authorize(&caller, Permission::ViewPharmacy)?;
    Ok(ApiResponse::ok(state.pharmacy.stock_movements(MedicineId::from_uuid(id)).await?))
}

/// Sells one or more medicines; any short line rejects the whole sale
pub async fn create_sale(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ValidatedJson(request): ValidatedJson<CreateSaleRequest>,
) -> CreatedResult<SaleResponse> {
    authorize(&caller, Permission::ManagePharmacy)?;
    let lines = request.items.into_iter().map(Into::into).collect();
    let (sale, movements) = state
        .pharmacy
        .create_sale(
            lines,
            request.patient_id.map(PatientId::from_uuid),
            &request.payment_method,
            &caller,
        )
        .await?;
    Ok(created(SaleResponse { sale, movements }))
}

pub async fn create_purchase(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ValidatedJson(request): ValidatedJson<CreatePurchaseRequest>,
) -> CreatedResult<Purchase> {
    authorize(&caller, Permission::ManagePharmacy)?;
    let lines = request.items.into_iter().map(Into::into).collect();
    let purchase = state
        .pharmacy
        .create_purchase(&request.supplier_name, lines, &caller)
        .await?;
    Ok(created(purchase))
}

pub async fn get_purchase(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<Purchase> {
    authorize(&caller, Permission::ViewPharmacy)?;
    Ok(ApiResponse::ok(state.pharmacy.get_purchase(PurchaseId::from_uuid(id)).await?))
}

pub async fn mark_ordered(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<Purchase> {
    authorize(&caller, Permission::ManagePharmacy)?;
    Ok(ApiResponse::ok(state.pharmacy.mark_ordered(PurchaseId::from_uuid(id)).await?))
}

/// Books the delivery into stock
pub async fn receive_purchase(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<PurchaseResponse> {
    authorize(&caller, Permission::ManagePharmacy)?;
    let (purchase, movements) = state
        .pharmacy
        .receive_purchase(PurchaseId::from_uuid(id), &caller)
        .await?;
    Ok(ApiResponse::ok(PurchaseResponse { purchase, movements }))
}

/// Cancels a purchase, reversing stock if it was already received
pub async fn cancel_purchase(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<PurchaseResponse> {
    authorize(&caller, Permission::ManagePharmacy)?;
    let (purchase, movements) = state
        .pharmacy
        .cancel_purchase(PurchaseId::from_uuid(id), &caller)
        .await?;
    Ok(ApiResponse::ok(PurchaseResponse { purchase, movements }))
}
