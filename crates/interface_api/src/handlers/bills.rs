//! Bill handlers

use axum::{
    extract::{Path, Query, State},
    Extension,
};
use uuid::Uuid;

use core_kernel::{BillId, Caller, DoctorId, PatientId, Permission};
use domain_billing::{Bill, BillingSummary};

use crate::auth::authorize;
use crate::dto::billing::{CreateBillRequest, ListBillsQuery, UpdateBillRequest, VoidBillQuery};
use crate::dto::{created, ApiResponse, ApiResult, CreatedResult};
use crate::extract::ValidatedJson;
use crate::AppState;

/// Lists bills, newest first, optionally for one patient
pub async fn list_bills(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListBillsQuery>,
) -> ApiResult<Vec<Bill>> {
    authorize(&caller, Permission::ViewBilling)?;
    let limit = query.limit.clamp(1, 200);
    let bills = state
        .billing
        .list_bills(query.patient_id.map(PatientId::from_uuid), limit, query.offset.max(0))
        .await?;
    Ok(ApiResponse::ok(bills))
}

/// Creates a bill with a freshly reserved bill number
pub async fn create_bill(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ValidatedJson(mut request): ValidatedJson<CreateBillRequest>,
) -> CreatedResult<Bill> {
    authorize(&caller, Permission::CreateBilling)?;
    let charges = request.charges();
    let bill = state
        .billing
        .create_bill(
            PatientId::from_uuid(request.patient_id),
            request.doctor_id.map(DoctorId::from_uuid),
            charges,
            request.notes.take(),
            &caller,
        )
        .await?;
    Ok(created(bill))
}

/// Totals over all non-voided bills
pub async fn summary(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<BillingSummary> {
    authorize(&caller, Permission::ViewBilling)?;
    Ok(ApiResponse::ok(state.billing.summary().await?))
}

pub async fn get_bill(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<Bill> {
    authorize(&caller, Permission::ViewBilling)?;
    Ok(ApiResponse::ok(state.billing.get_bill(BillId::from_uuid(id)).await?))
}

/// Edits an open bill; amounts are recomputed from the merged charges
pub async fn update_bill(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidatedJson(mut request): ValidatedJson<UpdateBillRequest>,
) -> ApiResult<Bill> {
    authorize(&caller, Permission::EditBilling)?;
    let patch = request.patch();
    let bill = state
        .billing
        .update_bill(
            BillId::from_uuid(id),
            patch,
            request.doctor_id.map(DoctorId::from_uuid),
            request.notes.take(),
        )
        .await?;
    Ok(ApiResponse::ok(bill))
}

/// Voids a bill that has nothing paid against it
pub async fn void_bill(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Query(query): Query<VoidBillQuery>,
) -> ApiResult<Bill> {
    authorize(&caller, Permission::DeleteBilling)?;
    let bill = state.billing.void_bill(BillId::from_uuid(id), query.reason, &caller).await?;
    Ok(ApiResponse::with_message(bill, "Bill voided"))
}
