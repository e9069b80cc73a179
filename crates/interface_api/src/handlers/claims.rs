//! Insurance claim handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    Extension,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::warn;
use uuid::Uuid;

use core_kernel::{BillId, Caller, ClaimId, InsurancePolicyId, Permission};
use domain_insurance::{ClaimDocument, ClaimStatus, InsuranceClaim, StatusChange};

use crate::auth::authorize;
use crate::dto::claims::{
    ChangeStatusRequest, ClaimDecisionResponse, ClaimStatusResponse, CreateClaimRequest,
    DocumentDownload, ListClaimsQuery, UpdateClaimRequest,
};
use crate::dto::{created, ApiResponse, ApiResult, CreatedResult};
use crate::error::ApiError;
use crate::extract::ValidatedJson;
use crate::AppState;

/// Opens a draft claim for a bill against one of the patient's policies
pub async fn create_claim(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(bill_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CreateClaimRequest>,
) -> CreatedResult<InsuranceClaim> {
    authorize(&caller, Permission::CreateInsuranceClaims)?;
    let claim = state
        .claims
        .create_claim(
            BillId::from_uuid(bill_id),
            InsurancePolicyId::from_uuid(request.insurance_policy_id),
            request.claim_amount,
            request.notes,
            &caller,
        )
        .await?;
    Ok(created(claim))
}

pub async fn list_claims(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListClaimsQuery>,
) -> ApiResult<Vec<InsuranceClaim>> {
    authorize(&caller, Permission::ViewInsuranceClaims)?;
    let status = query.status.as_deref().map(str::parse::<ClaimStatus>).transpose()?;
    let claims = state
        .claims
        .list_claims(query.bill_id.map(BillId::from_uuid), status)
        .await?;
    Ok(ApiResponse::ok(claims))
}

pub async fn get_claim(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<InsuranceClaim> {
    authorize(&caller, Permission::ViewInsuranceClaims)?;
    Ok(ApiResponse::ok(state.claims.get_claim(ClaimId::from_uuid(id)).await?))
}

/// Edits amount and notes while the claim is still open
pub async fn update_claim(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateClaimRequest>,
) -> ApiResult<InsuranceClaim> {
    authorize(&caller, Permission::EditInsuranceClaims)?;
    let claim = state
        .claims
        .update_claim(ClaimId::from_uuid(id), request.claim_amount, request.notes)
        .await?;
    Ok(ApiResponse::ok(claim))
}

/// Deletes an open claim and its stored documents
pub async fn delete_claim(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    authorize(&caller, Permission::DeleteInsuranceClaims)?;
    let documents = state.claims.delete_claim(ClaimId::from_uuid(id)).await?;
    for document in &documents {
        if let Err(e) = state.documents.delete(&document.path).await {
            warn!(path = %document.path, error = %e, "orphaned claim document");
        }
    }
    Ok(ApiResponse::message("Insurance claim deleted"))
}

/// Moves a draft claim to submitted
pub async fn submit_claim(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<InsuranceClaim> {
    authorize(&caller, Permission::EditInsuranceClaims)?;
    let claim = state.claims.submit_claim(ClaimId::from_uuid(id), &caller).await?;
    Ok(ApiResponse::with_message(claim, "Insurance claim submitted"))
}

pub async fn claim_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<ClaimStatusResponse> {
    authorize(&caller, Permission::ViewInsuranceClaims)?;
    let claim = state.claims.get_claim(ClaimId::from_uuid(id)).await?;
    Ok(ApiResponse::ok(ClaimStatusResponse::from(&claim)))
}

/// Applies an insurer decision
///
/// Approval credits the bill with an insurance payment and books the
/// approved amount against the policy's annual usage, atomically.
pub async fn change_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ChangeStatusRequest>,
) -> ApiResult<ClaimDecisionResponse> {
    authorize(&caller, Permission::EditInsuranceClaims)?;
    let status: ClaimStatus = request.status.parse()?;
    let change = StatusChange::from_request(status, request.approved_amount, request.rejection_reason)?;
    let decision = state.claims.change_status(ClaimId::from_uuid(id), change, &caller).await?;
    Ok(ApiResponse::ok(ClaimDecisionResponse {
        claim: decision.claim,
        bill: decision.bill,
        payment: decision.payment,
    }))
}

/// Stores the multipart `file` field and attaches it to an open claim
pub async fn upload_document(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> CreatedResult<InsuranceClaim> {
    authorize(&caller, Permission::EditInsuranceClaims)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid("file", e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("document").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::invalid("file", e.body_text()))?;
        upload = Some((file_name, mime_type, bytes));
    }

    let (file_name, mime_type, bytes) =
        upload.ok_or_else(|| ApiError::invalid("file", "A file is required"))?;
    if bytes.is_empty() {
        return Err(ApiError::invalid("file", "The file is empty"));
    }
    if bytes.len() > state.config.max_document_bytes {
        return Err(ApiError::invalid(
            "file",
            format!("File exceeds the {} byte limit", state.config.max_document_bytes),
        ));
    }

    let claim_id = ClaimId::from_uuid(id);
    let document = ClaimDocument::new(claim_id, &file_name, bytes.len() as u64, mime_type);
    let path = document.path.clone();
    state.documents.put(&path, bytes.to_vec()).await?;

    match state.claims.attach_document(claim_id, document).await {
        Ok(claim) => Ok(created(claim)),
        Err(e) => {
            if let Err(cleanup) = state.documents.delete(&path).await {
                warn!(path = %path, error = %cleanup, "orphaned claim document");
            }
            Err(e.into())
        }
    }
}

/// Returns a stored document with its bytes base64-encoded
pub async fn download_document(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> ApiResult<DocumentDownload> {
    authorize(&caller, Permission::ViewInsuranceClaims)?;
    let claim = state.claims.get_claim(ClaimId::from_uuid(id)).await?;
    let document = claim.document(index)?;
    let bytes = state.documents.get(&document.path).await?;
    Ok(ApiResponse::ok(DocumentDownload {
        file_name: document.name.clone(),
        mime_type: document.mime_type.clone(),
        size: document.size,
        content: STANDARD.encode(bytes),
    }))
}
