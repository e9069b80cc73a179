//! Claims DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_billing::{Bill, Payment};
use domain_insurance::{ClaimStatus, InsuranceClaim};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClaimRequest {
    pub insurance_policy_id: Uuid,
    pub claim_amount: Decimal,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateClaimRequest {
    pub claim_amount: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangeStatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
    pub approved_amount: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListClaimsQuery {
    pub bill_id: Option<Uuid>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClaimStatusResponse {
    pub id: Uuid,
    pub claim_number: String,
    pub status: ClaimStatus,
    pub claim_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub rejection_reason: Option<String>,
    pub submission_date: Option<DateTime<Utc>>,
    pub approval_date: Option<DateTime<Utc>>,
    pub is_editable: bool,
    pub allowed_transitions: Vec<ClaimStatus>,
}

impl From<&InsuranceClaim> for ClaimStatusResponse {
    fn from(claim: &InsuranceClaim) -> Self {
        Self {
            id: *claim.id.as_uuid(),
            claim_number: claim.claim_number.clone(),
            status: claim.status,
            claim_amount: claim.claim_amount,
            approved_amount: claim.approved_amount,
            rejection_reason: claim.rejection_reason.clone(),
            submission_date: claim.submission_date,
            approval_date: claim.approval_date,
            is_editable: claim.status.is_editable(),
            allowed_transitions: claim.status.allowed_transitions().to_vec(),
        }
    }
}

/// Outcome of a status change; bill and payment are present on approval
#[derive(Debug, Serialize)]
pub struct ClaimDecisionResponse {
    pub claim: InsuranceClaim,
    pub bill: Option<Bill>,
    pub payment: Option<Payment>,
}

/// A stored claim document; `content` is the base64-encoded file
#[derive(Debug, Serialize)]
pub struct DocumentDownload {
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    pub content: String,
}
