//! Insurance claim aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    BillId, Caller, ClaimId, InsurancePolicyId, PatientId, UserId,
    money::{ensure_positive, round_money},
};
use crate::document::ClaimDocument;
use crate::error::InsuranceError;

/// Formats a claim number: `CLM<year><5-digit sequence>`
pub fn claim_number(year: i32, sequence: i64) -> String {
    format!("CLM{}{:05}", year, sequence)
}

/// Claim status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Being prepared
    Draft,
    /// Ready, waiting to be sent
    Pending,
    /// Sent to the insurer
    Submitted,
    /// Insurer is reviewing
    UnderReview,
    /// Approved in full
    Approved,
    /// Approved for part of the claimed amount
    PartialApproved,
    /// Rejected by the insurer
    Rejected,
    /// Archived
    Closed,
}

impl ClaimStatus {
    pub const ALL: [ClaimStatus; 8] = [
        ClaimStatus::Draft,
        ClaimStatus::Pending,
        ClaimStatus::Submitted,
        ClaimStatus::UnderReview,
        ClaimStatus::Approved,
        ClaimStatus::PartialApproved,
        ClaimStatus::Rejected,
        ClaimStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Draft => "draft",
            ClaimStatus::Pending => "pending",
            ClaimStatus::Submitted => "submitted",
            ClaimStatus::UnderReview => "under_review",
            ClaimStatus::Approved => "approved",
            ClaimStatus::PartialApproved => "partial_approved",
            ClaimStatus::Rejected => "rejected",
            ClaimStatus::Closed => "closed",
        }
    }

    /// Statuses that still count as an open claim on the bill
    pub fn is_non_terminal(&self) -> bool {
        matches!(
            self,
            ClaimStatus::Draft | ClaimStatus::Pending | ClaimStatus::Submitted | ClaimStatus::UnderReview
        )
    }

    pub fn is_editable(&self) -> bool {
        self.is_non_terminal()
    }

    pub fn is_submittable(&self) -> bool {
        matches!(self, ClaimStatus::Draft | ClaimStatus::Pending)
    }

    /// The transition table
    pub fn allowed_transitions(&self) -> &'static [ClaimStatus] {
        use ClaimStatus::*;
        match self {
            Draft => &[Pending, Submitted, Closed],
            Pending => &[Submitted, Closed],
            Submitted => &[UnderReview, Approved, PartialApproved, Rejected],
            UnderReview => &[Approved, PartialApproved, Rejected],
            Approved | PartialApproved | Rejected => &[Closed],
            Closed => &[],
        }
    }

    pub fn can_transition_to(&self, target: ClaimStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = InsuranceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClaimStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InsuranceError::validation("status", format!("Unknown claim status '{}'", s)))
    }
}

/// A requested status change with the data it needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    MarkPending,
    Submit,
    StartReview,
    Approve { approved_amount: Decimal },
    PartiallyApprove { approved_amount: Decimal },
    Reject { reason: String },
    Close,
}

impl StatusChange {
    /// Builds a change from the loose fields of a status-update request
    pub fn from_request(
        status: ClaimStatus,
        approved_amount: Option<Decimal>,
        rejection_reason: Option<String>,
    ) -> Result<Self, InsuranceError> {
        let approved = || {
            approved_amount.ok_or_else(|| {
                InsuranceError::validation("approved_amount", "Approved amount is required")
            })
        };
        Ok(match status {
            ClaimStatus::Draft => {
                return Err(InsuranceError::validation("status", "A claim cannot be moved back to draft"))
            }
            ClaimStatus::Pending => StatusChange::MarkPending,
            ClaimStatus::Submitted => StatusChange::Submit,
            ClaimStatus::UnderReview => StatusChange::StartReview,
            ClaimStatus::Approved => StatusChange::Approve { approved_amount: approved()? },
            ClaimStatus::PartialApproved => StatusChange::PartiallyApprove { approved_amount: approved()? },
            ClaimStatus::Rejected => {
                let reason = rejection_reason
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| {
                        InsuranceError::validation("rejection_reason", "Rejection reason is required")
                    })?;
                StatusChange::Reject { reason }
            }
            ClaimStatus::Closed => StatusChange::Close,
        })
    }

    pub fn target(&self) -> ClaimStatus {
        match self {
            StatusChange::MarkPending => ClaimStatus::Pending,
            StatusChange::Submit => ClaimStatus::Submitted,
            StatusChange::StartReview => ClaimStatus::UnderReview,
            StatusChange::Approve { .. } => ClaimStatus::Approved,
            StatusChange::PartiallyApprove { .. } => ClaimStatus::PartialApproved,
            StatusChange::Reject { .. } => ClaimStatus::Rejected,
            StatusChange::Close => ClaimStatus::Closed,
        }
    }
}

/// Insurer decision to be settled against the bill and the policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResolution {
    pub claim_id: ClaimId,
    pub claim_number: String,
    pub bill_id: BillId,
    pub policy_id: InsurancePolicyId,
    pub status: ClaimStatus,
    /// Zero for rejections
    pub approved_amount: Decimal,
}

impl ClaimResolution {
    pub fn is_approval(&self) -> bool {
        matches!(self.status, ClaimStatus::Approved | ClaimStatus::PartialApproved)
    }
}

/// A reimbursement request to an insurer against a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceClaim {
    pub id: ClaimId,
    pub claim_number: String,
    pub bill_id: BillId,
    pub policy_id: InsurancePolicyId,
    pub patient_id: PatientId,
    pub claim_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub status: ClaimStatus,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub documents: Vec<ClaimDocument>,
    pub submission_date: Option<DateTime<Utc>>,
    pub approval_date: Option<DateTime<Utc>>,
    pub processed_by: Option<UserId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InsuranceClaim {
    /// Opens a claim in `draft`
    pub fn draft(
        claim_number: String,
        bill_id: BillId,
        policy_id: InsurancePolicyId,
        patient_id: PatientId,
        claim_amount: Decimal,
        notes: Option<String>,
        caller: &Caller,
    ) -> Result<Self, InsuranceError> {
        let claim_amount = ensure_positive(round_money(claim_amount))
            .map_err(|e| InsuranceError::validation("claim_amount", e.to_string()))?;

        let now = Utc::now();
        Ok(Self {
            id: ClaimId::new_v7(),
            claim_number,
            bill_id,
            policy_id,
            patient_id,
            claim_amount,
            approved_amount: None,
            status: ClaimStatus::Draft,
            rejection_reason: None,
            notes,
            documents: Vec::new(),
            submission_date: None,
            approval_date: None,
            processed_by: None,
            created_by: caller.user_id,
            created_at: now,
            updated_at: now,
        })
    }

    fn ensure_editable(&self) -> Result<(), InsuranceError> {
        if !self.status.is_editable() {
            return Err(InsuranceError::ClaimFinalized {
                claim_number: self.claim_number.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    /// Applies a status change through the transition table
    ///
    /// Returns a resolution when the insurer decided on the claim; the caller
    /// settles it against the bill in the same transaction.
    pub fn apply(
        &mut self,
        change: StatusChange,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimResolution>, InsuranceError> {
        let target = change.target();
        if !self.status.can_transition_to(target) {
            return Err(InsuranceError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }

        let resolution = match change {
            StatusChange::Submit => {
                self.submission_date = Some(now);
                None
            }
            StatusChange::Approve { approved_amount }
            | StatusChange::PartiallyApprove { approved_amount } => {
                let approved_amount = self.check_approved_amount(approved_amount)?;
                self.approved_amount = Some(approved_amount);
                self.rejection_reason = None;
                self.approval_date = Some(now);
                self.processed_by = Some(caller.user_id);
                Some(approved_amount)
            }
            StatusChange::Reject { reason } => {
                if reason.trim().is_empty() {
                    return Err(InsuranceError::validation(
                        "rejection_reason",
                        "Rejection reason is required",
                    ));
                }
                self.rejection_reason = Some(reason);
                self.approved_amount = None;
                self.processed_by = Some(caller.user_id);
                Some(Decimal::ZERO)
            }
            StatusChange::MarkPending | StatusChange::StartReview | StatusChange::Close => None,
        };

        self.status = target;
        self.updated_at = now;

        Ok(resolution.map(|approved_amount| ClaimResolution {
            claim_id: self.id,
            claim_number: self.claim_number.clone(),
            bill_id: self.bill_id,
            policy_id: self.policy_id,
            status: target,
            approved_amount,
        }))
    }

    fn check_approved_amount(&self, amount: Decimal) -> Result<Decimal, InsuranceError> {
        let amount = ensure_positive(round_money(amount))
            .map_err(|e| InsuranceError::validation("approved_amount", e.to_string()))?;
        if amount > self.claim_amount {
            return Err(InsuranceError::ApprovedExceedsClaim {
                approved: amount,
                claimed: self.claim_amount,
            });
        }
        Ok(amount)
    }

    /// Submits a draft or pending claim
    pub fn submit(&mut self, caller: &Caller, now: DateTime<Utc>) -> Result<(), InsuranceError> {
        if !self.status.is_submittable() {
            return Err(InsuranceError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: ClaimStatus::Submitted.to_string(),
            });
        }
        self.apply(StatusChange::Submit, caller, now).map(|_| ())
    }

    /// Edits amount and notes while the claim is still open
    pub fn update_details(
        &mut self,
        claim_amount: Option<Decimal>,
        notes: Option<String>,
    ) -> Result<(), InsuranceError> {
        self.ensure_editable()?;
        if let Some(amount) = claim_amount {
            self.claim_amount = ensure_positive(round_money(amount))
                .map_err(|e| InsuranceError::validation("claim_amount", e.to_string()))?;
        }
        if notes.is_some() {
            self.notes = notes;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn attach_document(&mut self, document: ClaimDocument) -> Result<(), InsuranceError> {
        self.ensure_editable()?;
        self.documents.push(document);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn document(&self, index: usize) -> Result<&ClaimDocument, InsuranceError> {
        self.documents.get(index).ok_or(InsuranceError::DocumentNotFound(index))
    }

    /// Fails once the claim has been decided or closed
    pub fn ensure_deletable(&self) -> Result<(), InsuranceError> {
        self.ensure_editable()
    }
}

/// Fails if any of a bill's existing claims is still open
pub fn ensure_single_open_claim(
    existing: impl IntoIterator<Item = ClaimStatus>,
) -> Result<(), InsuranceError> {
    match existing.into_iter().find(ClaimStatus::is_non_terminal) {
        Some(status) => Err(InsuranceError::OpenClaimExists { status: status.to_string() }),
        None => Ok(()),
    }
}
