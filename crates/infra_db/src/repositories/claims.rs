//! Claims repository implementation
//!
//! This module persists insurance claims and settles their outcome against
//! the billing ledger. A decision on a claim, the payment it credits to the
//! bill and the policy's annual usage are committed together.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use core_kernel::{BillId, Caller, ClaimId, InsurancePolicyId, PatientId, UserId};
use domain_billing::{ledger, Bill, Payment};
use domain_insurance::{
    claim_number, ensure_single_open_claim, ClaimDocument, ClaimStatus, InsuranceClaim,
    InsuranceError, StatusChange,
};

use crate::error::DatabaseError;
use super::billing::{fetch_bill, insert_payment, save_balance};
use super::counters::{next_sequence, CLAIM_COUNTER};
use super::insurance::{fetch_policy, save_usage};

const CLAIM_COLUMNS: &str = r#"
    id, claim_number, bill_id, policy_id, patient_id, claim_amount, approved_amount,
    status, rejection_reason, notes, documents, submission_date, approval_date,
    processed_by, created_by, created_at, updated_at
"#;

/// Result of a status change
///
/// `bill` and `payment` are set when an approval credited the bill.
#[derive(Debug, Clone)]
pub struct ClaimDecision {
    pub claim: InsuranceClaim,
    pub bill: Option<Bill>,
    pub payment: Option<Payment>,
}

/// Repository for insurance claims
#[derive(Debug, Clone)]
pub struct ClaimsRepository {
    pool: PgPool,
}

impl ClaimsRepository {
    /// Creates a new ClaimsRepository with the given connection pool
    ///
    /// # Arguments
    ///
    /// * `pool` - The PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a draft claim against a bill
    ///
    /// The bill row is locked while existing claims are checked, so two
    /// concurrent requests cannot both open a claim on the same bill.
    ///
    /// # Arguments
    ///
    /// * `bill_id` - The bill being claimed
    /// * `policy_id` - An active policy of the bill's patient
    /// * `claim_amount` - Amount requested from the insurer
    /// * `notes` - Free text
    /// * `caller` - Stamped as `created_by`
    ///
    /// # Errors
    ///
    /// Returns `InsuranceError::OpenClaimExists` if the bill already has a non-terminal claim
    pub async fn create_claim(
        &self,
        bill_id: BillId,
        policy_id: InsurancePolicyId,
        claim_amount: Decimal,
        notes: Option<String>,
        caller: &Caller,
    ) -> Result<InsuranceClaim, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let bill = fetch_bill(&mut tx, bill_id, true).await?;
        bill.ensure_open()?;

        let statuses: Vec<String> =
            sqlx::query_scalar("SELECT status FROM insurance_claims WHERE bill_id = $1")
                .bind(bill_id.as_uuid())
                .fetch_all(&mut *tx)
                .await?;
        let statuses = statuses
            .iter()
            .map(|s| s.parse::<ClaimStatus>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DatabaseError::corrupt("insurance_claims.status", e))?;
        if let Err(e) = ensure_single_open_claim(statuses) {
            warn!(bill_id = %bill_id, "claim rejected, bill already has an open claim");
            return Err(e.into());
        }

        let policy = fetch_policy(&mut tx, policy_id, false).await.map_err(|e| {
            if e.is_not_found() {
                InsuranceError::validation("policy_id", "Insurance policy does not exist").into()
            } else {
                e
            }
        })?;
        if policy.patient_id != bill.patient_id {
            return Err(InsuranceError::validation("policy_id", "Policy does not cover the billed patient").into());
        }
        if !policy.is_active {
            return Err(InsuranceError::validation("policy_id", "Insurance policy is inactive").into());
        }

        let year = Utc::now().year();
        let sequence = next_sequence(&mut tx, CLAIM_COUNTER, year).await?;
        let claim = InsuranceClaim::draft(
            claim_number(year, sequence),
            bill.id,
            policy.id,
            bill.patient_id,
            claim_amount,
            notes,
            caller,
        )?;

        sqlx::query(
            r#"
            INSERT INTO insurance_claims (
                id, claim_number, bill_id, policy_id, patient_id, claim_amount, status,
                notes, documents, created_by, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(claim.id.as_uuid())
        .bind(&claim.claim_number)
        .bind(claim.bill_id.as_uuid())
        .bind(claim.policy_id.as_uuid())
        .bind(claim.patient_id.as_uuid())
        .bind(claim.claim_amount)
        .bind(claim.status.as_str())
        .bind(&claim.notes)
        .bind(Json(&claim.documents))
        .bind(claim.created_by.as_uuid())
        .bind(claim.created_at)
        .bind(claim.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            claim_id = %claim.id,
            claim_number = %claim.claim_number,
            bill_id = %claim.bill_id,
            amount = %claim.claim_amount,
            "insurance claim created"
        );
        Ok(claim)
    }

    pub async fn get_claim(&self, id: ClaimId) -> Result<InsuranceClaim, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        fetch_claim(&mut conn, id, false).await
    }

    /// Lists claims, newest first
    ///
    /// # Arguments
    ///
    /// * `bill_id` - Restrict to one bill's claims
    /// * `status` - Restrict to one status
    pub async fn list_claims(
        &self,
        bill_id: Option<BillId>,
        status: Option<ClaimStatus>,
    ) -> Result<Vec<InsuranceClaim>, DatabaseError> {
        let sql = format!(
            "SELECT {CLAIM_COLUMNS} FROM insurance_claims
             WHERE ($1::uuid IS NULL OR bill_id = $1)
               AND ($2::text IS NULL OR status = $2)
             ORDER BY created_at DESC"
        );
        let rows: Vec<ClaimRow> = sqlx::query_as(&sql)
            .bind(bill_id.map(|b| *b.as_uuid()))
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(InsuranceClaim::try_from).collect()
    }

    /// Edits the amount and notes of an open claim
    pub async fn update_claim(
        &self,
        id: ClaimId,
        claim_amount: Option<Decimal>,
        notes: Option<String>,
    ) -> Result<InsuranceClaim, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut claim = fetch_claim(&mut tx, id, true).await?;
        claim.update_details(claim_amount, notes)?;
        save_claim(&mut tx, &claim).await?;

        tx.commit().await?;

        info!(claim_id = %claim.id, amount = %claim.claim_amount, "insurance claim updated");
        Ok(claim)
    }

    /// Submits a draft or pending claim
    pub async fn submit_claim(&self, id: ClaimId, caller: &Caller) -> Result<InsuranceClaim, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut claim = fetch_claim(&mut tx, id, true).await?;
        claim.submit(caller, Utc::now())?;
        save_claim(&mut tx, &claim).await?;

        tx.commit().await?;

        info!(claim_id = %claim.id, "insurance claim submitted");
        Ok(claim)
    }

    /// Moves a claim through the transition table
    ///
    /// An approval or partial approval credits `min(approved, amount_due)` to
    /// the bill as an insurance payment and adds the approved amount to the
    /// policy's annual usage. A rejection leaves bill and policy untouched.
    ///
    /// # Errors
    ///
    /// Returns `InsuranceError::InvalidStatusTransition` for a change the
    /// table does not allow, and `BillingError::BillVoided` when approving a
    /// claim on a voided bill
    pub async fn change_status(
        &self,
        id: ClaimId,
        change: StatusChange,
        caller: &Caller,
    ) -> Result<ClaimDecision, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let bill_id: Uuid = sqlx::query_scalar("SELECT bill_id FROM insurance_claims WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::not_found("InsuranceClaim", id))?;
        let mut bill = fetch_bill(&mut tx, BillId::from_uuid(bill_id), true).await?;
        let mut claim = fetch_claim(&mut tx, id, true).await?;

        let from = claim.status;
        let resolution = claim.apply(change, caller, Utc::now())?;
        save_claim(&mut tx, &claim).await?;

        let mut decision = ClaimDecision { claim, bill: None, payment: None };
        if let Some(resolution) = resolution.filter(|r| r.is_approval()) {
            let payment = ledger::settle_insurance_claim(
                &mut bill,
                &resolution.claim_number,
                resolution.approved_amount,
                caller,
            )?;
            if let Some(payment) = &payment {
                insert_payment(&mut tx, payment).await?;
                save_balance(&mut tx, &bill).await?;
            }

            let mut policy = fetch_policy(&mut tx, resolution.policy_id, true).await?;
            policy.record_payout(resolution.approved_amount);
            save_usage(&mut tx, &policy).await?;

            decision.bill = Some(bill);
            decision.payment = payment;
        }

        tx.commit().await?;

        info!(
            claim_id = %decision.claim.id,
            from = %from,
            to = %decision.claim.status,
            processed_by = %caller.user_id,
            "insurance claim status changed"
        );
        Ok(decision)
    }

    /// Appends a stored document to an open claim
    pub async fn attach_document(
        &self,
        id: ClaimId,
        document: ClaimDocument,
    ) -> Result<InsuranceClaim, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut claim = fetch_claim(&mut tx, id, true).await?;
        claim.attach_document(document)?;
        save_claim(&mut tx, &claim).await?;

        tx.commit().await?;

        info!(claim_id = %claim.id, documents = claim.documents.len(), "claim document attached");
        Ok(claim)
    }

    /// Deletes an open claim
    ///
    /// # Returns
    ///
    /// The claim's documents, whose stored files the caller removes
    pub async fn delete_claim(&self, id: ClaimId) -> Result<Vec<ClaimDocument>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let claim = fetch_claim(&mut tx, id, true).await?;
        claim.ensure_deletable()?;
        sqlx::query("DELETE FROM insurance_claims WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(claim_id = %claim.id, claim_number = %claim.claim_number, "insurance claim deleted");
        Ok(claim.documents)
    }
}

async fn fetch_claim(
    conn: &mut PgConnection,
    id: ClaimId,
    for_update: bool,
) -> Result<InsuranceClaim, DatabaseError> {
    let sql = format!(
        "SELECT {CLAIM_COLUMNS} FROM insurance_claims WHERE id = $1{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row: ClaimRow = sqlx::query_as(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("InsuranceClaim", id))?;
    InsuranceClaim::try_from(row)
}

async fn save_claim(conn: &mut PgConnection, claim: &InsuranceClaim) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        UPDATE insurance_claims
        SET claim_amount = $2, approved_amount = $3, status = $4, rejection_reason = $5,
            notes = $6, documents = $7, submission_date = $8, approval_date = $9,
            processed_by = $10, updated_at = $11
        WHERE id = $1
        "#,
    )
    .bind(claim.id.as_uuid())
    .bind(claim.claim_amount)
    .bind(claim.approved_amount)
    .bind(claim.status.as_str())
    .bind(&claim.rejection_reason)
    .bind(&claim.notes)
    .bind(Json(&claim.documents))
    .bind(claim.submission_date)
    .bind(claim.approval_date)
    .bind(claim.processed_by.map(|u| *u.as_uuid()))
    .bind(claim.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct ClaimRow {
    id: Uuid,
    claim_number: String,
    bill_id: Uuid,
    policy_id: Uuid,
    patient_id: Uuid,
    claim_amount: Decimal,
    approved_amount: Option<Decimal>,
    status: String,
    rejection_reason: Option<String>,
    notes: Option<String>,
    documents: Json<Vec<ClaimDocument>>,
    submission_date: Option<DateTime<Utc>>,
    approval_date: Option<DateTime<Utc>>,
    processed_by: Option<Uuid>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ClaimRow> for InsuranceClaim {
    type Error = DatabaseError;

    fn try_from(row: ClaimRow) -> Result<Self, Self::Error> {
        Ok(InsuranceClaim {
            id: ClaimId::from_uuid(row.id),
            claim_number: row.claim_number,
            bill_id: BillId::from_uuid(row.bill_id),
            policy_id: InsurancePolicyId::from_uuid(row.policy_id),
            patient_id: PatientId::from_uuid(row.patient_id),
            claim_amount: row.claim_amount,
            approved_amount: row.approved_amount,
            status: row
                .status
                .parse()
                .map_err(|e| DatabaseError::corrupt("insurance_claims.status", e))?,
            rejection_reason: row.rejection_reason,
            notes: row.notes,
            documents: row.documents.0,
            submission_date: row.submission_date,
            approval_date: row.approval_date,
            processed_by: row.processed_by.map(UserId::from_uuid),
            created_by: UserId::from_uuid(row.created_by),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
