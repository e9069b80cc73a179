//! Insurance repository implementation
//!
//! Providers and patient insurance policies. Policy rows are locked before
//! any change to the primary flag or the deductible and annual-usage
//! counters.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use core_kernel::{CoveragePeriod, InsurancePolicyId, PatientId, ProviderId};
use domain_insurance::{
    assign_primary, next_priority_order, InsuranceError, InsurancePolicy, InsuranceProvider,
    PolicyTerms,
};

use crate::error::DatabaseError;

const PROVIDER_COLUMNS: &str =
    "id, name, code, contact_email, contact_phone, is_active, created_at, updated_at";

const POLICY_COLUMNS: &str = r#"
    id, patient_id, provider_id, policy_number, group_number, co_pay_amount,
    co_pay_percentage, deductible_amount, deductible_met, annual_max_coverage,
    annual_used_amount, is_primary, priority_order, is_active, coverage_start,
    coverage_end, created_at, updated_at
"#;

/// Fields an edit may change on a provider
#[derive(Debug, Clone, Default)]
pub struct ProviderUpdate {
    pub name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub is_active: Option<bool>,
}

/// Repository for insurance providers and patient policies
#[derive(Debug, Clone)]
pub struct InsuranceRepository {
    pool: PgPool,
}

impl InsuranceRepository {
    /// Creates a new InsuranceRepository with the given connection pool
    ///
    /// # Arguments
    ///
    /// * `pool` - The PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------------
    // Providers
    // ------------------------------------------------------------------------

    /// Inserts a new provider
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::DuplicateEntry` if the code is already taken
    pub async fn create_provider(
        &self,
        provider: InsuranceProvider,
    ) -> Result<InsuranceProvider, DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO insurance_providers (
                id, name, code, contact_email, contact_phone, is_active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(provider.id.as_uuid())
        .bind(&provider.name)
        .bind(&provider.code)
        .bind(&provider.contact_email)
        .bind(&provider.contact_phone)
        .bind(provider.is_active)
        .bind(provider.created_at)
        .bind(provider.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => {
                DatabaseError::duplicate("InsuranceProvider", "code", &provider.code)
            }
            other => other,
        })?;

        info!(provider_id = %provider.id, code = %provider.code, "insurance provider created");
        Ok(provider)
    }

    pub async fn get_provider(&self, id: ProviderId) -> Result<InsuranceProvider, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        fetch_provider(&mut conn, id, false)
            .await?
            .ok_or_else(|| DatabaseError::not_found("InsuranceProvider", id))
    }

    /// Lists providers by name
    ///
    /// # Arguments
    ///
    /// * `active_only` - Skip deactivated providers
    pub async fn list_providers(&self, active_only: bool) -> Result<Vec<InsuranceProvider>, DatabaseError> {
        let sql = format!(
            "SELECT {PROVIDER_COLUMNS} FROM insurance_providers
             WHERE ($1 = FALSE OR is_active)
             ORDER BY name"
        );
        let rows: Vec<ProviderRow> = sqlx::query_as(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(InsuranceProvider::from).collect())
    }

    pub async fn update_provider(
        &self,
        id: ProviderId,
        update: ProviderUpdate,
    ) -> Result<InsuranceProvider, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut provider = fetch_provider(&mut tx, id, true)
            .await?
            .ok_or_else(|| DatabaseError::not_found("InsuranceProvider", id))?;
        provider.update(update.name, update.contact_email, update.contact_phone, update.is_active)?;
        save_provider(&mut tx, &provider).await?;

        tx.commit().await?;

        info!(provider_id = %provider.id, "insurance provider updated");
        Ok(provider)
    }

    /// Deactivates a provider that no policy references
    ///
    /// # Errors
    ///
    /// Returns `InsuranceError::ProviderInUse` while any policy points at the provider
    pub async fn delete_provider(&self, id: ProviderId) -> Result<InsuranceProvider, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut provider = fetch_provider(&mut tx, id, true)
            .await?
            .ok_or_else(|| DatabaseError::not_found("InsuranceProvider", id))?;

        let policies: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM patient_insurances WHERE provider_id = $1")
                .bind(id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
        if policies > 0 {
            return Err(InsuranceError::ProviderInUse(policies).into());
        }

        provider.deactivate();
        save_provider(&mut tx, &provider).await?;

        tx.commit().await?;

        info!(provider_id = %provider.id, "insurance provider deactivated");
        Ok(provider)
    }

    // ------------------------------------------------------------------------
    // Policies
    // ------------------------------------------------------------------------

    /// Enrolls a patient in a policy
    ///
    /// # Arguments
    ///
    /// * `patient_id` - The insured patient
    /// * `provider_id` - An active provider
    /// * `terms` - Cost-sharing terms
    /// * `priority_order` - Billing order; defaults to the patient's next free slot
    /// * `make_primary` - Clear the flag on the patient's other policies and set it here
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Insurance` for invalid terms or an inactive provider
    pub async fn create_policy(
        &self,
        patient_id: PatientId,
        provider_id: ProviderId,
        terms: PolicyTerms,
        priority_order: Option<i32>,
        make_primary: bool,
    ) -> Result<InsurancePolicy, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let provider = fetch_provider(&mut tx, provider_id, false)
            .await?
            .ok_or_else(|| InsuranceError::validation("provider_id", "Insurance provider does not exist"))?;
        if !provider.is_active {
            return Err(InsuranceError::validation("provider_id", "Insurance provider is inactive").into());
        }

        let mut existing = lock_patient_policies(&mut tx, patient_id).await?;
        let order = priority_order.unwrap_or_else(|| next_priority_order(&existing));
        let mut policy = InsurancePolicy::enroll(patient_id, provider_id, terms, order)?;

        if make_primary {
            existing.push(policy.clone());
            let changed = assign_primary(&mut existing, policy.id)?;
            save_primary_flags(&mut tx, &existing, &changed, Some(policy.id)).await?;
            policy.is_primary = true;
        }

        sqlx::query(
            r#"
            INSERT INTO patient_insurances (
                id, patient_id, provider_id, policy_number, group_number, co_pay_amount,
                co_pay_percentage, deductible_amount, deductible_met, annual_max_coverage,
                annual_used_amount, is_primary, priority_order, is_active, coverage_start,
                coverage_end, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(policy.id.as_uuid())
        .bind(policy.patient_id.as_uuid())
        .bind(policy.provider_id.as_uuid())
        .bind(&policy.policy_number)
        .bind(&policy.group_number)
        .bind(policy.co_pay_amount)
        .bind(policy.co_pay_percentage)
        .bind(policy.deductible_amount)
        .bind(policy.deductible_met)
        .bind(policy.annual_max_coverage)
        .bind(policy.annual_used_amount)
        .bind(policy.is_primary)
        .bind(policy.priority_order)
        .bind(policy.is_active)
        .bind(policy.coverage.start)
        .bind(policy.coverage.end)
        .bind(policy.created_at)
        .bind(policy.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            policy_id = %policy.id,
            patient_id = %policy.patient_id,
            is_primary = policy.is_primary,
            "insurance policy created"
        );
        Ok(policy)
    }

    pub async fn get_policy(&self, id: InsurancePolicyId) -> Result<InsurancePolicy, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        fetch_policy(&mut conn, id, false).await
    }

    /// Lists a patient's policies, primary first, then by priority
    pub async fn list_policies(&self, patient_id: PatientId) -> Result<Vec<InsurancePolicy>, DatabaseError> {
        let sql = format!(
            "SELECT {POLICY_COLUMNS} FROM patient_insurances
             WHERE patient_id = $1
             ORDER BY is_primary DESC, priority_order ASC"
        );
        let rows: Vec<PolicyRow> = sqlx::query_as(&sql)
            .bind(patient_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(InsurancePolicy::from).collect())
    }

    /// Replaces a policy's cost-sharing terms
    pub async fn update_policy(
        &self,
        id: InsurancePolicyId,
        terms: PolicyTerms,
        priority_order: Option<i32>,
    ) -> Result<InsurancePolicy, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut policy = fetch_policy(&mut tx, id, true).await?;
        policy.apply_terms(terms)?;
        if let Some(order) = priority_order {
            if order < 1 {
                return Err(InsuranceError::validation("priority_order", "Priority order starts at 1").into());
            }
            policy.priority_order = order;
        }

        sqlx::query(
            r#"
            UPDATE patient_insurances
            SET policy_number = $2, group_number = $3, co_pay_amount = $4, co_pay_percentage = $5,
                deductible_amount = $6, deductible_met = $7, annual_max_coverage = $8,
                priority_order = $9, coverage_start = $10, coverage_end = $11, updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(policy.id.as_uuid())
        .bind(&policy.policy_number)
        .bind(&policy.group_number)
        .bind(policy.co_pay_amount)
        .bind(policy.co_pay_percentage)
        .bind(policy.deductible_amount)
        .bind(policy.deductible_met)
        .bind(policy.annual_max_coverage)
        .bind(policy.priority_order)
        .bind(policy.coverage.start)
        .bind(policy.coverage.end)
        .bind(policy.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(policy_id = %policy.id, "insurance policy updated");
        Ok(policy)
    }

    /// Soft-deletes a policy that no claim references
    ///
    /// # Errors
    ///
    /// Returns `InsuranceError::PolicyInUse` while claims point at the policy
    pub async fn delete_policy(&self, id: InsurancePolicyId) -> Result<InsurancePolicy, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut policy = fetch_policy(&mut tx, id, true).await?;
        let claims: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM insurance_claims WHERE policy_id = $1")
            .bind(id.as_uuid())
            .fetch_one(&mut *tx)
            .await?;
        if claims > 0 {
            return Err(InsuranceError::PolicyInUse(claims).into());
        }

        policy.deactivate();
        sqlx::query(
            "UPDATE patient_insurances SET is_active = FALSE, is_primary = FALSE, updated_at = $2 WHERE id = $1",
        )
        .bind(policy.id.as_uuid())
        .bind(policy.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(policy_id = %policy.id, "insurance policy deactivated");
        Ok(policy)
    }

    /// Makes one policy the patient's only primary policy
    ///
    /// All of the patient's policies are locked so two concurrent calls
    /// cannot both leave a primary behind.
    pub async fn set_primary(&self, id: InsurancePolicyId) -> Result<InsurancePolicy, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let patient_id: Uuid = sqlx::query_scalar("SELECT patient_id FROM patient_insurances WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::not_found("InsurancePolicy", id))?;

        let mut policies = lock_patient_policies(&mut tx, PatientId::from_uuid(patient_id)).await?;
        let changed = assign_primary(&mut policies, id)?;
        save_primary_flags(&mut tx, &policies, &changed, None).await?;

        tx.commit().await?;

        let policy = policies
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| DatabaseError::not_found("InsurancePolicy", id))?;
        info!(policy_id = %policy.id, patient_id = %policy.patient_id, "primary policy set");
        Ok(policy)
    }

    /// Adjusts `deductible_met` by a signed amount, clamped to the deductible
    pub async fn adjust_deductible(
        &self,
        id: InsurancePolicyId,
        delta: Decimal,
    ) -> Result<InsurancePolicy, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut policy = fetch_policy(&mut tx, id, true).await?;
        let met = policy.adjust_deductible(delta);
        save_usage(&mut tx, &policy).await?;

        tx.commit().await?;

        info!(policy_id = %policy.id, %delta, deductible_met = %met, "deductible adjusted");
        Ok(policy)
    }

    /// Adjusts `annual_used_amount` by a signed amount, never below zero
    pub async fn adjust_annual_used(
        &self,
        id: InsurancePolicyId,
        delta: Decimal,
    ) -> Result<InsurancePolicy, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut policy = fetch_policy(&mut tx, id, true).await?;
        let used = policy.adjust_annual_used(delta);
        save_usage(&mut tx, &policy).await?;

        tx.commit().await?;

        info!(policy_id = %policy.id, %delta, annual_used_amount = %used, "annual usage adjusted");
        Ok(policy)
    }

    /// Loads a policy with its provider, `None` if the provider row is gone
    pub async fn policy_with_provider(
        &self,
        id: InsurancePolicyId,
    ) -> Result<(InsurancePolicy, Option<InsuranceProvider>), DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let policy = fetch_policy(&mut conn, id, false).await?;
        let provider = fetch_provider(&mut conn, policy.provider_id, false).await?;
        Ok((policy, provider))
    }
}

// ============================================================================
// Shared transaction helpers
// ============================================================================

pub(crate) async fn fetch_policy(
    conn: &mut PgConnection,
    id: InsurancePolicyId,
    for_update: bool,
) -> Result<InsurancePolicy, DatabaseError> {
    let sql = format!(
        "SELECT {POLICY_COLUMNS} FROM patient_insurances WHERE id = $1{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row: PolicyRow = sqlx::query_as(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("InsurancePolicy", id))?;
    Ok(row.into())
}

/// Writes the deductible and annual-usage counters
pub(crate) async fn save_usage(conn: &mut PgConnection, policy: &InsurancePolicy) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        UPDATE patient_insurances
        SET deductible_met = $2, annual_used_amount = $3, updated_at = $4
        WHERE id = $1
        "#,
    )
    .bind(policy.id.as_uuid())
    .bind(policy.deductible_met)
    .bind(policy.annual_used_amount)
    .bind(policy.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn fetch_provider(
    conn: &mut PgConnection,
    id: ProviderId,
    for_update: bool,
) -> Result<Option<InsuranceProvider>, DatabaseError> {
    let sql = format!(
        "SELECT {PROVIDER_COLUMNS} FROM insurance_providers WHERE id = $1{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row: Option<ProviderRow> = sqlx::query_as(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(InsuranceProvider::from))
}

async fn save_provider(conn: &mut PgConnection, provider: &InsuranceProvider) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        UPDATE insurance_providers
        SET name = $2, contact_email = $3, contact_phone = $4, is_active = $5, updated_at = $6
        WHERE id = $1
        "#,
    )
    .bind(provider.id.as_uuid())
    .bind(&provider.name)
    .bind(&provider.contact_email)
    .bind(&provider.contact_phone)
    .bind(provider.is_active)
    .bind(provider.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Locks every policy of a patient in id order
async fn lock_patient_policies(
    conn: &mut PgConnection,
    patient_id: PatientId,
) -> Result<Vec<InsurancePolicy>, DatabaseError> {
    let sql = format!(
        "SELECT {POLICY_COLUMNS} FROM patient_insurances WHERE patient_id = $1 ORDER BY id FOR UPDATE"
    );
    let rows: Vec<PolicyRow> = sqlx::query_as(&sql)
        .bind(patient_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(InsurancePolicy::from).collect())
}

/// Persists changed primary flags, clearing before setting
///
/// The partial unique index on `(patient_id) WHERE is_primary` is checked
/// row by row, so the old primary has to be cleared first. Rows that are not
/// yet inserted are skipped.
async fn save_primary_flags(
    conn: &mut PgConnection,
    policies: &[InsurancePolicy],
    changed: &[InsurancePolicyId],
    pending_insert: Option<InsurancePolicyId>,
) -> Result<(), DatabaseError> {
    let mut ordered: Vec<&InsurancePolicy> = policies
        .iter()
        .filter(|p| changed.contains(&p.id))
        .collect();
    ordered.sort_by_key(|p| p.is_primary);

    for policy in ordered {
        if Some(policy.id) == pending_insert {
            continue;
        }
        sqlx::query("UPDATE patient_insurances SET is_primary = $2, updated_at = $3 WHERE id = $1")
            .bind(policy.id.as_uuid())
            .bind(policy.is_primary)
            .bind(policy.updated_at)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

// ============================================================================
// Row mapping
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProviderRow {
    id: Uuid,
    name: String,
    code: String,
    contact_email: Option<String>,
    contact_phone: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProviderRow> for InsuranceProvider {
    fn from(row: ProviderRow) -> Self {
        InsuranceProvider {
            id: ProviderId::from_uuid(row.id),
            name: row.name,
            code: row.code,
            contact_email: row.contact_email,
            contact_phone: row.contact_phone,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PolicyRow {
    id: Uuid,
    patient_id: Uuid,
    provider_id: Uuid,
    policy_number: String,
    group_number: Option<String>,
    co_pay_amount: Decimal,
    co_pay_percentage: Decimal,
    deductible_amount: Decimal,
    deductible_met: Decimal,
    annual_max_coverage: Option<Decimal>,
    annual_used_amount: Decimal,
    is_primary: bool,
    priority_order: i32,
    is_active: bool,
    coverage_start: NaiveDate,
    coverage_end: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PolicyRow> for InsurancePolicy {
    fn from(row: PolicyRow) -> Self {
        InsurancePolicy {
            id: InsurancePolicyId::from_uuid(row.id),
            patient_id: PatientId::from_uuid(row.patient_id),
            provider_id: ProviderId::from_uuid(row.provider_id),
            policy_number: row.policy_number,
            group_number: row.group_number,
            co_pay_amount: row.co_pay_amount,
            co_pay_percentage: row.co_pay_percentage,
            deductible_amount: row.deductible_amount,
            deductible_met: row.deductible_met,
            annual_max_coverage: row.annual_max_coverage,
            annual_used_amount: row.annual_used_amount,
            is_primary: row.is_primary,
            priority_order: row.priority_order,
            is_active: row.is_active,
            coverage: CoveragePeriod { start: row.coverage_start, end: row.coverage_end },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
