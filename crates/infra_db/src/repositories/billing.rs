//! Billing repository implementation
//!
//! This module persists bills, their line items, payments and refunds.
//! Every balance change locks the bill row first, so payments, voids,
//! refunds and claim credits against one bill are applied one at a time.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use core_kernel::{BillId, BillItemId, Caller, DoctorId, PatientId, PaymentId, RefundId, UserId};
use domain_billing::{
    bill_number, ledger, Bill, BillCharges, BillChargesPatch, BillItem, BillRefund, BillingSummary,
    NewPayment, Payment, PaymentReceipt, PaymentStatistics,
};

use crate::error::DatabaseError;
use super::counters::{next_sequence, BILL_COUNTER};

const BILL_COLUMNS: &str = r#"
    id, bill_number, patient_id, doctor_id, bill_date, sub_total, discount, tax,
    total_amount, amount_paid, amount_due, payment_status, notes, created_by,
    voided_at, voided_by, void_reason, created_at, updated_at
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, bill_id, amount, method, status, amount_tendered, change_due,
    transaction_reference, notes, received_by, payment_date, voided_at,
    voided_by, void_reason, created_at
"#;

/// A ledger entry together with the bill balances it produced
#[derive(Debug, Clone)]
pub struct LedgerResult<T> {
    pub entry: T,
    pub bill: Bill,
}

/// Repository for bills and the payment ledger
///
/// The BillingRepository handles all database operations for bills,
/// keeping `amount_paid` equal to completed payments minus refunds.
#[derive(Debug, Clone)]
pub struct BillingRepository {
    pool: PgPool,
}

impl BillingRepository {
    /// Creates a new BillingRepository with the given connection pool
    ///
    /// # Arguments
    ///
    /// * `pool` - The PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a bill with a freshly reserved bill number
    ///
    /// # Arguments
    ///
    /// * `patient_id` - Billed patient
    /// * `doctor_id` - Attending doctor, if any
    /// * `charges` - Sub-total or line items, discount and tax
    /// * `notes` - Free text
    /// * `caller` - Stamped as `created_by`
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Billing` if the charges are invalid
    pub async fn create_bill(
        &self,
        patient_id: PatientId,
        doctor_id: Option<DoctorId>,
        charges: BillCharges,
        notes: Option<String>,
        caller: &Caller,
    ) -> Result<Bill, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let sequence = next_sequence(&mut tx, BILL_COUNTER, now.year()).await?;
        let bill = Bill::create_at(
            now,
            bill_number(now.year(), sequence),
            patient_id,
            doctor_id,
            charges,
            notes,
            caller,
        )?;

        sqlx::query(
            r#"
            INSERT INTO bills (
                id, bill_number, patient_id, doctor_id, bill_date, sub_total, discount, tax,
                total_amount, amount_paid, amount_due, payment_status, notes, created_by,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(bill.id.as_uuid())
        .bind(&bill.bill_number)
        .bind(bill.patient_id.as_uuid())
        .bind(bill.doctor_id.map(|d| *d.as_uuid()))
        .bind(bill.bill_date)
        .bind(bill.sub_total)
        .bind(bill.discount)
        .bind(bill.tax)
        .bind(bill.total_amount)
        .bind(bill.amount_paid)
        .bind(bill.amount_due)
        .bind(bill.payment_status.as_str())
        .bind(&bill.notes)
        .bind(bill.created_by.as_uuid())
        .bind(bill.created_at)
        .bind(bill.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_items(&mut tx, bill.id, &bill.items).await?;

        tx.commit().await?;

        info!(bill_id = %bill.id, bill_number = %bill.bill_number, total = %bill.total_amount, "bill created");
        Ok(bill)
    }

    /// Retrieves a bill with its line items
    pub async fn get_bill(&self, id: BillId) -> Result<Bill, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        fetch_bill(&mut conn, id, false).await
    }

    /// Lists bills, newest first, optionally for one patient
    ///
    /// # Arguments
    ///
    /// * `patient_id` - Restrict to one patient's bills
    /// * `limit` - Maximum number of bills to return
    /// * `offset` - Number of bills to skip
    pub async fn list_bills(
        &self,
        patient_id: Option<PatientId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Bill>, DatabaseError> {
        let sql = format!(
            "SELECT {BILL_COLUMNS} FROM bills
             WHERE ($1::uuid IS NULL OR patient_id = $1)
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        );
        let rows: Vec<BillRow> = sqlx::query_as(&sql)
            .bind(patient_id.map(|p| *p.as_uuid()))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items: Vec<BillItemRow> = sqlx::query_as(
            r#"
            SELECT bill_id, id, description, quantity, unit_price, line_total
            FROM bill_items
            WHERE bill_id = ANY($1)
            ORDER BY bill_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let bill_items = items
                    .iter()
                    .filter(|i| i.bill_id == row.id)
                    .cloned()
                    .map(BillItem::from)
                    .collect();
                row.into_bill(bill_items)
            })
            .collect()
    }

    /// Applies a partial edit to the charges and notes of an open bill
    ///
    /// The patch is merged over the row as read under its lock, so
    /// concurrent edits of different fields both survive. Derived amounts
    /// are recomputed against the stored `amount_paid`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Billing` if the bill is voided or the charges are invalid
    pub async fn update_bill(
        &self,
        id: BillId,
        patch: BillChargesPatch,
        doctor_id: Option<DoctorId>,
        notes: Option<String>,
    ) -> Result<Bill, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut bill = fetch_bill(&mut tx, id, true).await?;
        bill.patch_charges(patch)?;
        if doctor_id.is_some() {
            bill.doctor_id = doctor_id;
        }
        if notes.is_some() {
            bill.notes = notes;
        }

        sqlx::query(
            r#"
            UPDATE bills
            SET doctor_id = $2, sub_total = $3, discount = $4, tax = $5, total_amount = $6,
                amount_due = $7, payment_status = $8, notes = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(bill.id.as_uuid())
        .bind(bill.doctor_id.map(|d| *d.as_uuid()))
        .bind(bill.sub_total)
        .bind(bill.discount)
        .bind(bill.tax)
        .bind(bill.total_amount)
        .bind(bill.amount_due)
        .bind(bill.payment_status.as_str())
        .bind(&bill.notes)
        .bind(bill.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM bill_items WHERE bill_id = $1")
            .bind(bill.id.as_uuid())
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, bill.id, &bill.items).await?;

        tx.commit().await?;

        info!(bill_id = %bill.id, total = %bill.total_amount, due = %bill.amount_due, "bill updated");
        Ok(bill)
    }

    /// Voids an unpaid bill
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Billing` if the bill is already voided or has payments
    pub async fn void_bill(
        &self,
        id: BillId,
        reason: Option<String>,
        caller: &Caller,
    ) -> Result<Bill, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut bill = fetch_bill(&mut tx, id, true).await?;
        bill.void(reason, caller)?;

        sqlx::query(
            "UPDATE bills SET voided_at = $2, voided_by = $3, void_reason = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(bill.id.as_uuid())
        .bind(bill.voided_at)
        .bind(bill.voided_by.map(|u| *u.as_uuid()))
        .bind(&bill.void_reason)
        .bind(bill.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(bill_id = %bill.id, voided_by = %caller.user_id, "bill voided");
        Ok(bill)
    }

    /// Aggregates totals and status counts over non-voided bills
    pub async fn summary(&self) -> Result<BillingSummary, DatabaseError> {
        let row: SummaryRow = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS bill_count,
                COALESCE(SUM(total_amount), 0) AS total_billed,
                COALESCE(SUM(amount_paid), 0) AS total_collected,
                COALESCE(SUM(GREATEST(amount_due, 0)), 0) AS total_outstanding,
                COUNT(*) FILTER (WHERE payment_status = 'pending') AS pending_count,
                COUNT(*) FILTER (WHERE payment_status = 'partial') AS partial_count,
                COUNT(*) FILTER (WHERE payment_status = 'paid') AS paid_count
            FROM bills
            WHERE voided_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(BillingSummary {
            bill_count: row.bill_count,
            total_billed: row.total_billed,
            total_collected: row.total_collected,
            total_outstanding: row.total_outstanding,
            pending_count: row.pending_count,
            partial_count: row.partial_count,
            paid_count: row.paid_count,
        })
    }

    /// Records a payment against a bill
    ///
    /// # Arguments
    ///
    /// * `bill_id` - Bill being paid
    /// * `input` - Amount, method and tender details
    /// * `caller` - Stamped as `received_by`
    ///
    /// # Returns
    ///
    /// The receipt (payment and change due) with the updated bill
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Billing` if the bill is voided or the amount
    /// exceeds the amount due
    pub async fn record_payment(
        &self,
        bill_id: BillId,
        input: NewPayment,
        caller: &Caller,
    ) -> Result<LedgerResult<PaymentReceipt>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut bill = fetch_bill(&mut tx, bill_id, true).await?;
        let receipt = ledger::record_payment(&mut bill, input, caller)?;

        insert_payment(&mut tx, &receipt.payment).await?;
        save_balance(&mut tx, &bill).await?;

        tx.commit().await?;

        info!(
            bill_id = %bill.id,
            payment_id = %receipt.payment.id,
            amount = %receipt.payment.amount,
            due = %bill.amount_due,
            "payment recorded"
        );
        Ok(LedgerResult { entry: receipt, bill })
    }

    /// Voids a completed payment, reversing it on its bill
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Billing` if the payment is already voided,
    /// has refunds, or the reason is too short
    pub async fn void_payment(
        &self,
        payment_id: PaymentId,
        reason: &str,
        caller: &Caller,
    ) -> Result<LedgerResult<Payment>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let bill_id = payment_bill_id(&mut tx, payment_id).await?;
        let mut bill = fetch_bill(&mut tx, bill_id, true).await?;
        let mut payment = fetch_payment(&mut tx, payment_id, true).await?;
        let refunded = refunded_total(&mut tx, payment_id).await?;

        ledger::void_payment(&mut bill, &mut payment, refunded, reason, caller)?;

        sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, voided_at = $3, voided_by = $4, void_reason = $5
            WHERE id = $1
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.status.as_str())
        .bind(payment.voided_at)
        .bind(payment.voided_by.map(|u| *u.as_uuid()))
        .bind(&payment.void_reason)
        .execute(&mut *tx)
        .await?;
        save_balance(&mut tx, &bill).await?;

        tx.commit().await?;

        info!(payment_id = %payment.id, bill_id = %bill.id, due = %bill.amount_due, "payment voided");
        Ok(LedgerResult { entry: payment, bill })
    }

    /// Refunds part or all of a completed payment
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Billing` if the payment is not completed or the
    /// amount exceeds what is still refundable
    pub async fn refund_payment(
        &self,
        payment_id: PaymentId,
        amount: Decimal,
        reason: &str,
        caller: &Caller,
    ) -> Result<LedgerResult<BillRefund>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let bill_id = payment_bill_id(&mut tx, payment_id).await?;
        let mut bill = fetch_bill(&mut tx, bill_id, true).await?;
        let payment = fetch_payment(&mut tx, payment_id, true).await?;
        let refunded = refunded_total(&mut tx, payment_id).await?;

        let refund = ledger::refund_payment(&mut bill, &payment, refunded, amount, reason, caller)?;

        sqlx::query(
            r#"
            INSERT INTO bill_refunds (
                id, payment_id, bill_id, refund_amount, reason,
                requested_by, approved_by, processed_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(refund.id.as_uuid())
        .bind(refund.payment_id.as_uuid())
        .bind(refund.bill_id.as_uuid())
        .bind(refund.refund_amount)
        .bind(&refund.reason)
        .bind(refund.requested_by.as_uuid())
        .bind(refund.approved_by.as_uuid())
        .bind(refund.processed_by.as_uuid())
        .bind(refund.created_at)
        .execute(&mut *tx)
        .await?;
        save_balance(&mut tx, &bill).await?;

        tx.commit().await?;

        info!(
            refund_id = %refund.id,
            payment_id = %payment.id,
            amount = %refund.refund_amount,
            "payment refunded"
        );
        Ok(LedgerResult { entry: refund, bill })
    }

    /// Retrieves a payment by id
    pub async fn get_payment(&self, id: PaymentId) -> Result<Payment, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        fetch_payment(&mut conn, id, false).await
    }

    /// Lists a bill's payments in the order they were taken
    pub async fn list_payments(&self, bill_id: BillId) -> Result<Vec<Payment>, DatabaseError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE bill_id = $1 ORDER BY payment_date");
        let rows: Vec<PaymentRow> = sqlx::query_as(&sql)
            .bind(bill_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    /// Computes refund statistics for a payment
    pub async fn payment_statistics(&self, id: PaymentId) -> Result<PaymentStatistics, DatabaseError> {
        let payment = self.get_payment(id).await?;
        let rows: Vec<RefundRow> = sqlx::query_as(
            r#"
            SELECT id, payment_id, bill_id, refund_amount, reason,
                   requested_by, approved_by, processed_by, created_at
            FROM bill_refunds
            WHERE payment_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let refunds: Vec<BillRefund> = rows.into_iter().map(BillRefund::from).collect();
        Ok(PaymentStatistics::compute(&payment, &refunds))
    }
}

// ============================================================================
// Shared transaction helpers
// ============================================================================

/// Loads a bill and its items, optionally locking the bill row
pub(crate) async fn fetch_bill(
    conn: &mut PgConnection,
    id: BillId,
    for_update: bool,
) -> Result<Bill, DatabaseError> {
    let sql = format!(
        "SELECT {BILL_COLUMNS} FROM bills WHERE id = $1{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row: BillRow = sqlx::query_as(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Bill", id))?;

    let items: Vec<BillItemRow> = sqlx::query_as(
        r#"
        SELECT bill_id, id, description, quantity, unit_price, line_total
        FROM bill_items
        WHERE bill_id = $1
        ORDER BY position
        "#,
    )
    .bind(id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;

    row.into_bill(items.into_iter().map(BillItem::from).collect())
}

/// Writes the ledger-driven columns of a bill
pub(crate) async fn save_balance(conn: &mut PgConnection, bill: &Bill) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        UPDATE bills
        SET amount_paid = $2, amount_due = $3, payment_status = $4, updated_at = $5
        WHERE id = $1
        "#,
    )
    .bind(bill.id.as_uuid())
    .bind(bill.amount_paid)
    .bind(bill.amount_due)
    .bind(bill.payment_status.as_str())
    .bind(bill.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn insert_payment(conn: &mut PgConnection, payment: &Payment) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, bill_id, amount, method, status, amount_tendered, change_due,
            transaction_reference, notes, received_by, payment_date, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(payment.id.as_uuid())
    .bind(payment.bill_id.as_uuid())
    .bind(payment.amount)
    .bind(payment.method.as_str())
    .bind(payment.status.as_str())
    .bind(payment.amount_tendered)
    .bind(payment.change_due)
    .bind(&payment.transaction_reference)
    .bind(&payment.notes)
    .bind(payment.received_by.as_uuid())
    .bind(payment.payment_date)
    .bind(payment.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_items(conn: &mut PgConnection, bill_id: BillId, items: &[BillItem]) -> Result<(), DatabaseError> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO bill_items (id, bill_id, position, description, quantity, unit_price, line_total)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(bill_id.as_uuid())
        .bind(position as i32)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.line_total)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn payment_bill_id(conn: &mut PgConnection, id: PaymentId) -> Result<BillId, DatabaseError> {
    let bill_id: Uuid = sqlx::query_scalar("SELECT bill_id FROM payments WHERE id = $1")
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Payment", id))?;
    Ok(BillId::from_uuid(bill_id))
}

async fn fetch_payment(
    conn: &mut PgConnection,
    id: PaymentId,
    for_update: bool,
) -> Result<Payment, DatabaseError> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row: PaymentRow = sqlx::query_as(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Payment", id))?;
    Payment::try_from(row)
}

async fn refunded_total(conn: &mut PgConnection, id: PaymentId) -> Result<Decimal, DatabaseError> {
    let total: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(refund_amount), 0) FROM bill_refunds WHERE payment_id = $1",
    )
    .bind(id.as_uuid())
    .fetch_one(&mut *conn)
    .await?;
    Ok(total)
}

// ============================================================================
// Row mapping
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct BillRow {
    id: Uuid,
    bill_number: String,
    patient_id: Uuid,
    doctor_id: Option<Uuid>,
    bill_date: NaiveDate,
    sub_total: Decimal,
    discount: Decimal,
    tax: Decimal,
    total_amount: Decimal,
    amount_paid: Decimal,
    amount_due: Decimal,
    payment_status: String,
    notes: Option<String>,
    created_by: Uuid,
    voided_at: Option<DateTime<Utc>>,
    voided_by: Option<Uuid>,
    void_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BillRow {
    fn into_bill(self, items: Vec<BillItem>) -> Result<Bill, DatabaseError> {
        Ok(Bill {
            id: BillId::from_uuid(self.id),
            bill_number: self.bill_number,
            patient_id: PatientId::from_uuid(self.patient_id),
            doctor_id: self.doctor_id.map(DoctorId::from_uuid),
            bill_date: self.bill_date,
            items,
            sub_total: self.sub_total,
            discount: self.discount,
            tax: self.tax,
            total_amount: self.total_amount,
            amount_paid: self.amount_paid,
            amount_due: self.amount_due,
            payment_status: self
                .payment_status
                .parse()
                .map_err(|e| DatabaseError::corrupt("bills.payment_status", e))?,
            notes: self.notes,
            created_by: UserId::from_uuid(self.created_by),
            voided_at: self.voided_at,
            voided_by: self.voided_by.map(UserId::from_uuid),
            void_reason: self.void_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct BillItemRow {
    bill_id: Uuid,
    id: Uuid,
    description: String,
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
}

impl From<BillItemRow> for BillItem {
    fn from(row: BillItemRow) -> Self {
        BillItem {
            id: BillItemId::from_uuid(row.id),
            description: row.description,
            quantity: row.quantity,
            unit_price: row.unit_price,
            line_total: row.line_total,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    bill_id: Uuid,
    amount: Decimal,
    method: String,
    status: String,
    amount_tendered: Option<Decimal>,
    change_due: Decimal,
    transaction_reference: Option<String>,
    notes: Option<String>,
    received_by: Uuid,
    payment_date: DateTime<Utc>,
    voided_at: Option<DateTime<Utc>>,
    voided_by: Option<Uuid>,
    void_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            bill_id: BillId::from_uuid(row.bill_id),
            amount: row.amount,
            method: row.method.parse().map_err(|e| DatabaseError::corrupt("payments.method", e))?,
            status: row.status.parse().map_err(|e| DatabaseError::corrupt("payments.status", e))?,
            amount_tendered: row.amount_tendered,
            change_due: row.change_due,
            transaction_reference: row.transaction_reference,
            notes: row.notes,
            received_by: UserId::from_uuid(row.received_by),
            payment_date: row.payment_date,
            voided_at: row.voided_at,
            voided_by: row.voided_by.map(UserId::from_uuid),
            void_reason: row.void_reason,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    payment_id: Uuid,
    bill_id: Uuid,
    refund_amount: Decimal,
    reason: String,
    requested_by: Uuid,
    approved_by: Uuid,
    processed_by: Uuid,
    created_at: DateTime<Utc>,
}

impl From<RefundRow> for BillRefund {
    fn from(row: RefundRow) -> Self {
        BillRefund {
            id: RefundId::from_uuid(row.id),
            payment_id: PaymentId::from_uuid(row.payment_id),
            bill_id: BillId::from_uuid(row.bill_id),
            refund_amount: row.refund_amount,
            reason: row.reason,
            requested_by: UserId::from_uuid(row.requested_by),
            approved_by: UserId::from_uuid(row.approved_by),
            processed_by: UserId::from_uuid(row.processed_by),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    bill_count: i64,
    total_billed: Decimal,
    total_collected: Decimal,
    total_outstanding: Decimal,
    pending_count: i64,
    partial_count: i64,
    paid_count: i64,
}
