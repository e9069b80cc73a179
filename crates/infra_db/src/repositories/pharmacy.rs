//! Pharmacy repository implementation
//!
//! Medicines, sales, purchases and the stock movement audit trail. Stock
//! changes lock the affected medicine rows in id order and are written with
//! a guarded update that refuses to take stock below zero.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use core_kernel::{Caller, MedicineId, PatientId, PurchaseId, StockMovementId, UserId};
use domain_pharmacy::{
    Medicine, NewMedicine, PharmacyError, Purchase, PurchaseItem, PurchaseLine, Sale, SaleLine,
    StockMovement,
};

use crate::error::DatabaseError;

const MEDICINE_COLUMNS: &str = r#"
    id, name, generic_name, sku, unit, stock_quantity, reorder_level, cost_price,
    selling_price, expiry_date, is_active, created_at, updated_at
"#;

const PURCHASE_COLUMNS: &str = r#"
    id, supplier_name, total_cost, status, created_by, ordered_at, received_at,
    cancelled_at, created_at, updated_at
"#;

/// Repository for pharmacy stock
#[derive(Debug, Clone)]
pub struct PharmacyRepository {
    pool: PgPool,
}

impl PharmacyRepository {
    /// Creates a new PharmacyRepository with the given connection pool
    ///
    /// # Arguments
    ///
    /// * `pool` - The PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------------
    // Medicines
    // ------------------------------------------------------------------------

    /// Registers a medicine with its opening stock
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::DuplicateEntry` if the SKU is already registered
    pub async fn create_medicine(&self, input: NewMedicine) -> Result<Medicine, DatabaseError> {
        let medicine = Medicine::register(input)?;

        sqlx::query(
            r#"
            INSERT INTO medicines (
                id, name, generic_name, sku, unit, stock_quantity, reorder_level, cost_price,
                selling_price, expiry_date, is_active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(medicine.id.as_uuid())
        .bind(&medicine.name)
        .bind(&medicine.generic_name)
        .bind(&medicine.sku)
        .bind(&medicine.unit)
        .bind(medicine.stock_quantity)
        .bind(medicine.reorder_level)
        .bind(medicine.cost_price)
        .bind(medicine.selling_price)
        .bind(medicine.expiry_date)
        .bind(medicine.is_active)
        .bind(medicine.created_at)
        .bind(medicine.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("Medicine", "sku", &medicine.sku),
            other => other,
        })?;

        info!(medicine_id = %medicine.id, sku = %medicine.sku, stock = medicine.stock_quantity, "medicine registered");
        Ok(medicine)
    }

    pub async fn get_medicine(&self, id: MedicineId) -> Result<Medicine, DatabaseError> {
        let sql = format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = $1");
        let row: MedicineRow = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Medicine", id))?;
        Ok(row.into())
    }

    /// Lists active medicines by name
    pub async fn list_medicines(&self) -> Result<Vec<Medicine>, DatabaseError> {
        let sql = format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE is_active ORDER BY name");
        let rows: Vec<MedicineRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Medicine::from).collect())
    }

    /// Lists active medicines at or below their reorder level
    pub async fn low_stock(&self) -> Result<Vec<Medicine>, DatabaseError> {
        let sql = format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines
             WHERE is_active AND stock_quantity <= reorder_level
             ORDER BY stock_quantity, name"
        );
        let rows: Vec<MedicineRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Medicine::from).collect())
    }

    /// Stock movement history for one medicine, oldest first
    pub async fn stock_movements(&self, medicine_id: MedicineId) -> Result<Vec<StockMovement>, DatabaseError> {
        let rows: Vec<MovementRow> = sqlx::query_as(
            r#"
            SELECT id, medicine_id, movement_type, quantity_change, quantity_before,
                   quantity_after, reference_id, performed_by, created_at
            FROM stock_movements
            WHERE medicine_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(medicine_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(StockMovement::try_from).collect()
    }

    // ------------------------------------------------------------------------
    // Sales
    // ------------------------------------------------------------------------

    /// Sells medicines, decrementing stock for every line
    ///
    /// # Arguments
    ///
    /// * `lines` - Requested medicines and quantities
    /// * `patient_id` - Patient the sale is for, if any
    /// * `payment_method` - How the sale was paid
    /// * `caller` - Stamped as `sold_by` and on every movement
    ///
    /// # Errors
    ///
    /// Returns `PharmacyError::InsufficientStock` if any medicine is short;
    /// nothing is sold in that case
    pub async fn create_sale(
        &self,
        lines: Vec<SaleLine>,
        patient_id: Option<PatientId>,
        payment_method: &str,
        caller: &Caller,
    ) -> Result<(Sale, Vec<StockMovement>), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<MedicineId> = lines.iter().map(|l| l.medicine_id).collect();
        let mut stock = lock_medicines(&mut tx, &ids).await?;
        let (sale, movements) = match Sale::checkout(lines, &mut stock, patient_id, payment_method, caller) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "sale rejected");
                return Err(e.into());
            }
        };

        sqlx::query(
            r#"
            INSERT INTO sales (id, patient_id, total_amount, payment_method, sold_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(sale.id.as_uuid())
        .bind(sale.patient_id.map(|p| *p.as_uuid()))
        .bind(sale.total_amount)
        .bind(&sale.payment_method)
        .bind(sale.sold_by.as_uuid())
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in sale.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_items (sale_id, position, medicine_id, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(sale.id.as_uuid())
            .bind(position as i32)
            .bind(item.medicine_id.as_uuid())
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.line_total)
            .execute(&mut *tx)
            .await?;
        }

        apply_movements(&mut tx, &stock, &movements).await?;

        tx.commit().await?;

        info!(sale_id = %sale.id, total = %sale.total_amount, lines = sale.items.len(), "sale completed");
        Ok((sale, movements))
    }

    // ------------------------------------------------------------------------
    // Purchases
    // ------------------------------------------------------------------------

    /// Records a pending purchase order
    pub async fn create_purchase(
        &self,
        supplier_name: &str,
        lines: Vec<PurchaseLine>,
        caller: &Caller,
    ) -> Result<Purchase, DatabaseError> {
        let purchase = Purchase::create(supplier_name, lines, caller)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO purchases (id, supplier_name, total_cost, status, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(purchase.id.as_uuid())
        .bind(&purchase.supplier_name)
        .bind(purchase.total_cost)
        .bind(purchase.status.as_str())
        .bind(purchase.created_by.as_uuid())
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in purchase.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO purchase_items (purchase_id, position, medicine_id, quantity, unit_cost, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(purchase.id.as_uuid())
            .bind(position as i32)
            .bind(item.medicine_id.as_uuid())
            .bind(item.quantity)
            .bind(item.unit_cost)
            .bind(item.line_total)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(purchase_id = %purchase.id, supplier = %purchase.supplier_name, total = %purchase.total_cost, "purchase created");
        Ok(purchase)
    }

    pub async fn get_purchase(&self, id: PurchaseId) -> Result<Purchase, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        fetch_purchase(&mut conn, id, false).await
    }

    /// Marks a pending purchase as ordered from the supplier
    pub async fn mark_ordered(&self, id: PurchaseId) -> Result<Purchase, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut purchase = fetch_purchase(&mut tx, id, true).await?;
        purchase.mark_ordered()?;
        save_purchase_status(&mut tx, &purchase).await?;

        tx.commit().await?;

        info!(purchase_id = %purchase.id, "purchase ordered");
        Ok(purchase)
    }

    /// Receives an ordered purchase into stock
    pub async fn receive_purchase(
        &self,
        id: PurchaseId,
        caller: &Caller,
    ) -> Result<(Purchase, Vec<StockMovement>), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut purchase = fetch_purchase(&mut tx, id, true).await?;
        let mut stock = lock_medicines(&mut tx, &purchase.medicine_ids()).await?;
        let movements = purchase.receive(&mut stock, caller)?;

        apply_movements(&mut tx, &stock, &movements).await?;
        save_purchase_status(&mut tx, &purchase).await?;

        tx.commit().await?;

        info!(purchase_id = %purchase.id, lines = movements.len(), "purchase received");
        Ok((purchase, movements))
    }

    /// Cancels a purchase, reversing its stock if it was already received
    pub async fn cancel_purchase(
        &self,
        id: PurchaseId,
        caller: &Caller,
    ) -> Result<(Purchase, Vec<StockMovement>), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut purchase = fetch_purchase(&mut tx, id, true).await?;
        let mut stock = lock_medicines(&mut tx, &purchase.medicine_ids()).await?;
        let movements = purchase.cancel(&mut stock, caller)?;

        apply_movements(&mut tx, &stock, &movements).await?;
        save_purchase_status(&mut tx, &purchase).await?;

        tx.commit().await?;

        info!(purchase_id = %purchase.id, reversed = movements.len(), "purchase cancelled");
        Ok((purchase, movements))
    }
}

// ============================================================================
// Stock helpers
// ============================================================================

/// Locks the named medicines in id order
async fn lock_medicines(
    conn: &mut PgConnection,
    ids: &[MedicineId],
) -> Result<HashMap<MedicineId, Medicine>, DatabaseError> {
    let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
    let sql = format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = ANY($1) ORDER BY id FOR UPDATE");
    let rows: Vec<MedicineRow> = sqlx::query_as(&sql)
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let medicine = Medicine::from(row);
            (medicine.id, medicine)
        })
        .collect())
}

/// Writes stock changes and their audit rows
///
/// The update only applies while the result stays non-negative; a miss means
/// another writer got to the row first and the whole operation fails.
async fn apply_movements(
    conn: &mut PgConnection,
    stock: &HashMap<MedicineId, Medicine>,
    movements: &[StockMovement],
) -> Result<(), DatabaseError> {
    for movement in movements {
        let result = sqlx::query(
            r#"
            UPDATE medicines
            SET stock_quantity = stock_quantity + $2, updated_at = $3
            WHERE id = $1 AND stock_quantity + $2 >= 0
            "#,
        )
        .bind(movement.medicine_id.as_uuid())
        .bind(movement.quantity_change)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let medicine = stock
                .get(&movement.medicine_id)
                .map(|m| m.name.clone())
                .unwrap_or_else(|| movement.medicine_id.to_string());
            warn!(medicine_id = %movement.medicine_id, "guarded stock update missed");
            return Err(PharmacyError::InsufficientStock {
                medicine,
                requested: -movement.quantity_change,
                available: movement.quantity_before,
            }
            .into());
        }

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, medicine_id, movement_type, quantity_change, quantity_before,
                quantity_after, reference_id, performed_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.medicine_id.as_uuid())
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity_change)
        .bind(movement.quantity_before)
        .bind(movement.quantity_after)
        .bind(movement.reference_id)
        .bind(movement.performed_by.as_uuid())
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn fetch_purchase(
    conn: &mut PgConnection,
    id: PurchaseId,
    for_update: bool,
) -> Result<Purchase, DatabaseError> {
    let sql = format!(
        "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row: PurchaseRow = sqlx::query_as(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Purchase", id))?;

    let items: Vec<PurchaseItemRow> = sqlx::query_as(
        r#"
        SELECT medicine_id, quantity, unit_cost, line_total
        FROM purchase_items
        WHERE purchase_id = $1
        ORDER BY position
        "#,
    )
    .bind(id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;

    row.into_purchase(items)
}

async fn save_purchase_status(conn: &mut PgConnection, purchase: &Purchase) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        UPDATE purchases
        SET status = $2, ordered_at = $3, received_at = $4, cancelled_at = $5, updated_at = $6
        WHERE id = $1
        "#,
    )
    .bind(purchase.id.as_uuid())
    .bind(purchase.status.as_str())
    .bind(purchase.ordered_at)
    .bind(purchase.received_at)
    .bind(purchase.cancelled_at)
    .bind(purchase.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// ============================================================================
// Row mapping
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct MedicineRow {
    id: Uuid,
    name: String,
    generic_name: Option<String>,
    sku: String,
    unit: String,
    stock_quantity: i32,
    reorder_level: i32,
    cost_price: Decimal,
    selling_price: Decimal,
    expiry_date: Option<NaiveDate>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MedicineRow> for Medicine {
    fn from(row: MedicineRow) -> Self {
        Medicine {
            id: MedicineId::from_uuid(row.id),
            name: row.name,
            generic_name: row.generic_name,
            sku: row.sku,
            unit: row.unit,
            stock_quantity: row.stock_quantity,
            reorder_level: row.reorder_level,
            cost_price: row.cost_price,
            selling_price: row.selling_price,
            expiry_date: row.expiry_date,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: Uuid,
    medicine_id: Uuid,
    movement_type: String,
    quantity_change: i32,
    quantity_before: i32,
    quantity_after: i32,
    reference_id: Uuid,
    performed_by: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = DatabaseError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(StockMovement {
            id: StockMovementId::from_uuid(row.id),
            medicine_id: MedicineId::from_uuid(row.medicine_id),
            movement_type: row
                .movement_type
                .parse()
                .map_err(|e| DatabaseError::corrupt("stock_movements.movement_type", e))?,
            quantity_change: row.quantity_change,
            quantity_before: row.quantity_before,
            quantity_after: row.quantity_after,
            reference_id: row.reference_id,
            performed_by: UserId::from_uuid(row.performed_by),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: Uuid,
    supplier_name: String,
    total_cost: Decimal,
    status: String,
    created_by: Uuid,
    ordered_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PurchaseRow {
    fn into_purchase(self, items: Vec<PurchaseItemRow>) -> Result<Purchase, DatabaseError> {
        Ok(Purchase {
            id: PurchaseId::from_uuid(self.id),
            supplier_name: self.supplier_name,
            items: items
                .into_iter()
                .map(|i| PurchaseItem {
                    medicine_id: MedicineId::from_uuid(i.medicine_id),
                    quantity: i.quantity,
                    unit_cost: i.unit_cost,
                    line_total: i.line_total,
                })
                .collect(),
            total_cost: self.total_cost,
            status: self.status.parse().map_err(|e| DatabaseError::corrupt("purchases.status", e))?,
            created_by: UserId::from_uuid(self.created_by),
            ordered_at: self.ordered_at,
            received_at: self.received_at,
            cancelled_at: self.cancelled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PurchaseItemRow {
    medicine_id: Uuid,
    quantity: i32,
    unit_cost: Decimal,
    line_total: Decimal,
}
