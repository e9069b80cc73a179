//! Point-of-sale sales

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::{
    Caller, MedicineId, PatientId, SaleId, UserId,
    money::{checked_total, ensure_non_negative, line_total, round_money},
};
use crate::error::PharmacyError;
use crate::medicine::Medicine;
use crate::stock::{MovementType, StockMovement};

/// Requested sale line; the price defaults to the medicine's selling price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub medicine_id: MedicineId,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    pub medicine_id: MedicineId,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub patient_id: Option<PatientId>,
    pub items: Vec<SaleItem>,
    pub total_amount: Decimal,
    pub payment_method: String,
    pub sold_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Sells the requested lines out of `stock`
    ///
    /// `stock` holds every medicine named by the lines, already locked by
    /// the caller. Either every line is sold or nothing changes.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty sale, a quantity below one or a negative price
    /// - `MedicineNotFound` when a line names a medicine missing from `stock`
    /// - `InsufficientStock` when a medicine's total requested quantity exceeds what is on hand
    pub fn checkout(
        lines: Vec<SaleLine>,
        stock: &mut HashMap<MedicineId, Medicine>,
        patient_id: Option<PatientId>,
        payment_method: impl Into<String>,
        caller: &Caller,
    ) -> Result<(Sale, Vec<StockMovement>), PharmacyError> {
        if lines.is_empty() {
            return Err(PharmacyError::validation("items", "A sale needs at least one item"));
        }

        let mut requested: HashMap<MedicineId, i32> = HashMap::new();
        let mut items = Vec::with_capacity(lines.len());
        for (i, line) in lines.into_iter().enumerate() {
            if line.quantity < 1 {
                return Err(PharmacyError::validation(
                    format!("items.{}.quantity", i),
                    "Quantity must be at least 1",
                ));
            }
            let medicine = stock
                .get(&line.medicine_id)
                .ok_or_else(|| PharmacyError::MedicineNotFound(line.medicine_id.to_string()))?;
            let unit_price = match line.unit_price {
                Some(price) => ensure_non_negative(round_money(price)).map_err(|e| {
                    PharmacyError::validation(format!("items.{}.unit_price", i), e.to_string())
                })?,
                None => medicine.selling_price,
            };
            let line_total = line_total(unit_price, line.quantity).map_err(|e| {
                PharmacyError::validation(format!("items.{}.quantity", i), e.to_string())
            })?;
            let total_requested = requested.entry(line.medicine_id).or_default();
            *total_requested = total_requested.checked_add(line.quantity).ok_or_else(|| {
                PharmacyError::validation(
                    format!("items.{}.quantity", i),
                    "Total quantity for this medicine is too large",
                )
            })?;
            items.push(SaleItem {
                medicine_id: line.medicine_id,
                quantity: line.quantity,
                unit_price,
                line_total,
            });
        }

        for (medicine_id, quantity) in &requested {
            if let Some(medicine) = stock.get(medicine_id) {
                if *quantity > medicine.stock_quantity {
                    return Err(PharmacyError::InsufficientStock {
                        medicine: medicine.name.clone(),
                        requested: *quantity,
                        available: medicine.stock_quantity,
                    });
                }
            }
        }

        let total_amount = checked_total(items.iter().map(|i| i.line_total))
            .map_err(|e| PharmacyError::validation("items", e.to_string()))?;

        let sale_id = SaleId::new_v7();
        let mut movements = Vec::with_capacity(items.len());
        for item in &items {
            let medicine = stock
                .get_mut(&item.medicine_id)
                .ok_or_else(|| PharmacyError::MedicineNotFound(item.medicine_id.to_string()))?;
            let levels = medicine.take(item.quantity)?;
            movements.push(StockMovement::record(
                medicine.id,
                MovementType::Sale,
                levels,
                *sale_id.as_uuid(),
                caller.user_id,
            ));
        }

        let sale = Sale {
            id: sale_id,
            patient_id,
            total_amount,
            items,
            payment_method: payment_method.into(),
            sold_by: caller.user_id,
            created_at: Utc::now(),
        };
        Ok((sale, movements))
    }
}
