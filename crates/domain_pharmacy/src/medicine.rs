//! Medicines and their stock level

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{
    MedicineId,
    money::{ensure_non_negative, round_money},
};
use crate::error::PharmacyError;

/// Fields supplied when registering a medicine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMedicine {
    pub name: String,
    pub generic_name: Option<String>,
    pub sku: String,
    pub unit: String,
    pub stock_quantity: i32,
    pub reorder_level: i32,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub expiry_date: Option<NaiveDate>,
}

/// A stocked medicine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: MedicineId,
    pub name: String,
    pub generic_name: Option<String>,
    pub sku: String,
    pub unit: String,
    /// Never negative
    pub stock_quantity: i32,
    pub reorder_level: i32,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    pub fn register(input: NewMedicine) -> Result<Self, PharmacyError> {
        if input.name.trim().is_empty() {
            return Err(PharmacyError::validation("name", "Name is required"));
        }
        if input.sku.trim().is_empty() {
            return Err(PharmacyError::validation("sku", "SKU is required"));
        }
        if input.stock_quantity < 0 {
            return Err(PharmacyError::validation("stock_quantity", "Stock cannot be negative"));
        }
        if input.reorder_level < 0 {
            return Err(PharmacyError::validation("reorder_level", "Reorder level cannot be negative"));
        }
        let cost_price = ensure_non_negative(round_money(input.cost_price))
            .map_err(|e| PharmacyError::validation("cost_price", e.to_string()))?;
        let selling_price = ensure_non_negative(round_money(input.selling_price))
            .map_err(|e| PharmacyError::validation("selling_price", e.to_string()))?;

        let now = Utc::now();
        Ok(Self {
            id: MedicineId::new_v7(),
            name: input.name.trim().to_string(),
            generic_name: input.generic_name,
            sku: input.sku.trim().to_uppercase(),
            unit: input.unit,
            stock_quantity: input.stock_quantity,
            reorder_level: input.reorder_level,
            cost_price,
            selling_price,
            expiry_date: input.expiry_date,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.reorder_level
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|d| d < today)
    }

    /// Removes stock; returns `(before, after)`
    pub(crate) fn take(&mut self, quantity: i32) -> Result<(i32, i32), PharmacyError> {
        if quantity > self.stock_quantity {
            return Err(PharmacyError::InsufficientStock {
                medicine: self.name.clone(),
                requested: quantity,
                available: self.stock_quantity,
            });
        }
        let before = self.stock_quantity;
        self.stock_quantity -= quantity;
        self.updated_at = Utc::now();
        Ok((before, self.stock_quantity))
    }

    /// Adds stock; returns `(before, after)`
    pub(crate) fn restock(&mut self, quantity: i32) -> Result<(i32, i32), PharmacyError> {
        let before = self.stock_quantity;
        self.stock_quantity = before.checked_add(quantity).ok_or_else(|| {
            PharmacyError::StockLimitExceeded { medicine: self.name.clone(), quantity }
        })?;
        self.updated_at = Utc::now();
        Ok((before, self.stock_quantity))
    }
}
