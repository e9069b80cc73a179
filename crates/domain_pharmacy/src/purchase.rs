//! Purchase orders from suppliers

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    Caller, MedicineId, PurchaseId, UserId,
    money::{checked_total, ensure_non_negative, line_total, round_money},
};
use crate::error::PharmacyError;
use crate::medicine::Medicine;
use crate::stock::{MovementType, StockMovement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Ordered,
    Received,
    Cancelled,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Ordered => "ordered",
            PurchaseStatus::Received => "received",
            PurchaseStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, target: PurchaseStatus) -> bool {
        use PurchaseStatus::*;
        matches!(
            (*self, target),
            (Pending, Ordered) | (Ordered, Received) | (Pending | Ordered | Received, Cancelled)
        )
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseStatus {
    type Err = PharmacyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PurchaseStatus::Pending),
            "ordered" => Ok(PurchaseStatus::Ordered),
            "received" => Ok(PurchaseStatus::Received),
            "cancelled" => Ok(PurchaseStatus::Cancelled),
            other => Err(PharmacyError::validation("status", format!("Unknown purchase status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub medicine_id: MedicineId,
    pub quantity: i32,
    pub unit_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub medicine_id: MedicineId,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub supplier_name: String,
    pub items: Vec<PurchaseItem>,
    pub total_cost: Decimal,
    pub status: PurchaseStatus,
    pub created_by: UserId,
    pub ordered_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    pub fn create(
        supplier_name: impl Into<String>,
        lines: Vec<PurchaseLine>,
        caller: &Caller,
    ) -> Result<Self, PharmacyError> {
        let supplier_name = supplier_name.into().trim().to_string();
        if supplier_name.is_empty() {
            return Err(PharmacyError::validation("supplier_name", "Supplier is required"));
        }
        if lines.is_empty() {
            return Err(PharmacyError::validation("items", "A purchase needs at least one item"));
        }

        let mut per_medicine: HashMap<MedicineId, i32> = HashMap::new();
        let mut items = Vec::with_capacity(lines.len());
        for (i, line) in lines.into_iter().enumerate() {
            let quantity_field = || format!("items.{}.quantity", i);
            if line.quantity < 1 {
                return Err(PharmacyError::validation(quantity_field(), "Quantity must be at least 1"));
            }
            let unit_cost = ensure_non_negative(round_money(line.unit_cost)).map_err(|e| {
                PharmacyError::validation(format!("items.{}.unit_cost", i), e.to_string())
            })?;
            let line_total = line_total(unit_cost, line.quantity)
                .map_err(|e| PharmacyError::validation(quantity_field(), e.to_string()))?;
            let ordered = per_medicine.entry(line.medicine_id).or_default();
            *ordered = ordered.checked_add(line.quantity).ok_or_else(|| {
                PharmacyError::validation(quantity_field(), "Total quantity for this medicine is too large")
            })?;
            items.push(PurchaseItem {
                medicine_id: line.medicine_id,
                quantity: line.quantity,
                unit_cost,
                line_total,
            });
        }
        let total_cost = checked_total(items.iter().map(|i| i.line_total))
            .map_err(|e| PharmacyError::validation("items", e.to_string()))?;

        let now = Utc::now();
        Ok(Self {
            id: PurchaseId::new_v7(),
            supplier_name,
            total_cost,
            items,
            status: PurchaseStatus::Pending,
            created_by: caller.user_id,
            ordered_at: None,
            received_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Medicines whose rows must be locked before receiving or cancelling
    pub fn medicine_ids(&self) -> Vec<MedicineId> {
        let mut ids: Vec<_> = self.items.iter().map(|i| i.medicine_id).collect();
        ids.sort_by_key(|id| *id.as_uuid());
        ids.dedup();
        ids
    }

    fn transition(&mut self, target: PurchaseStatus) -> Result<DateTime<Utc>, PharmacyError> {
        if !self.status.can_transition_to(target) {
            return Err(PharmacyError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        let now = Utc::now();
        self.status = target;
        self.updated_at = now;
        Ok(now)
    }

    pub fn mark_ordered(&mut self) -> Result<(), PharmacyError> {
        let now = self.transition(PurchaseStatus::Ordered)?;
        self.ordered_at = Some(now);
        Ok(())
    }

    /// Receives the goods, adding every line to stock
    pub fn receive(
        &mut self,
        stock: &mut HashMap<MedicineId, Medicine>,
        caller: &Caller,
    ) -> Result<Vec<StockMovement>, PharmacyError> {
        if !self.status.can_transition_to(PurchaseStatus::Received) {
            return Err(PharmacyError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: PurchaseStatus::Received.to_string(),
            });
        }
        self.ensure_stock_rows(stock)?;

        for (medicine_id, quantity) in self.quantities_by_medicine() {
            if let Some(medicine) = stock.get(&medicine_id) {
                if medicine.stock_quantity.checked_add(quantity).is_none() {
                    return Err(PharmacyError::StockLimitExceeded {
                        medicine: medicine.name.clone(),
                        quantity,
                    });
                }
            }
        }

        let mut movements = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let medicine = stock
                .get_mut(&item.medicine_id)
                .ok_or_else(|| PharmacyError::MedicineNotFound(item.medicine_id.to_string()))?;
            let levels = medicine.restock(item.quantity)?;
            movements.push(StockMovement::record(
                medicine.id,
                MovementType::PurchaseReceipt,
                levels,
                *self.id.as_uuid(),
                caller.user_id,
            ));
        }

        let now = self.transition(PurchaseStatus::Received)?;
        self.received_at = Some(now);
        Ok(movements)
    }

    /// Cancels the purchase; a received purchase has its stock reversed
    ///
    /// Refused when the reversal would take a medicine below zero.
    pub fn cancel(
        &mut self,
        stock: &mut HashMap<MedicineId, Medicine>,
        caller: &Caller,
    ) -> Result<Vec<StockMovement>, PharmacyError> {
        if !self.status.can_transition_to(PurchaseStatus::Cancelled) {
            return Err(PharmacyError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: PurchaseStatus::Cancelled.to_string(),
            });
        }

        let mut movements = Vec::new();
        if self.status == PurchaseStatus::Received {
            self.ensure_stock_rows(stock)?;

            for (medicine_id, quantity) in self.quantities_by_medicine() {
                if let Some(medicine) = stock.get(&medicine_id) {
                    if quantity > medicine.stock_quantity {
                        return Err(PharmacyError::ReversalExceedsStock {
                            medicine: medicine.name.clone(),
                            quantity,
                            on_hand: medicine.stock_quantity,
                        });
                    }
                }
            }

            for item in &self.items {
                let medicine = stock
                    .get_mut(&item.medicine_id)
                    .ok_or_else(|| PharmacyError::MedicineNotFound(item.medicine_id.to_string()))?;
                let levels = medicine.take(item.quantity)?;
                movements.push(StockMovement::record(
                    medicine.id,
                    MovementType::PurchaseCancellation,
                    levels,
                    *self.id.as_uuid(),
                    caller.user_id,
                ));
            }
        }

        let now = self.transition(PurchaseStatus::Cancelled)?;
        self.cancelled_at = Some(now);
        Ok(movements)
    }

    /// Total quantity per medicine across all lines
    fn quantities_by_medicine(&self) -> HashMap<MedicineId, i32> {
        let mut totals: HashMap<MedicineId, i32> = HashMap::new();
        for item in &self.items {
            let total = totals.entry(item.medicine_id).or_default();
            *total = total.saturating_add(item.quantity);
        }
        totals
    }

    fn ensure_stock_rows(&self, stock: &HashMap<MedicineId, Medicine>) -> Result<(), PharmacyError> {
        match self.items.iter().find(|i| !stock.contains_key(&i.medicine_id)) {
            Some(missing) => Err(PharmacyError::MedicineNotFound(missing.medicine_id.to_string())),
            None => Ok(()),
        }
    }
}
