//! Stock movement audit rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{MedicineId, StockMovementId, UserId};
use crate::error::PharmacyError;

/// Why stock changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Sale,
    PurchaseReceipt,
    PurchaseCancellation,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Sale => "sale",
            MovementType::PurchaseReceipt => "purchase_receipt",
            MovementType::PurchaseCancellation => "purchase_cancellation",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = PharmacyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(MovementType::Sale),
            "purchase_receipt" => Ok(MovementType::PurchaseReceipt),
            "purchase_cancellation" => Ok(MovementType::PurchaseCancellation),
            other => Err(PharmacyError::validation("movement_type", format!("Unknown movement type '{}'", other))),
        }
    }
}

/// One change to a medicine's stock level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: StockMovementId,
    pub medicine_id: MedicineId,
    pub movement_type: MovementType,
    /// Signed change; negative for sales and reversals
    pub quantity_change: i32,
    pub quantity_before: i32,
    pub quantity_after: i32,
    /// Id of the sale or purchase that caused the movement
    pub reference_id: Uuid,
    pub performed_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub(crate) fn record(
        medicine_id: MedicineId,
        movement_type: MovementType,
        (quantity_before, quantity_after): (i32, i32),
        reference_id: Uuid,
        performed_by: UserId,
    ) -> Self {
        Self {
            id: StockMovementId::new_v7(),
            medicine_id,
            movement_type,
            quantity_change: quantity_after - quantity_before,
            quantity_before,
            quantity_after,
            reference_id,
            performed_by,
            created_at: Utc::now(),
        }
    }
}
