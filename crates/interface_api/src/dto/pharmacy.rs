//! Pharmacy DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::MedicineId;
use domain_pharmacy::{NewMedicine, Purchase, PurchaseLine, Sale, SaleLine, StockMovement};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMedicineRequest {
    #[validate(length(min = 1, max = 255, message = "Medicine name is required"))]
    pub name: String,
    #[validate(length(max = 255))]
    pub generic_name: Option<String>,
    #[validate(length(min = 1, max = 50, message = "SKU is required"))]
    pub sku: String,
    #[validate(length(min = 1, max = 30))]
    pub unit: String,
    #[serde(default)]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock_quantity: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub reorder_level: i32,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub expiry_date: Option<NaiveDate>,
}

impl From<CreateMedicineRequest> for NewMedicine {
    fn from(r: CreateMedicineRequest) -> Self {
        NewMedicine {
            name: r.name,
            generic_name: r.generic_name,
            sku: r.sku,
            unit: r.unit,
            stock_quantity: r.stock_quantity,
            reorder_level: r.reorder_level,
            cost_price: r.cost_price,
            selling_price: r.selling_price,
            expiry_date: r.expiry_date,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SaleLineRequest {
    pub medicine_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    /// Defaults to the medicine's selling price
    pub unit_price: Option<Decimal>,
}

impl From<SaleLineRequest> for SaleLine {
    fn from(r: SaleLineRequest) -> Self {
        SaleLine {
            medicine_id: MedicineId::from_uuid(r.medicine_id),
            quantity: r.quantity,
            unit_price: r.unit_price,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSaleRequest {
    pub patient_id: Option<Uuid>,
    #[validate(length(min = 1, message = "A sale needs at least one item"), nested)]
    pub items: Vec<SaleLineRequest>,
    #[validate(length(min = 1, max = 30))]
    pub payment_method: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PurchaseLineRequest {
    pub medicine_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub unit_cost: Decimal,
}

impl From<PurchaseLineRequest> for PurchaseLine {
    fn from(r: PurchaseLineRequest) -> Self {
        PurchaseLine {
            medicine_id: MedicineId::from_uuid(r.medicine_id),
            quantity: r.quantity,
            unit_cost: r.unit_cost,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePurchaseRequest {
    #[validate(length(min = 1, max = 255, message = "Supplier name is required"))]
    pub supplier_name: String,
    #[validate(length(min = 1, message = "A purchase needs at least one item"), nested)]
    pub items: Vec<PurchaseLineRequest>,
}

#[derive(Debug, Serialize)]
pub struct SaleResponse {
    pub sale: Sale,
    pub movements: Vec<StockMovement>,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub purchase: Purchase,
    pub movements: Vec<StockMovement>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_needs_items() {
        let request = CreateSaleRequest {
            patient_id: None,
            items: vec![],
            payment_method: "cash".into(),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("items"));
    }

    #[test]
    fn test_zero_quantity_line_rejected() {
        let request = CreatePurchaseRequest {
            supplier_name: "MedSupply".into(),
            items: vec![PurchaseLineRequest {
                medicine_id: Uuid::new_v4(),
                quantity: 0,
                unit_cost: Decimal::ONE,
            }],
        };
        assert!(request.validate().is_err());
    }
}
