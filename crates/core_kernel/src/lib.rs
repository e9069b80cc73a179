//! Core Kernel - Foundational types shared by the hospital billing domains
//!
//! This crate provides the building blocks used across all domain modules:
//! - Strongly-typed identifiers for every persisted entity
//! - Money helpers with precise decimal arithmetic
//! - Coverage periods for insurance enrollment dates
//! - The explicit caller context used for authorization and audit stamps

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod caller;
pub mod ports;
pub mod error;

pub use money::{round_money, Rate, MoneyError};
pub use temporal::{CoveragePeriod, PeriodPosition, TemporalError};
pub use identifiers::{
    PatientId, DoctorId, UserId, ProviderId, InsurancePolicyId, ClaimId,
    BillId, BillItemId, PaymentId, RefundId, MedicineId, SaleId, PurchaseId,
    StockMovementId,
};
pub use caller::{Caller, Permission};
pub use ports::{PortError, DomainPort};
pub use error::CoreError;
