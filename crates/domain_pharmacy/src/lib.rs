//! Pharmacy Domain
//!
//! Medicine stock and the two flows that move it: point-of-sale sales
//! decrement stock, purchase receipts increment it. Every change to
//! `stock_quantity` produces a [`StockMovement`] with the quantities before
//! and after, and no operation can drive stock below zero.
//!
//! # Purchase Lifecycle
//!
//! ```text
//! pending -> ordered -> received
//!    \          \          \
//!     +----------+----------+--> cancelled
//! ```

pub mod medicine;
pub mod stock;
pub mod sale;
pub mod purchase;
pub mod error;

pub use medicine::{Medicine, NewMedicine};
pub use stock::{StockMovement, MovementType};
pub use sale::{Sale, SaleItem, SaleLine};
pub use purchase::{Purchase, PurchaseItem, PurchaseLine, PurchaseStatus};
pub use error::PharmacyError;
