//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for bills, payments, refunds, insurance policies,
//! claims and pharmacy stock, built on SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. Every write that touches a
//! balance runs inside one transaction: the affected rows are locked with
//! `SELECT ... FOR UPDATE`, mapped into the domain aggregate, changed by the
//! aggregate's own rules and written back before the commit. Concurrent
//! writers against the same bill, policy or medicine therefore serialize,
//! and a failed rule rolls the whole operation back.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, BillingRepository};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/hospital")).await?;
//! infra_db::run_migrations(&pool).await?;
//! let bills = BillingRepository::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;

pub use pool::{DatabasePool, create_pool, create_pool_from_url, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use repositories::{
    BillingRepository, ClaimsRepository, InsuranceRepository, PharmacyRepository,
};
pub use repositories::billing::LedgerResult;
pub use repositories::claims::ClaimDecision;
pub use repositories::insurance::ProviderUpdate;
