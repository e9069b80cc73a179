//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! hospital billing test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for common entities
//! - `builders`: Builder patterns for policies, bills and medicines
//! - `database`: Postgres testcontainer with the schema applied
//! - `assertions`: Assertion helpers for ledger and coverage invariants
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
