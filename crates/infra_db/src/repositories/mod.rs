//! Repository implementations for domain entities
//!
//! This module provides concrete repository implementations that handle
//! database access for each domain aggregate. Repositories encapsulate
//! SQL queries and map between database rows and domain types.
//!
//! # Architecture
//!
//! Each repository follows these principles:
//! - One transaction per mutating operation, committed only when every write succeeded
//! - Pessimistic row locks (`FOR UPDATE`) on the bill, payment, policy or medicine being changed
//! - Business rules live in the domain aggregates; repositories load, delegate and persist
//! - Row structs are private and converted with `TryFrom` so a bad stored value surfaces as an error
//!
//! Locks are always taken in the same order (bill, then payment, then policy;
//! medicines by ascending id) to keep concurrent writers from deadlocking.

mod counters;

pub mod insurance;
pub mod claims;
pub mod billing;
pub mod pharmacy;

pub use insurance::InsuranceRepository;
pub use claims::ClaimsRepository;
pub use billing::BillingRepository;
pub use pharmacy::PharmacyRepository;
