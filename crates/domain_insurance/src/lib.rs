//! Insurance Domain
//!
//! This crate implements patient insurance: providers, the policies that
//! link a patient to a provider, the coverage calculator that splits a
//! charge between insurer and patient, and the claim lifecycle.
//!
//! # Claim Lifecycle
//!
//! ```text
//! draft -> pending -> submitted -> under_review -> approved / partial_approved / rejected -> closed
//! ```
//!
//! Transitions are declared once in [`claim::ClaimStatus::allowed_transitions`];
//! anything not listed there is rejected.

pub mod provider;
pub mod policy;
pub mod coverage;
pub mod validation;
pub mod claim;
pub mod document;
pub mod ports;
pub mod error;

pub use provider::InsuranceProvider;
pub use policy::{InsurancePolicy, PolicyTerms, assign_primary, next_priority_order};
pub use coverage::{CoverageBreakdown, CoPayBasis, calculate_coverage};
pub use validation::{PolicyValidation, ValidationIssue, ValidationWarning, validate_policy};
pub use claim::{InsuranceClaim, ClaimStatus, StatusChange, ClaimResolution, claim_number, ensure_single_open_claim};
pub use document::ClaimDocument;
pub use ports::DocumentStore;
pub use error::InsuranceError;
