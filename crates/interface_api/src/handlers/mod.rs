//! HTTP request handlers

pub mod health;
pub mod bills;
pub mod payments;
pub mod claims;
pub mod providers;
pub mod policies;
pub mod pharmacy;
