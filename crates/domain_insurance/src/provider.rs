//! Insurance providers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::ProviderId;
use crate::error::InsuranceError;

/// An insurance company patients can be enrolled with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceProvider {
    pub id: ProviderId,
    pub name: String,
    /// Short unique code (e.g. "AETNA")
    pub code: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InsuranceProvider {
    /// Creates a new active provider
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Result<Self, InsuranceError> {
        let name = name.into().trim().to_string();
        let code = code.into().trim().to_uppercase();
        if name.is_empty() {
            return Err(InsuranceError::validation("name", "Provider name is required"));
        }
        if code.is_empty() {
            return Err(InsuranceError::validation("code", "Provider code is required"));
        }

        let now = Utc::now();
        Ok(Self {
            id: ProviderId::new_v7(),
            name,
            code,
            contact_email: None,
            contact_phone: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_contact(mut self, email: Option<String>, phone: Option<String>) -> Self {
        self.contact_email = email;
        self.contact_phone = phone;
        self
    }

    /// Applies an edit; `None` leaves a field unchanged
    pub fn update(
        &mut self,
        name: Option<String>,
        contact_email: Option<String>,
        contact_phone: Option<String>,
        is_active: Option<bool>,
    ) -> Result<(), InsuranceError> {
        if let Some(name) = name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(InsuranceError::validation("name", "Provider name is required"));
            }
            self.name = name;
        }
        if contact_email.is_some() {
            self.contact_email = contact_email;
        }
        if contact_phone.is_some() {
            self.contact_phone = contact_phone;
        }
        if let Some(active) = is_active {
            self.is_active = active;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Deactivates the provider; policies with it stop validating
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }
}
