//! Explicit caller context
//!
//! Every operation that checks a permission or stamps an actor column
//! (`processed_by`, `received_by`, ...) receives a `Caller` argument built
//! from the authenticated request. Nothing reads an ambient current user.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::identifiers::UserId;

/// Role that implicitly holds every permission
pub const ADMIN_ROLE: &str = "admin";

/// Permission strings checked by the API boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
    ViewBilling,
    CreateBilling,
    EditBilling,
    DeleteBilling,
    CreatePayments,
    VoidPayments,
    RefundPayments,
    ViewInsuranceClaims,
    CreateInsuranceClaims,
    EditInsuranceClaims,
    DeleteInsuranceClaims,
    ViewInsurance,
    ManageInsurance,
    ViewPharmacy,
    ManagePharmacy,
}

impl Permission {
    pub const ALL: [Permission; 15] = [
        Permission::ViewBilling,
        Permission::CreateBilling,
        Permission::EditBilling,
        Permission::DeleteBilling,
        Permission::CreatePayments,
        Permission::VoidPayments,
        Permission::RefundPayments,
        Permission::ViewInsuranceClaims,
        Permission::CreateInsuranceClaims,
        Permission::EditInsuranceClaims,
        Permission::DeleteInsuranceClaims,
        Permission::ViewInsurance,
        Permission::ManageInsurance,
        Permission::ViewPharmacy,
        Permission::ManagePharmacy,
    ];

    /// Returns the wire name of the permission
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewBilling => "view-billing",
            Permission::CreateBilling => "create-billing",
            Permission::EditBilling => "edit-billing",
            Permission::DeleteBilling => "delete-billing",
            Permission::CreatePayments => "create-payments",
            Permission::VoidPayments => "void-payments",
            Permission::RefundPayments => "refund-payments",
            Permission::ViewInsuranceClaims => "view-insurance-claims",
            Permission::CreateInsuranceClaims => "create-insurance-claims",
            Permission::EditInsuranceClaims => "edit-insurance-claims",
            Permission::DeleteInsuranceClaims => "delete-insurance-claims",
            Permission::ViewInsurance => "view-insurance",
            Permission::ManageInsurance => "manage-insurance",
            Permission::ViewPharmacy => "view-pharmacy",
            Permission::ManagePharmacy => "manage-pharmacy",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CoreError::validation(format!("Unknown permission: {}", s)))
    }
}

/// The authenticated actor of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    roles: Vec<String>,
    permissions: BTreeSet<Permission>,
}

impl Caller {
    /// Creates a caller; unknown permission strings are ignored
    pub fn new<R, P>(user_id: UserId, roles: R, permissions: P) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        Self {
            user_id,
            roles: roles.into_iter().map(Into::into).collect(),
            permissions: permissions
                .into_iter()
                .filter_map(|p| p.as_ref().parse().ok())
                .collect(),
        }
    }

    /// Creates an admin caller
    pub fn admin(user_id: UserId) -> Self {
        Self::new(user_id, [ADMIN_ROLE], Vec::<String>::new())
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }

    /// Returns true if the caller holds the permission directly or via admin
    pub fn can(&self, permission: Permission) -> bool {
        self.is_admin() || self.permissions.contains(&permission)
    }

    /// Fails with `CoreError::MissingPermission` unless the caller holds it
    pub fn require(&self, permission: Permission) -> Result<(), CoreError> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(CoreError::MissingPermission(permission.to_string()))
        }
    }
}
