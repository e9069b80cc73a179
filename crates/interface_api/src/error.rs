//! API error handling
//!
//! Every failure leaves the API as `{success: false, message}`; validation
//! failures add `errors` keyed by field. Domain errors arrive either
//! directly or wrapped in `DatabaseError` and are classified the same way.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use validator::{ValidationErrors, ValidationErrorsKind};

use core_kernel::{CoreError, PortError};
use domain_billing::BillingError;
use domain_insurance::InsuranceError;
use domain_pharmacy::PharmacyError;
use infra_db::DatabaseError;

/// Field name to messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A business rule refused the operation
    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("The given data was invalid")]
    Validation(FieldErrors),
}

impl ApiError {
    /// A single-field validation error
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.entry(field.into()).or_default().push(message.into());
        ApiError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Conflict(reason) = &self {
            warn!(reason = %reason, "business rule rejected request");
        }
        let message = match &self {
            ApiError::Internal(detail) => format!("Operation failed: {}", detail),
            other => other.to_string(),
        };
        let errors = match self {
            ApiError::Validation(errors) => Some(errors),
            _ => None,
        };

        let body = ErrorResponse { success: false, message, errors };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        flatten_validation(&errors, None, &mut fields);
        ApiError::Validation(fields)
    }
}

/// Flattens nested validator output into `items.0.quantity` style keys
fn flatten_validation(errors: &ValidationErrors, prefix: Option<&str>, out: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let key = match prefix {
            Some(p) => format!("{}.{}", p, field),
            None => field.to_string(),
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = out.entry(key).or_default();
                for e in list {
                    messages.push(
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Invalid value ({})", e.code)),
                    );
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten_validation(inner, Some(&key), out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten_validation(inner, Some(&format!("{}.{}", key, index)), out);
                }
            }
        }
    }
}

impl From<InsuranceError> for ApiError {
    fn from(err: InsuranceError) -> Self {
        match err {
            InsuranceError::Validation { field, message } => ApiError::invalid(field, message),
            InsuranceError::Money(e) => ApiError::invalid("amount", e.to_string()),
            InsuranceError::Temporal(e) => ApiError::invalid("coverage_end_date", e.to_string()),
            InsuranceError::DocumentNotFound(_) => ApiError::NotFound(err.to_string()),
            other => ApiError::Conflict(other.to_string()),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Validation { field, message } => ApiError::invalid(field, message),
            BillingError::Money(e) => ApiError::invalid("amount", e.to_string()),
            other => ApiError::Conflict(other.to_string()),
        }
    }
}

impl From<PharmacyError> for ApiError {
    fn from(err: PharmacyError) -> Self {
        match err {
            PharmacyError::Validation { field, message } => ApiError::invalid(field, message),
            PharmacyError::MedicineNotFound(_) => ApiError::NotFound(err.to_string()),
            other => ApiError::Conflict(other.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingPermission(permission) => ApiError::Forbidden(permission),
            CoreError::NotFound(message) => ApiError::NotFound(message),
            other => ApiError::invalid("general", other.to_string()),
        }
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            PortError::Validation { ref message, ref field } => {
                ApiError::invalid(field.clone().unwrap_or_else(|| "file".to_string()), message.clone())
            }
            PortError::Conflict { message } => ApiError::Conflict(message),
            PortError::Internal { .. } => {
                error!(error = %err, "document storage failed");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Insurance(e) => e.into(),
            DatabaseError::Billing(e) => e.into(),
            DatabaseError::Pharmacy(e) => e.into(),
            DatabaseError::NotFound(message) => ApiError::NotFound(message),
            DatabaseError::DuplicateEntry(message) => ApiError::Conflict(message),
            DatabaseError::ForeignKeyViolation(message) | DatabaseError::ConstraintViolation(message) => {
                ApiError::Conflict(message)
            }
            other => {
                error!(error = %other, "database operation failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use validator::Validate;

    #[derive(Validate)]
    struct Line {
        #[validate(range(min = 1, message = "Quantity must be at least 1"))]
        quantity: i32,
    }

    #[derive(Validate)]
    struct Order {
        #[validate(length(min = 1, message = "Supplier is required"))]
        supplier: String,
        #[validate(nested)]
        items: Vec<Line>,
    }

    #[test]
    fn test_nested_validation_keys() {
        let order = Order { supplier: String::new(), items: vec![Line { quantity: 1 }, Line { quantity: 0 }] };
        let ApiError::Validation(errors) = ApiError::from(order.validate().unwrap_err()) else {
            panic!("expected validation error");
        };
        assert_eq!(errors["supplier"], vec!["Supplier is required"]);
        assert_eq!(errors["items.1.quantity"], vec!["Quantity must be at least 1"]);
    }

    #[test]
    fn test_domain_conflicts_are_409() {
        let err: ApiError = DatabaseError::Billing(BillingError::PaymentExceedsDue {
            amount: dec!(10),
            amount_due: dec!(5),
        })
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = DatabaseError::Insurance(InsuranceError::validation("claim_amount", "bad")).into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err: ApiError = DatabaseError::not_found("Bill", "x").into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = DatabaseError::PoolExhausted.into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_missing_permission_is_403() {
        let err: ApiError = CoreError::MissingPermission("view-billing".into()).into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
