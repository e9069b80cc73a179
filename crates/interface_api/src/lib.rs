//! HTTP API Layer
//!
//! REST API for hospital billing, insurance claims and the pharmacy,
//! built on Axum.
//!
//! # Architecture
//!
//! - **Handlers**: one module per resource; each checks its permission first
//! - **Middleware**: JWT authentication, audit logging, tracing
//! - **DTOs**: validated request bodies and the `{success, data}` envelope
//! - **Storage**: claim documents on a private local disk
//! - **Error Handling**: one `ApiError` with a consistent JSON shape
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(pool, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;
pub mod extract;
pub mod storage;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use domain_insurance::DocumentStore;
use infra_db::{BillingRepository, ClaimsRepository, InsuranceRepository, PharmacyRepository};

use crate::config::ApiConfig;
use crate::handlers::{bills, claims, health, payments, pharmacy, policies, providers};
use crate::middleware::{audit_middleware, auth_middleware};
use crate::storage::LocalDiskDocumentStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: ApiConfig,
    pub billing: BillingRepository,
    pub insurance: InsuranceRepository,
    pub claims: ClaimsRepository,
    pub pharmacy: PharmacyRepository,
    pub documents: Arc<dyn DocumentStore>,
}

impl AppState {
    /// Builds the state with an explicit document store
    pub fn new(pool: PgPool, config: ApiConfig, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            billing: BillingRepository::new(pool.clone()),
            insurance: InsuranceRepository::new(pool.clone()),
            claims: ClaimsRepository::new(pool.clone()),
            pharmacy: PharmacyRepository::new(pool.clone()),
            pool,
            config,
            documents,
        }
    }
}

/// Creates the main API router with documents on local disk
pub fn create_router(pool: PgPool, config: ApiConfig) -> Router {
    let documents = Arc::new(LocalDiskDocumentStore::new(config.document_root.clone()));
    router(AppState::new(pool, config, documents))
}

/// Creates the router for a prepared state
pub fn router(state: AppState) -> Router {
    // Room for the multipart framing around the largest document
    let upload_limit = DefaultBodyLimit::max(state.config.max_document_bytes + 64 * 1024);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let bill_routes = Router::new()
        .route("/", get(bills::list_bills).post(bills::create_bill))
        .route("/summary", get(bills::summary))
        .route(
            "/:id",
            get(bills::get_bill)
                .put(bills::update_bill)
                .patch(bills::update_bill)
                .delete(bills::void_bill),
        )
        .route("/:id/payments", get(payments::list_payments).post(payments::record_payment))
        .route("/:id/insurance-claims", post(claims::create_claim));

    let payment_routes = Router::new()
        .route("/:id", get(payments::get_payment))
        .route("/:id/void", post(payments::void_payment))
        .route("/:id/refund", post(payments::refund_payment))
        .route("/:id/statistics", get(payments::statistics));

    let claim_routes = Router::new()
        .route("/", get(claims::list_claims))
        .route(
            "/:id",
            get(claims::get_claim).put(claims::update_claim).delete(claims::delete_claim),
        )
        .route("/:id/submit", post(claims::submit_claim))
        .route("/:id/status", get(claims::claim_status).put(claims::change_status))
        .route("/:id/documents", post(claims::upload_document).layer(upload_limit))
        .route("/:id/documents/:index", get(claims::download_document));

    let provider_routes = Router::new()
        .route("/", get(providers::list_providers).post(providers::create_provider))
        .route(
            "/:id",
            get(providers::get_provider)
                .put(providers::update_provider)
                .delete(providers::delete_provider),
        );

    let policy_routes = Router::new()
        .route("/", post(policies::create_policy))
        .route(
            "/:id",
            get(policies::get_policy)
                .put(policies::update_policy)
                .delete(policies::delete_policy),
        )
        .route("/:id/set-primary", post(policies::set_primary))
        .route("/:id/update-deductible", post(policies::update_deductible))
        .route("/:id/update-annual-used", post(policies::update_annual_used))
        .route("/:id/calculate-coverage", post(policies::calculate_coverage))
        .route("/:id/validate", get(policies::validate));

    let pharmacy_routes = Router::new()
        .route("/medicines", get(pharmacy::list_medicines).post(pharmacy::create_medicine))
        .route("/medicines/low-stock", get(pharmacy::low_stock))
        .route("/medicines/:id", get(pharmacy::get_medicine))
        .route("/medicines/:id/movements", get(pharmacy::stock_movements))
        .route("/sales", post(pharmacy::create_sale))
        .route("/purchases", post(pharmacy::create_purchase))
        .route("/purchases/:id", get(pharmacy::get_purchase))
        .route("/purchases/:id/order", post(pharmacy::mark_ordered))
        .route("/purchases/:id/receive", post(pharmacy::receive_purchase))
        .route("/purchases/:id/cancel", post(pharmacy::cancel_purchase));

    // Protected API routes; auth is the outer layer so audit sees the caller
    let api_routes = Router::new()
        .nest("/bills", bill_routes)
        .nest("/payments", payment_routes)
        .nest("/insurance-claims", claim_routes)
        .nest("/insurance-providers", provider_routes)
        .nest("/patient-insurances", policy_routes)
        .route("/patients/:patient_id/insurances", get(policies::list_patient_policies))
        .nest("/pharmacy", pharmacy_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)),
        )
        .with_state(state)
}
