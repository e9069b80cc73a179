//! Payment handlers

use axum::{
    extract::{Path, State},
    Extension,
};
use uuid::Uuid;

use core_kernel::{BillId, Caller, PaymentId, Permission};
use domain_billing::{NewPayment, Payment, PaymentMethod, PaymentStatistics};

use crate::auth::authorize;
use crate::dto::billing::{
    PaymentResponse, RecordPaymentRequest, RefundPaymentRequest, RefundResponse,
    VoidPaymentRequest, VoidPaymentResponse,
};
use crate::dto::{created, ApiResponse, ApiResult, CreatedResult};
use crate::error::ApiError;
use crate::extract::ValidatedJson;
use crate::AppState;

/// Payments recorded against a bill, voided ones included
pub async fn list_payments(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(bill_id): Path<Uuid>,
) -> ApiResult<Vec<Payment>> {
    authorize(&caller, Permission::ViewBilling)?;
    let payments = state.billing.list_payments(BillId::from_uuid(bill_id)).await?;
    Ok(ApiResponse::ok(payments))
}

/// Records a cashier payment against a bill
///
/// Insurance credits are only created by approving a claim.
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(bill_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<RecordPaymentRequest>,
) -> CreatedResult<PaymentResponse> {
    authorize(&caller, Permission::CreatePayments)?;
    let method: PaymentMethod = request.payment_method.parse()?;
    if method == PaymentMethod::Insurance {
        return Err(ApiError::invalid(
            "payment_method",
            "Insurance payments are recorded by approving a claim",
        ));
    }

    let payment = NewPayment {
        amount: request.amount,
        method,
        amount_tendered: request.amount_tendered,
        transaction_reference: request.transaction_reference,
        notes: request.notes,
    };
    let result = state
        .billing
        .record_payment(BillId::from_uuid(bill_id), payment, &caller)
        .await?;
    Ok(created(PaymentResponse {
        change_due: result.entry.change_due,
        payment: result.entry.payment,
        bill: result.bill,
    }))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<Payment> {
    authorize(&caller, Permission::ViewBilling)?;
    Ok(ApiResponse::ok(state.billing.get_payment(PaymentId::from_uuid(id)).await?))
}

/// Voids a payment without refunds and restores the bill balance
pub async fn void_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<VoidPaymentRequest>,
) -> ApiResult<VoidPaymentResponse> {
    authorize(&caller, Permission::VoidPayments)?;
    let result = state
        .billing
        .void_payment(PaymentId::from_uuid(id), &request.reason, &caller)
        .await?;
    Ok(ApiResponse::with_message(
        VoidPaymentResponse { payment: result.entry, bill: result.bill },
        "Payment voided",
    ))
}

/// Refunds part or all of the payment's remaining refundable amount
pub async fn refund_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<RefundPaymentRequest>,
) -> CreatedResult<RefundResponse> {
    authorize(&caller, Permission::RefundPayments)?;
    let result = state
        .billing
        .refund_payment(PaymentId::from_uuid(id), request.refund_amount, &request.reason, &caller)
        .await?;
    Ok(created(RefundResponse { refund: result.entry, bill: result.bill }))
}

pub async fn statistics(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<PaymentStatistics> {
    authorize(&caller, Permission::ViewBilling)?;
    Ok(ApiResponse::ok(state.billing.payment_statistics(PaymentId::from_uuid(id)).await?))
}
