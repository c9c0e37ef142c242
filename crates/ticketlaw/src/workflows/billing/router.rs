use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::domain::{BusinessId, PaymentId};
use super::processor::{PaymentProcessor, ProcessorEvent};
use super::repository::{BusinessRepository, InvoiceRepository, PaymentRepository};
use super::service::{
    BillingError, BillingService, BusinessBillingService, InvoiceService, IssueInvoiceRequest,
};
use crate::access::Actor;
use crate::http::{self, PageQuery};
use crate::workflows::cases::domain::CaseId;
use crate::workflows::cases::repository::{CaseRepository, LawyerRepository};

fn respond_err(err: BillingError) -> Response {
    http::failure(err.kind(), err.to_string())
}

/// Router over the case-payment ledger.
pub fn payment_router<P, C, L, X>(service: Arc<BillingService<P, C, L, X>>) -> Router
where
    P: PaymentRepository + 'static,
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    X: PaymentProcessor + 'static,
{
    Router::new()
        .route("/api/v1/payments/intent", post(create_intent::<P, C, L, X>))
        .route(
            "/api/v1/payments/:payment_id/confirm",
            post(confirm::<P, C, L, X>),
        )
        .route(
            "/api/v1/payments/:payment_id/refund",
            post(request_refund::<P, C, L, X>),
        )
        .route(
            "/api/v1/payments/:payment_id/process-refund",
            post(process_refund::<P, C, L, X>),
        )
        .route(
            "/api/v1/payments/:payment_id/payout",
            post(process_payout::<P, C, L, X>),
        )
        .route("/api/v1/payments", get(history::<P, C, L, X>))
        .with_state(service)
}

/// Router over back-office invoices.
pub fn invoice_router<I>(service: Arc<InvoiceService<I>>) -> Router
where
    I: InvoiceRepository + 'static,
{
    Router::new()
        .route("/api/v1/invoices", post(issue_invoice::<I>).get(list_invoices::<I>))
        .with_state(service)
}

/// Router over B2B billing and the processor webhook.
pub fn business_router<B, X>(service: Arc<BusinessBillingService<B, X>>) -> Router
where
    B: BusinessRepository + 'static,
    X: PaymentProcessor + 'static,
{
    Router::new()
        .route(
            "/api/v1/business/:business_id/invoice",
            post(monthly_invoice::<B, X>),
        )
        .route(
            "/api/v1/business/:business_id/billing",
            get(billing_history::<B, X>),
        )
        .route(
            "/api/v1/business/:business_id/checkout",
            post(checkout::<B, X>),
        )
        .route("/api/v1/billing/webhook", post(webhook::<B, X>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateIntentRequest {
    pub case_number: CaseId,
}

pub(crate) async fn create_intent<P, C, L, X>(
    State(service): State<Arc<BillingService<P, C, L, X>>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateIntentRequest>,
) -> Response
where
    P: PaymentRepository + 'static,
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    X: PaymentProcessor + 'static,
{
    match service.create_intent(&request.case_number, &actor, Utc::now()) {
        Ok(receipt) => http::created(receipt),
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn confirm<P, C, L, X>(
    State(service): State<Arc<BillingService<P, C, L, X>>>,
    Extension(actor): Extension<Actor>,
    Path(payment_id): Path<String>,
) -> Response
where
    P: PaymentRepository + 'static,
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    X: PaymentProcessor + 'static,
{
    match service.confirm(&PaymentId(payment_id), &actor, Utc::now()) {
        Ok(payment) => http::ok(payment),
        Err(err) => respond_err(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefundRequestBody {
    pub reason: String,
    pub amount_cents: Option<u64>,
}

pub(crate) async fn request_refund<P, C, L, X>(
    State(service): State<Arc<BillingService<P, C, L, X>>>,
    Extension(actor): Extension<Actor>,
    Path(payment_id): Path<String>,
    Json(body): Json<RefundRequestBody>,
) -> Response
where
    P: PaymentRepository + 'static,
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    X: PaymentProcessor + 'static,
{
    match service.request_refund(
        &PaymentId(payment_id),
        body.reason,
        body.amount_cents,
        &actor,
        Utc::now(),
    ) {
        Ok(payment) => http::ok(payment),
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn process_refund<P, C, L, X>(
    State(service): State<Arc<BillingService<P, C, L, X>>>,
    Extension(actor): Extension<Actor>,
    Path(payment_id): Path<String>,
) -> Response
where
    P: PaymentRepository + 'static,
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    X: PaymentProcessor + 'static,
{
    match service.process_refund(&PaymentId(payment_id), &actor, Utc::now()) {
        Ok(payment) => http::ok(payment),
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn process_payout<P, C, L, X>(
    State(service): State<Arc<BillingService<P, C, L, X>>>,
    Extension(actor): Extension<Actor>,
    Path(payment_id): Path<String>,
) -> Response
where
    P: PaymentRepository + 'static,
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    X: PaymentProcessor + 'static,
{
    match service.process_payout(&PaymentId(payment_id), &actor, Utc::now()) {
        Ok(payment) => http::ok(payment),
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn history<P, C, L, X>(
    State(service): State<Arc<BillingService<P, C, L, X>>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<PageQuery>,
) -> Response
where
    P: PaymentRepository + 'static,
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    X: PaymentProcessor + 'static,
{
    match service.history(&actor) {
        Ok(payments) => {
            let (items, info) = http::paginate(payments, query);
            http::page(items, info)
        }
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn issue_invoice<I>(
    State(service): State<Arc<InvoiceService<I>>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<IssueInvoiceRequest>,
) -> Response
where
    I: InvoiceRepository + 'static,
{
    match service.issue(request, &actor, Utc::now()) {
        Ok(invoice) => http::created(invoice),
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn list_invoices<I>(
    State(service): State<Arc<InvoiceService<I>>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<PageQuery>,
) -> Response
where
    I: InvoiceRepository + 'static,
{
    match service.for_user(&actor.user_id) {
        Ok(invoices) => {
            let (items, info) = http::paginate(invoices, query);
            http::page(items, info)
        }
        Err(err) => respond_err(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MonthlyInvoiceRequest {
    pub year: i32,
    pub month: u32,
}

pub(crate) async fn monthly_invoice<B, X>(
    State(service): State<Arc<BusinessBillingService<B, X>>>,
    Extension(actor): Extension<Actor>,
    Path(business_id): Path<String>,
    Json(request): Json<MonthlyInvoiceRequest>,
) -> Response
where
    B: BusinessRepository + 'static,
    X: PaymentProcessor + 'static,
{
    match service.create_monthly_invoice(
        &BusinessId(business_id),
        request.year,
        request.month,
        &actor,
    ) {
        Ok(invoice) => http::created(invoice),
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn billing_history<B, X>(
    State(service): State<Arc<BusinessBillingService<B, X>>>,
    Extension(actor): Extension<Actor>,
    Path(business_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response
where
    B: BusinessRepository + 'static,
    X: PaymentProcessor + 'static,
{
    match service.billing_history(&BusinessId(business_id), &actor) {
        Ok(invoices) => {
            let (items, info) = http::paginate(invoices, query);
            http::page(items, info)
        }
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn checkout<B, X>(
    State(service): State<Arc<BusinessBillingService<B, X>>>,
    Extension(actor): Extension<Actor>,
    Path(business_id): Path<String>,
) -> Response
where
    B: BusinessRepository + 'static,
    X: PaymentProcessor + 'static,
{
    match service.checkout(&BusinessId(business_id), &actor) {
        Ok(url) => http::ok(json!({ "session_url": url })),
        Err(err) => respond_err(err),
    }
}

/// Webhook deliveries carry no bearer token; the processor signs them at the
/// transport layer, which is verified before this handler runs.
pub(crate) async fn webhook<B, X>(
    State(service): State<Arc<BusinessBillingService<B, X>>>,
    Json(event): Json<ProcessorEvent>,
) -> Response
where
    B: BusinessRepository + 'static,
    X: PaymentProcessor + 'static,
{
    match service.reconcile(&event) {
        Ok(outcome) => http::ok(json!({
            "received": true,
            "applied": outcome == super::business::ReconcileOutcome::Applied,
        })),
        Err(err) => respond_err(err),
    }
}
