use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryAccountRepository, InMemoryBusinessRepository, InMemoryCaseRepository,
    InMemoryInvoiceRepository, InMemoryLawyerRepository, InMemoryMessageRepository,
    InMemoryPaymentRepository, SandboxProcessor, StaticTokenVerifier,
};
use crate::routes::{authenticate, with_ops_routes};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use ticketlaw::access::Role;
use ticketlaw::config::AppConfig;
use ticketlaw::error::AppError;
use ticketlaw::telemetry;
use ticketlaw::workflows::billing::{
    business_router, invoice_router, payment_router, BillingService, BusinessBillingService,
    InvoiceService,
};
use ticketlaw::workflows::cases::{case_router, CaseService};
use ticketlaw::workflows::messages::{message_router, MessageService};
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let verifier = Arc::new(StaticTokenVerifier::default());
    if let Ok(token) = std::env::var("APP_ADMIN_TOKEN") {
        verifier.grant(&token, "admin-root", Role::Admin);
    }

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        verifier: verifier.clone(),
    };

    let accounts = Arc::new(InMemoryAccountRepository::default());
    let lawyers = Arc::new(InMemoryLawyerRepository::default());
    let cases = Arc::new(InMemoryCaseRepository::default());
    let payments = Arc::new(InMemoryPaymentRepository::default());
    let invoices = Arc::new(InMemoryInvoiceRepository::default());
    let businesses = Arc::new(InMemoryBusinessRepository::default());
    let messages = Arc::new(InMemoryMessageRepository::default());
    let processor = Arc::new(SandboxProcessor::default());

    let case_service = Arc::new(CaseService::new(
        cases.clone(),
        lawyers.clone(),
        accounts.clone(),
    ));
    let billing_service = Arc::new(BillingService::new(
        payments,
        cases.clone(),
        lawyers.clone(),
        processor.clone(),
        config.billing,
    ));
    let invoice_service = Arc::new(InvoiceService::new(invoices));
    let business_service = Arc::new(BusinessBillingService::new(
        businesses,
        processor,
        config.billing,
    ));
    let message_service = Arc::new(MessageService::new(messages, cases, lawyers));

    let api = case_router(case_service)
        .merge(payment_router(billing_service))
        .merge(invoice_router(invoice_service))
        .merge(business_router(business_service))
        .merge(message_router(message_service))
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            authenticate,
        ));

    let app = with_ops_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "marketplace api ready");

    axum::serve(listener, app).await?;
    Ok(())
}
