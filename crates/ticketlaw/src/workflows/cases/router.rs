use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use super::domain::{CaseId, LawyerId};
use super::repository::{
    AccountRepository, CaseRepository, LawyerRepository, LawyerSearch,
};
use super::service::{
    CaseService, CaseServiceError, NewAccountRequest, NewCaseRequest, RegisterLawyerRequest,
    UpdateStatusRequest,
};
use crate::access::Actor;
use crate::http::{self, PageQuery};

/// Router exposing case, account, and lawyer endpoints.
///
/// Handlers expect an [`Actor`] extension inserted by the authentication
/// layer after token verification.
pub fn case_router<C, L, A>(service: Arc<CaseService<C, L, A>>) -> Router
where
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    A: AccountRepository + 'static,
{
    Router::new()
        .route("/api/v1/cases", post(submit_case::<C, L, A>).get(list_cases::<C, L, A>))
        .route("/api/v1/cases/lawyer", get(lawyer_docket::<C, L, A>))
        .route("/api/v1/cases/:case_id", get(get_case::<C, L, A>))
        .route("/api/v1/cases/:case_id/status", put(update_status::<C, L, A>))
        .route("/api/v1/cases/:case_id/match", post(rematch::<C, L, A>))
        .route("/api/v1/cases/:case_id/reassign", post(reassign::<C, L, A>))
        .route("/api/v1/cases/:case_id/rating", post(rate_case::<C, L, A>))
        .route("/api/v1/accounts", post(create_account::<C, L, A>))
        .route("/api/v1/lawyers", post(register_lawyer::<C, L, A>))
        .route("/api/v1/lawyers/search", get(search_lawyers::<C, L, A>))
        .route(
            "/api/v1/lawyers/:lawyer_id/approve",
            post(approve_lawyer::<C, L, A>),
        )
        .with_state(service)
}

fn respond_err(err: CaseServiceError) -> Response {
    http::failure(err.kind(), err.to_string())
}

pub(crate) async fn submit_case<C, L, A>(
    State(service): State<Arc<CaseService<C, L, A>>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<NewCaseRequest>,
) -> Response
where
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    A: AccountRepository + 'static,
{
    match service.submit(&actor.user_id, request, Utc::now()) {
        Ok(case) => http::created(case),
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn list_cases<C, L, A>(
    State(service): State<Arc<CaseService<C, L, A>>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<PageQuery>,
) -> Response
where
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    A: AccountRepository + 'static,
{
    match service.cases_for_user(&actor.user_id) {
        Ok(cases) => {
            let summaries: Vec<_> = cases.iter().map(|case| case.summary_view()).collect();
            let (items, info) = http::paginate(summaries, query);
            http::page(items, info)
        }
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn lawyer_docket<C, L, A>(
    State(service): State<Arc<CaseService<C, L, A>>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<PageQuery>,
) -> Response
where
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    A: AccountRepository + 'static,
{
    match service.cases_for_lawyer(&actor) {
        Ok(cases) => {
            let summaries: Vec<_> = cases.iter().map(|case| case.summary_view()).collect();
            let (items, info) = http::paginate(summaries, query);
            http::page(items, info)
        }
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn get_case<C, L, A>(
    State(service): State<Arc<CaseService<C, L, A>>>,
    Extension(actor): Extension<Actor>,
    Path(case_id): Path<String>,
) -> Response
where
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    A: AccountRepository + 'static,
{
    match service.get(&CaseId(case_id), &actor) {
        Ok(case) => http::ok(case),
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn update_status<C, L, A>(
    State(service): State<Arc<CaseService<C, L, A>>>,
    Extension(actor): Extension<Actor>,
    Path(case_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Response
where
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    A: AccountRepository + 'static,
{
    match service.update_status(&CaseId(case_id), request, &actor, Utc::now()) {
        Ok(case) => http::ok(case),
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn rematch<C, L, A>(
    State(service): State<Arc<CaseService<C, L, A>>>,
    Extension(_actor): Extension<Actor>,
    Path(case_id): Path<String>,
) -> Response
where
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    A: AccountRepository + 'static,
{
    match service.rematch(&CaseId(case_id), Utc::now()) {
        Ok(case) => http::ok(case),
        Err(err) => respond_err(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReassignRequest {
    pub lawyer_id: LawyerId,
}

pub(crate) async fn reassign<C, L, A>(
    State(service): State<Arc<CaseService<C, L, A>>>,
    Extension(actor): Extension<Actor>,
    Path(case_id): Path<String>,
    Json(request): Json<ReassignRequest>,
) -> Response
where
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    A: AccountRepository + 'static,
{
    match service.reassign(&CaseId(case_id), &request.lawyer_id, &actor, Utc::now()) {
        Ok(case) => http::ok(case),
        Err(err) => respond_err(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RatingRequest {
    pub rating: u8,
    pub review: Option<String>,
}

pub(crate) async fn rate_case<C, L, A>(
    State(service): State<Arc<CaseService<C, L, A>>>,
    Extension(actor): Extension<Actor>,
    Path(case_id): Path<String>,
    Json(request): Json<RatingRequest>,
) -> Response
where
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    A: AccountRepository + 'static,
{
    match service.rate(
        &CaseId(case_id),
        request.rating,
        request.review,
        &actor,
        Utc::now(),
    ) {
        Ok(case) => http::ok(case),
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn create_account<C, L, A>(
    State(service): State<Arc<CaseService<C, L, A>>>,
    Json(request): Json<NewAccountRequest>,
) -> Response
where
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    A: AccountRepository + 'static,
{
    match service.create_account(request) {
        Ok(account) => http::created(account),
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn register_lawyer<C, L, A>(
    State(service): State<Arc<CaseService<C, L, A>>>,
    Json(request): Json<RegisterLawyerRequest>,
) -> Response
where
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    A: AccountRepository + 'static,
{
    match service.register_lawyer(request) {
        Ok(profile) => http::created(profile),
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn search_lawyers<C, L, A>(
    State(service): State<Arc<CaseService<C, L, A>>>,
    Query(filter): Query<LawyerSearch>,
    Query(query): Query<PageQuery>,
) -> Response
where
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    A: AccountRepository + 'static,
{
    match service.search_lawyers(&filter) {
        Ok(profiles) => {
            let (items, info) = http::paginate(profiles, query);
            http::page(items, info)
        }
        Err(err) => respond_err(err),
    }
}

pub(crate) async fn approve_lawyer<C, L, A>(
    State(service): State<Arc<CaseService<C, L, A>>>,
    Extension(actor): Extension<Actor>,
    Path(lawyer_id): Path<String>,
) -> Response
where
    C: CaseRepository + 'static,
    L: LawyerRepository + 'static,
    A: AccountRepository + 'static,
{
    match service.approve_lawyer(&LawyerId(lawyer_id), &actor) {
        Ok(profile) => http::ok(profile),
        Err(err) => respond_err(err),
    }
}
