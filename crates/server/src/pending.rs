use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use chrono::NaiveDate;

use tradeflow_core::config::ApprovalsConfig;
use tradeflow_core::domain::pending::{PendingApprovalItem, PendingApprovalQuery};
use tradeflow_core::domain::principal::Principal;
use tradeflow_core::errors::{ApplicationError, DomainError};
use tradeflow_core::pagination::{Page, PageRequest};
use tradeflow_db::PendingApprovalsRepository;

use crate::approvals::dto::parse_count;
use crate::auth::CurrentPrincipal;
use crate::envelope::{failure, respond, Envelope, PageMeta};

const PENDING_PARAMS: &[&str] = &["fromDate", "toDate", "pageNumber", "pageSize", "formName"];

#[derive(Clone)]
pub struct PendingState {
    pub repository: PendingApprovalsRepository,
    pub settings: ApprovalsConfig,
}

pub fn router(state: PendingState) -> Router {
    Router::new().route("/api/v1/pending-approvals", get(pending_approvals)).with_state(state)
}

pub async fn pending_approvals(
    State(state): State<PendingState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match load(&state, principal.as_ref(), &params).await {
        Ok(page) => {
            let meta = PageMeta::of(&page);
            let message = format!("{} pending approval(s) retrieved", page.items.len());
            respond(StatusCode::OK, Envelope::ok(message, Some(page.items)).paged(Some(meta)))
        }
        Err(error) => failure(error, None, None, state.settings.expose_internal_errors),
    }
}

async fn load(
    state: &PendingState,
    principal: Option<&Principal>,
    params: &HashMap<String, String>,
) -> Result<Page<PendingApprovalItem>, ApplicationError> {
    // The user is always the caller; a userId parameter is not accepted.
    let principal = principal.ok_or(ApplicationError::Unauthenticated)?;
    let query = parse_query(principal.person_id, params, &state.settings)?;

    state
        .repository
        .get_pending(&query)
        .await
        .map_err(|error| ApplicationError::Persistence(error.to_string()))
}

fn parse_query(
    user_id: i64,
    params: &HashMap<String, String>,
    settings: &ApprovalsConfig,
) -> Result<PendingApprovalQuery, DomainError> {
    if let Some(unknown) = params.keys().find(|key| !PENDING_PARAMS.contains(&key.as_str())) {
        return Err(DomainError::InvalidField {
            field: unknown.clone(),
            expected: format!("one of {}", PENDING_PARAMS.join(", ")),
        });
    }

    let param = |name: &str| params.get(name).map(String::as_str).filter(|v| !v.trim().is_empty());
    let from_date = param("fromDate").map(|raw| parse_date("fromDate", raw)).transpose()?;
    let to_date = param("toDate").map(|raw| parse_date("toDate", raw)).transpose()?;
    let page_number = param("pageNumber").map(|raw| parse_count("pageNumber", raw)).transpose()?;
    let page_size = param("pageSize").map(|raw| parse_count("pageSize", raw)).transpose()?;

    let page = PageRequest::new(
        page_number.unwrap_or(1),
        page_size.unwrap_or(i64::from(settings.default_page_size)),
    )?;
    if page.page_size() > settings.max_page_size {
        return Err(DomainError::InvalidField {
            field: "pageSize".to_string(),
            expected: format!("at most {}", settings.max_page_size),
        });
    }

    PendingApprovalQuery::new(user_id, from_date, to_date, param("formName").map(str::to_string), page)
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| DomainError::InvalidField {
        field: field.to_string(),
        expected: "a date formatted YYYY-MM-DD".to_string(),
    })
}
