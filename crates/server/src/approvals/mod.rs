//! Approval endpoints, one route family per document kind:
//!
//! - `GET    /api/v1/{slug}`                            list, windowed when paging params are given
//! - `GET    /api/v1/{slug}/{entity_id}/{approver_id}`  single record
//! - `POST   /api/v1/{slug}`                            create
//! - `PUT    /api/v1/{slug}[/{entity_id}/{approver_id}]` record a decision
//! - `DELETE /api/v1/{slug}[/{entity_id}/{approver_id}]` soft delete

pub mod dto;
pub mod service;

use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;

use tradeflow_core::domain::approval::ApprovalKey;
use tradeflow_core::domain::kind::ApprovalKind;
use tradeflow_core::errors::{ApplicationError, DomainError};

use crate::app::AppState;
use crate::auth::CurrentPrincipal;
use crate::envelope::{failure, respond, Envelope};
use service::{ApprovalService, Body, ServiceReply};

pub fn router(state: &AppState) -> Router {
    ApprovalKind::ALL.into_iter().fold(Router::new(), |router, kind| {
        router.merge(kind_router(kind, state.approval_service(kind)))
    })
}

fn kind_router(kind: ApprovalKind, service: ApprovalService) -> Router {
    let collection = format!("/api/v1/{}", kind.route_slug());
    let member = format!("{collection}/{{entity_id}}/{{approver_id}}");

    Router::new()
        .route(&collection, get(list).post(create).put(update).delete(delete))
        .route(&member, get(read).put(update_by_path).delete(delete_by_path))
        .with_state(service)
}

fn body(payload: Result<Json<Value>, JsonRejection>) -> Body {
    payload.map(|Json(value)| value).map_err(|rejection| DomainError::MalformedBody(rejection.body_text()))
}

fn reply<T: Serialize>(
    service: &ApprovalService,
    status: StatusCode,
    result: Result<ServiceReply<T>, ApplicationError>,
    echo_id: Option<i64>,
) -> Response {
    let id_key = Some(service.kind().envelope_id_key());
    match result {
        Ok(reply) => {
            let envelope = Envelope::ok(reply.message, reply.data)
                .echo(id_key, reply.entity_id.or(echo_id))
                .paged(reply.page);
            respond(status, envelope)
        }
        Err(error) => failure(error, id_key, echo_id, service.expose_internal_errors()),
    }
}

pub async fn list(
    State(service): State<ApprovalService>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let result = service.list(&params).await;
    reply(&service, StatusCode::OK, result, None)
}

pub async fn read(
    State(service): State<ApprovalService>,
    Path((entity_id, approver_id)): Path<(String, String)>,
) -> Response {
    let key = match dto::path_key(service.kind(), &entity_id, &approver_id) {
        Ok(key) => key,
        Err(error) => return reply::<()>(&service, StatusCode::OK, Err(error.into()), None),
    };
    let result = service.read(key).await;
    reply(&service, StatusCode::OK, result, Some(key.entity_id))
}

pub async fn create(
    State(service): State<ApprovalService>,
    CurrentPrincipal(principal): CurrentPrincipal,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let result = service.create(principal.as_ref(), body(payload)).await;
    reply(&service, StatusCode::CREATED, result, None)
}

pub async fn update(
    State(service): State<ApprovalService>,
    CurrentPrincipal(principal): CurrentPrincipal,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let result = service.update(principal.as_ref(), None, body(payload)).await;
    reply(&service, StatusCode::OK, result, None)
}

pub async fn update_by_path(
    State(service): State<ApprovalService>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((entity_id, approver_id)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let path = dto::path_key(service.kind(), &entity_id, &approver_id);
    let echo_id = path.as_ref().ok().map(|key: &ApprovalKey| key.entity_id);
    let result = match path {
        Ok(key) => service.update(principal.as_ref(), Some(key), body(payload)).await,
        // Identity problems still rank below authentication and policy.
        Err(error) => service.update(principal.as_ref(), None, Err(error)).await,
    };
    reply(&service, StatusCode::OK, result, echo_id)
}

pub async fn delete(
    State(service): State<ApprovalService>,
    CurrentPrincipal(principal): CurrentPrincipal,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let result = service.delete(principal.as_ref(), None, body(payload)).await;
    reply(&service, StatusCode::OK, result, None)
}

pub async fn delete_by_path(
    State(service): State<ApprovalService>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((entity_id, approver_id)): Path<(String, String)>,
) -> Response {
    let path = dto::path_key(service.kind(), &entity_id, &approver_id);
    let echo_id = path.as_ref().ok().map(|key: &ApprovalKey| key.entity_id);
    let result = match path {
        Ok(key) => service.delete(principal.as_ref(), Some(key), Ok(Value::Null)).await,
        Err(error) => service.delete(principal.as_ref(), None, Err(error)).await,
    };
    reply(&service, StatusCode::OK, result, echo_id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        extract::{Path, State},
        http::StatusCode,
        response::Response,
        Json,
    };
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    use tradeflow_core::config::ApprovalsConfig;
    use tradeflow_core::domain::kind::ApprovalKind;
    use tradeflow_core::domain::principal::Principal;
    use tradeflow_db::{ApprovalRepository, InMemoryGateway};

    use super::{create, delete_by_path, read, update_by_path, ApprovalService};
    use crate::auth::CurrentPrincipal;

    fn service(gateway: &Arc<InMemoryGateway>, kind: ApprovalKind) -> State<ApprovalService> {
        let settings =
            ApprovalsConfig { default_page_size: 10, max_page_size: 100, expose_internal_errors: false };
        State(ApprovalService::new(ApprovalRepository::new(kind, gateway.clone()), settings))
    }

    fn gateway() -> Arc<InMemoryGateway> {
        let created = Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap();
        Arc::new(
            InMemoryGateway::builder()
                .person(1, Some("Administrator"))
                .person(3, Some("Warehouse Staff"))
                .person(7, Some("Sales Manager"))
                .form("Sales RFQ")
                .role("Sales Manager")
                .form_role("Sales RFQ", "Sales Manager")
                .document(ApprovalKind::PurchaseRfq, 10, "PRFQ-0010", created)
                .document(ApprovalKind::SalesRfq, 11, "SRFQ-0011", created)
                .document(ApprovalKind::SalesOrder, 5, "SO-0005", created)
                .build(),
        )
    }

    fn signed_in(person_id: i64, role: &str) -> CurrentPrincipal {
        CurrentPrincipal(Some(Principal::new(person_id, role)))
    }

    async fn body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn purchase_rfq_for_a_missing_document_is_a_400_envelope() {
        let gateway = gateway();
        let response = create(
            service(&gateway, ApprovalKind::PurchaseRfq),
            signed_in(1, "Administrator"),
            Ok(Json(json!({"PurchaseRFQID": 42, "ApproverID": 7}))),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = body(response).await;
        assert_eq!(payload["success"], false);
        assert_eq!(payload["message"], "PurchaseRFQID 42 does not exist or is deleted");
        assert_eq!(payload["data"], Value::Null);
        assert!(payload.as_object().expect("object").contains_key("purchaseRFQId"));
        assert_eq!(gateway.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn create_returns_201_and_echoes_the_document_id() {
        let gateway = gateway();
        let response = create(
            service(&gateway, ApprovalKind::PurchaseRfq),
            signed_in(1, "Administrator"),
            Ok(Json(json!({"PurchaseRFQID": 10, "ApproverID": 7}))),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let payload = body(response).await;
        assert_eq!(payload["success"], true);
        assert_eq!(payload["purchaseRFQId"], 10);
    }

    #[tokio::test]
    async fn anonymous_and_wrong_role_callers_get_401_and_403() {
        let gateway = gateway();

        let anonymous = create(
            service(&gateway, ApprovalKind::PurchaseRfq),
            CurrentPrincipal(None),
            Ok(Json(json!({"PurchaseRFQID": 10, "ApproverID": 7}))),
        )
        .await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let warehouse = create(
            service(&gateway, ApprovalKind::PurchaseRfq),
            signed_in(3, "Warehouse Staff"),
            Ok(Json(json!({"PurchaseRFQID": 10, "ApproverID": 7}))),
        )
        .await;
        assert_eq!(warehouse.status(), StatusCode::FORBIDDEN);
        assert_eq!(body(warehouse).await["success"], false);
        assert_eq!(gateway.manage_calls() + gateway.probe_calls(), 0);
    }

    #[tokio::test]
    async fn scoped_kind_checks_the_approvers_form_role() {
        let gateway = gateway();
        let created = create(
            service(&gateway, ApprovalKind::SalesRfq),
            signed_in(1, "Administrator"),
            Ok(Json(json!({
                "salesRFQId": 11,
                "approverId": 3,
                "formName": "Sales RFQ",
                "roleName": "Sales Manager"
            }))),
        )
        .await;

        assert_eq!(created.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body(created).await["message"],
            "ApproverID 3 does not hold role 'Sales Manager' for form 'Sales RFQ'"
        );
    }

    #[tokio::test]
    async fn read_maps_absent_rows_to_404_and_bad_ids_to_400() {
        let gateway = gateway();

        let missing = read(
            service(&gateway, ApprovalKind::SalesOrder),
            Path(("5".to_string(), "7".to_string())),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(missing).await["salesOrderId"], 5);

        let malformed = read(
            service(&gateway, ApprovalKind::SalesOrder),
            Path(("five".to_string(), "7".to_string())),
        )
        .await;
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(malformed).await["message"], "SalesOrderID must be a positive numeric id");
    }

    #[tokio::test]
    async fn decision_and_delete_by_path_round_trip() {
        let gateway = gateway();
        let created = create(
            service(&gateway, ApprovalKind::SalesOrder),
            signed_in(7, "Sales Manager"),
            Ok(Json(json!({"SalesOrderID": 5}))),
        )
        .await;
        assert_eq!(created.status(), StatusCode::CREATED);

        let decided = update_by_path(
            service(&gateway, ApprovalKind::SalesOrder),
            signed_in(7, "Sales Manager"),
            Path(("5".to_string(), "7".to_string())),
            Ok(Json(json!({"approvedYN": false}))),
        )
        .await;
        assert_eq!(decided.status(), StatusCode::OK);

        let fetched = read(
            service(&gateway, ApprovalKind::SalesOrder),
            Path(("5".to_string(), "7".to_string())),
        )
        .await;
        assert_eq!(body(fetched).await["data"]["approvedYN"], false);

        let deleted = delete_by_path(
            service(&gateway, ApprovalKind::SalesOrder),
            signed_in(1, "Administrator"),
            Path(("5".to_string(), "7".to_string())),
        )
        .await;
        assert_eq!(deleted.status(), StatusCode::OK);

        let gone = read(
            service(&gateway, ApprovalKind::SalesOrder),
            Path(("5".to_string(), "7".to_string())),
        )
        .await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }
}
