//! Sales quotation parcel endpoints:
//!
//! - `GET    /api/v1/sales-quotation-parcels/{parcel_id}`  single parcel
//! - `PUT    /api/v1/sales-quotation-parcels/{parcel_id}`  partial update, coordinators only
//! - `DELETE /api/v1/sales-quotation-parcels/{parcel_id}`  soft delete, coordinators only

pub mod service;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;

use tradeflow_core::approvals::validation::parse_id;
use tradeflow_core::errors::{ApplicationError, DomainError};

use crate::approvals::service::ServiceReply;
use crate::auth::CurrentPrincipal;
use crate::envelope::{failure, respond, Envelope};
use service::{ParcelService, PARCEL_ID};

const ID_KEY: &str = "parcelId";

pub fn router(service: ParcelService) -> Router {
    Router::new()
        .route(
            "/api/v1/sales-quotation-parcels/{parcel_id}",
            get(read).put(update).delete(delete),
        )
        .with_state(service)
}

fn reply<T: Serialize>(
    service: &ParcelService,
    status: StatusCode,
    result: Result<ServiceReply<T>, ApplicationError>,
    echo_id: Option<i64>,
) -> Response {
    match result {
        Ok(reply) => {
            let envelope =
                Envelope::ok(reply.message, reply.data).echo(Some(ID_KEY), reply.entity_id.or(echo_id));
            respond(status, envelope)
        }
        Err(error) => failure(error, Some(ID_KEY), echo_id, service.expose_internal_errors()),
    }
}

pub async fn read(State(service): State<ParcelService>, Path(parcel_id): Path<String>) -> Response {
    let parcel_id = match parse_id(PARCEL_ID, &parcel_id) {
        Ok(id) => id,
        Err(error) => return reply::<()>(&service, StatusCode::OK, Err(error.into()), None),
    };
    let result = service.read(parcel_id).await;
    reply(&service, StatusCode::OK, result, Some(parcel_id))
}

pub async fn update(
    State(service): State<ParcelService>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(parcel_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let parcel_id = parse_id(PARCEL_ID, &parcel_id);
    let echo_id = parcel_id.as_ref().ok().copied();
    let body = payload
        .map(|Json(value)| value)
        .map_err(|rejection| DomainError::MalformedBody(rejection.body_text()));
    let result = service.update(principal.as_ref(), parcel_id, body).await;
    reply(&service, StatusCode::OK, result, echo_id)
}

pub async fn delete(
    State(service): State<ParcelService>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(parcel_id): Path<String>,
) -> Response {
    let parcel_id = parse_id(PARCEL_ID, &parcel_id);
    let echo_id = parcel_id.as_ref().ok().copied();
    let result = service.delete(principal.as_ref(), parcel_id).await;
    reply(&service, StatusCode::OK, result, echo_id)
}
