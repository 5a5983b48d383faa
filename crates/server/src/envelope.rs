use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{error, warn};
use uuid::Uuid;

use tradeflow_core::errors::ApplicationError;
use tradeflow_core::pagination::Page;

/// Totals appended to list responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageMeta {
    pub total_records: u64,
    pub total_pages: u32,
    pub current_page: u32,
    pub page_size: u32,
}

impl PageMeta {
    pub fn of<T>(page: &Page<T>) -> Self {
        Self {
            total_records: page.total_records,
            total_pages: page.total_pages,
            current_page: page.current_page,
            page_size: page.page_size,
        }
    }
}

/// Body of every approval response, success or failure.
///
/// `id_key` names the echoed document id (`purchaseRFQId`, `poId`, ...) and is omitted
/// entirely by endpoints that are not scoped to one document kind.
#[derive(Clone, Debug)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub id_key: Option<&'static str>,
    pub id: Option<i64>,
    pub page: Option<PageMeta>,
    pub correlation_id: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            id_key: None,
            id: None,
            page: None,
            correlation_id: None,
        }
    }

    pub fn echo(mut self, id_key: Option<&'static str>, id: Option<i64>) -> Self {
        self.id_key = id_key;
        self.id = id;
        self
    }

    pub fn paged(mut self, page: Option<PageMeta>) -> Self {
        self.page = page;
        self
    }
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("success", &self.success)?;
        map.serialize_entry("message", &self.message)?;
        map.serialize_entry("data", &self.data)?;
        if let Some(key) = self.id_key {
            map.serialize_entry(key, &self.id)?;
        }
        if let Some(page) = &self.page {
            map.serialize_entry("totalRecords", &page.total_records)?;
            map.serialize_entry("totalPages", &page.total_pages)?;
            map.serialize_entry("currentPage", &page.current_page)?;
            map.serialize_entry("pageSize", &page.page_size)?;
        }
        if let Some(correlation_id) = &self.correlation_id {
            map.serialize_entry("correlationId", correlation_id)?;
        }
        map.end()
    }
}

pub fn respond<T: Serialize>(status: StatusCode, envelope: Envelope<T>) -> Response {
    (status, Json(envelope)).into_response()
}

/// Converts an application error into its failure envelope.
///
/// Server-side failures are logged with their raw text; the client sees that text only when
/// `expose_internal` is set.
pub fn failure(
    error: ApplicationError,
    id_key: Option<&'static str>,
    id: Option<i64>,
    expose_internal: bool,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let error = error.into_interface(correlation_id.clone());
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        error!(
            event_name = "http.request.failed",
            correlation_id = %correlation_id,
            status = status.as_u16(),
            error = %error.message(),
            "request failed with an internal error"
        );
    } else {
        warn!(
            event_name = "http.request.rejected",
            correlation_id = %correlation_id,
            status = status.as_u16(),
            reason = %error.message(),
            "request rejected"
        );
    }

    let envelope = Envelope::<()> {
        success: false,
        message: error.client_message(expose_internal),
        data: None,
        id_key,
        id,
        page: None,
        correlation_id: Some(correlation_id),
    };
    respond(status, envelope)
}
