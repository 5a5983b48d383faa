//! The persistence gateway: one transactional "manage" entry point per approval table,
//! plus read-only probes used to validate references before a mutation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tradeflow_core::domain::approval::{
    ApprovalDecision, ApprovalFilter, ApprovalKey, ApprovalRecord, ApprovalRevocation,
    NewApproval,
};
use tradeflow_core::domain::kind::ApprovalKind;
use tradeflow_core::domain::parcel::{ParcelChange, ParcelRecord, ParcelRevocation};
use tradeflow_core::domain::pending::{PendingApprovalItem, PendingApprovalQuery};
use tradeflow_core::pagination::{PageRequest, SortOrder};

use crate::repositories::RepositoryError;

pub mod memory;
pub mod sql;

pub use memory::{InMemoryGateway, InMemoryGatewayBuilder, InjectedFailure};
pub use sql::SqlGateway;

/// The data layer performed the requested operation.
pub const RESULT_OK: i32 = 1;
/// The data layer declined the operation (duplicate pair, no matching row).
pub const RESULT_REJECTED: i32 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManageAction {
    Select,
    Insert,
    Update,
    Delete,
}

impl ManageAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    pub fn is_mutation(self) -> bool {
        !matches!(self, Self::Select)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    pub page: PageRequest,
    pub sort: SortOrder,
}

/// Positional parameters of a manage call. Unused slots stay `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManageParams {
    pub entity_id: Option<i64>,
    pub approver_id: Option<i64>,
    pub approved_yn: Option<bool>,
    pub approver_date_time: Option<DateTime<Utc>>,
    pub form_name: Option<String>,
    pub role_name: Option<String>,
    pub acting_user_id: Option<i64>,
    pub window: Option<PageWindow>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManageCall {
    pub kind: ApprovalKind,
    pub action: ManageAction,
    pub params: ManageParams,
}

impl ManageCall {
    pub fn select(kind: ApprovalKind, filter: ApprovalFilter) -> Self {
        Self {
            kind,
            action: ManageAction::Select,
            params: ManageParams {
                entity_id: filter.entity_id,
                approver_id: filter.approver_id,
                ..ManageParams::default()
            },
        }
    }

    pub fn select_page(kind: ApprovalKind, filter: ApprovalFilter, window: PageWindow) -> Self {
        let mut call = Self::select(kind, filter);
        call.params.window = Some(window);
        call
    }

    pub fn insert(kind: ApprovalKind, approval: &NewApproval) -> Self {
        Self {
            kind,
            action: ManageAction::Insert,
            params: ManageParams {
                entity_id: Some(approval.key.entity_id),
                approver_id: Some(approval.key.approver_id),
                approved_yn: approval.approved_yn,
                approver_date_time: approval.approver_date_time,
                form_name: approval.form_name.clone(),
                role_name: approval.role_name.clone(),
                acting_user_id: Some(approval.created_by_id),
                window: None,
            },
        }
    }

    pub fn update(kind: ApprovalKind, decision: &ApprovalDecision) -> Self {
        Self {
            kind,
            action: ManageAction::Update,
            params: ManageParams {
                entity_id: Some(decision.key.entity_id),
                approver_id: Some(decision.key.approver_id),
                approved_yn: decision.approved_yn,
                approver_date_time: decision.approver_date_time,
                form_name: decision.form_name.clone(),
                role_name: decision.role_name.clone(),
                acting_user_id: Some(decision.updated_by_id),
                window: None,
            },
        }
    }

    pub fn delete(kind: ApprovalKind, revocation: &ApprovalRevocation) -> Self {
        Self {
            kind,
            action: ManageAction::Delete,
            params: ManageParams {
                entity_id: Some(revocation.key.entity_id),
                approver_id: Some(revocation.key.approver_id),
                acting_user_id: Some(revocation.deleted_by_id),
                ..ManageParams::default()
            },
        }
    }

    pub fn filter(&self) -> ApprovalFilter {
        ApprovalFilter { entity_id: self.params.entity_id, approver_id: self.params.approver_id }
    }

    /// Both halves of the composite key, required by every mutating action.
    pub fn key(&self) -> Result<ApprovalKey, RepositoryError> {
        match (self.params.entity_id, self.params.approver_id) {
            (Some(entity_id), Some(approver_id)) => Ok(ApprovalKey::new(entity_id, approver_id)),
            _ => Err(RepositoryError::MalformedReply(format!(
                "{} on {} requires both {} and ApproverID",
                self.action.as_str(),
                self.kind.approval_table(),
                self.kind.entity_field()
            ))),
        }
    }

    pub fn acting_user_id(&self) -> Result<i64, RepositoryError> {
        self.params.acting_user_id.ok_or_else(|| {
            RepositoryError::MalformedReply(format!(
                "{} on {} requires an acting user",
                self.action.as_str(),
                self.kind.approval_table()
            ))
        })
    }
}

/// Raw answer of a manage call: result code, message and optional record set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayReply {
    pub result_code: i32,
    pub message: String,
    pub records: Vec<ApprovalRecord>,
    /// Size of the unwindowed result set, reported for paginated selects.
    pub total_records: Option<u64>,
}

impl GatewayReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { result_code: RESULT_OK, message: message.into(), records: Vec::new(), total_records: None }
    }

    pub fn rows(records: Vec<ApprovalRecord>, total_records: Option<u64>) -> Self {
        let message = format!("{} record(s) found", records.len());
        Self { result_code: RESULT_OK, message, records, total_records }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            result_code: RESULT_REJECTED,
            message: message.into(),
            records: Vec::new(),
            total_records: None,
        }
    }

    /// Maps the result code onto a success flag; any code outside the convention is an error.
    pub fn succeeded(&self) -> Result<bool, RepositoryError> {
        match self.result_code {
            RESULT_OK => Ok(true),
            RESULT_REJECTED => Ok(false),
            other => Err(RepositoryError::MalformedReply(format!(
                "unexpected result code {other}: {}",
                self.message
            ))),
        }
    }
}

/// Read-only existence probes run before a mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceCheck {
    Document { kind: ApprovalKind, id: i64 },
    Person(i64),
    Form(String),
    Role(String),
    Approval { kind: ApprovalKind, key: ApprovalKey },
    ApproverRole { approver_id: i64, form_name: String, role_name: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingPage {
    pub items: Vec<PendingApprovalItem>,
    pub total_records: u64,
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn manage(&self, call: ManageCall) -> Result<GatewayReply, RepositoryError>;

    async fn reference_exists(&self, check: &ReferenceCheck) -> Result<bool, RepositoryError>;

    async fn pending_approvals(
        &self,
        query: &PendingApprovalQuery,
    ) -> Result<PendingPage, RepositoryError>;

    /// The active parcel with this id, if any.
    async fn parcel(&self, parcel_id: i64) -> Result<Option<ParcelRecord>, RepositoryError>;

    async fn update_parcel(&self, change: &ParcelChange) -> Result<GatewayReply, RepositoryError>;

    async fn delete_parcel(
        &self,
        revocation: &ParcelRevocation,
    ) -> Result<GatewayReply, RepositoryError>;
}

pub(crate) fn missing_parcel_message(parcel_id: i64) -> String {
    format!("No active sales quotation parcel exists for ParcelID {parcel_id}")
}

/// Time stored with a decision. Pending rows carry no time; a decision without an explicit
/// time is stamped `now`.
pub(crate) fn decision_time(
    approved_yn: Option<bool>,
    supplied: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    approved_yn.map(|_| supplied.unwrap_or(now))
}

/// Pending items in display order: newest assignment first, then form name, then newest
/// document.
pub(crate) fn pending_order(
    left: &PendingApprovalItem,
    right: &PendingApprovalItem,
) -> std::cmp::Ordering {
    right
        .assigned_date_time
        .cmp(&left.assigned_date_time)
        .then_with(|| left.form_name.cmp(&right.form_name))
        .then_with(|| right.entity_id.cmp(&left.entity_id))
}
