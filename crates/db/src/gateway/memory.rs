use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, RwLockWriteGuard};

use tradeflow_core::domain::approval::{ApprovalKey, ApprovalRecord};
use tradeflow_core::domain::kind::ApprovalKind;
use tradeflow_core::domain::parcel::{ParcelChange, ParcelRecord, ParcelRevocation};
use tradeflow_core::domain::pending::{PendingApprovalItem, PendingApprovalQuery};
use tradeflow_core::pagination::{Page, SortColumn, SortDirection, SortOrder};

use super::{
    decision_time, missing_parcel_message, pending_order, GatewayReply, ManageAction, ManageCall,
    PendingPage, PersistenceGateway, ReferenceCheck,
};
use crate::repositories::RepositoryError;

/// Failure modes a test can force on the next and all later calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Every call fails as if the pool could not hand out a connection.
    Unavailable,
    /// Manage calls answer with this result code.
    ResultCode(i32),
}

#[derive(Clone, Debug)]
struct MemoryPerson {
    role: Option<String>,
    deleted: bool,
}

#[derive(Clone, Debug)]
struct MemoryDocument {
    series: String,
    created_date_time: DateTime<Utc>,
    deleted: bool,
}

#[derive(Clone, Debug)]
struct StoredApproval {
    kind: ApprovalKind,
    record: ApprovalRecord,
    /// Deleting person and time; set once the row is soft-deleted.
    deletion: Option<(i64, DateTime<Utc>)>,
}

impl StoredApproval {
    fn is_live(&self) -> bool {
        self.deletion.is_none()
    }
}

#[derive(Clone, Debug)]
struct StoredParcel {
    record: ParcelRecord,
    deletion: Option<(i64, DateTime<Utc>)>,
}

#[derive(Debug, Default)]
struct MemoryState {
    persons: HashMap<i64, MemoryPerson>,
    roles: HashSet<String>,
    forms: HashSet<String>,
    form_roles: HashSet<(String, String)>,
    documents: HashMap<(ApprovalKind, i64), MemoryDocument>,
    approvals: Vec<StoredApproval>,
    parcels: HashMap<i64, StoredParcel>,
    failure: Option<InjectedFailure>,
}

impl MemoryState {
    fn active(&self, kind: ApprovalKind) -> impl Iterator<Item = &StoredApproval> {
        self.approvals.iter().filter(move |stored| stored.kind == kind && stored.is_live())
    }

    fn active_mut(&mut self, kind: ApprovalKind, key: ApprovalKey) -> Option<&mut StoredApproval> {
        self.approvals
            .iter_mut()
            .find(|stored| stored.kind == kind && stored.is_live() && stored.record.key() == key)
    }

    fn parcel_active_mut(&mut self, parcel_id: i64) -> Option<&mut StoredParcel> {
        self.parcels.get_mut(&parcel_id).filter(|stored| stored.deletion.is_none())
    }

    fn person_active(&self, person_id: i64) -> bool {
        self.persons.get(&person_id).is_some_and(|person| !person.deleted)
    }
}

fn name_key(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}

/// Gateway over in-process maps with the same semantics as [`super::SqlGateway`].
///
/// Every call is counted so tests can assert that rejected requests never reached a
/// mutating call.
#[derive(Default)]
pub struct InMemoryGateway {
    state: RwLock<MemoryState>,
    manage_calls: AtomicUsize,
    mutation_calls: AtomicUsize,
    probe_calls: AtomicUsize,
}

impl InMemoryGateway {
    pub fn builder() -> InMemoryGatewayBuilder {
        InMemoryGatewayBuilder::default()
    }

    pub fn manage_calls(&self) -> usize {
        self.manage_calls.load(Ordering::SeqCst)
    }

    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub async fn inject_failure(&self, failure: InjectedFailure) {
        self.state.write().await.failure = Some(failure);
    }

    pub async fn clear_failure(&self) {
        self.state.write().await.failure = None;
    }

    /// Who soft-deleted the row for `key`, and when.
    pub async fn deletion(
        &self,
        kind: ApprovalKind,
        key: ApprovalKey,
    ) -> Option<(i64, DateTime<Utc>)> {
        self.state
            .read()
            .await
            .approvals
            .iter()
            .filter(|stored| stored.kind == kind && !stored.is_live() && stored.record.key() == key)
            .find_map(|stored| stored.deletion)
    }

    /// Who soft-deleted the parcel, and when.
    pub async fn parcel_deletion(&self, parcel_id: i64) -> Option<(i64, DateTime<Utc>)> {
        self.state.read().await.parcels.get(&parcel_id).and_then(|stored| stored.deletion)
    }

    /// Counts a mutating call and hands back the state, or the injected failure.
    async fn mutate(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, RepositoryError> {
        self.manage_calls.fetch_add(1, Ordering::SeqCst);
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.write().await;
        Self::check_available(&state)?;
        Ok(state)
    }

    fn with_injected_code(state: &MemoryState, mut reply: GatewayReply) -> GatewayReply {
        if let Some(InjectedFailure::ResultCode(code)) = state.failure {
            reply.result_code = code;
        }
        reply
    }

    fn check_available(state: &MemoryState) -> Result<(), RepositoryError> {
        match state.failure {
            Some(InjectedFailure::Unavailable) => {
                Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
            }
            _ => Ok(()),
        }
    }

    fn select(state: &MemoryState, call: &ManageCall) -> GatewayReply {
        let filter = call.filter();
        let mut records: Vec<ApprovalRecord> = state
            .active(call.kind)
            .filter(|stored| filter.matches(&stored.record.key()))
            .map(|stored| stored.record.clone())
            .collect();

        let sort = call.params.window.map(|window| window.sort).unwrap_or_default();
        sort_records(&mut records, sort);

        match call.params.window {
            Some(window) => {
                let page = Page::from_ordered(records, window.page);
                GatewayReply::rows(page.items, Some(page.total_records))
            }
            None => {
                let total = records.len() as u64;
                GatewayReply::rows(records, Some(total))
            }
        }
    }

    fn insert(state: &mut MemoryState, call: &ManageCall) -> Result<GatewayReply, RepositoryError> {
        let kind = call.kind;
        let key = call.key()?;
        let created_by_id = call.acting_user_id()?;
        let now = Utc::now();

        if state.active_mut(kind, key).is_some() {
            return Ok(GatewayReply::rejected(format!(
                "Approval already exists for {} {} and ApproverID {}",
                kind.entity_field(),
                key.entity_id,
                key.approver_id
            )));
        }

        state.approvals.push(StoredApproval {
            kind,
            record: ApprovalRecord {
                entity_id: key.entity_id,
                approver_id: key.approver_id,
                approved_yn: call.params.approved_yn,
                approver_date_time: decision_time(
                    call.params.approved_yn,
                    call.params.approver_date_time,
                    now,
                ),
                form_name: call.params.form_name.clone(),
                role_name: call.params.role_name.clone(),
                created_by_id,
                created_date_time: now,
                updated_by_id: None,
                updated_date_time: None,
            },
            deletion: None,
        });

        Ok(GatewayReply::ok(format!("{} approval created successfully", kind.form_name())))
    }

    fn update(state: &mut MemoryState, call: &ManageCall) -> Result<GatewayReply, RepositoryError> {
        let kind = call.kind;
        let key = call.key()?;
        let updated_by_id = call.acting_user_id()?;
        let now = Utc::now();

        let Some(stored) = state.active_mut(kind, key) else {
            return Ok(GatewayReply::rejected(missing_row_message(kind, key)));
        };

        let record = &mut stored.record;
        record.approved_yn = call.params.approved_yn;
        record.approver_date_time =
            decision_time(call.params.approved_yn, call.params.approver_date_time, now);
        if let Some(form_name) = &call.params.form_name {
            record.form_name = Some(form_name.clone());
        }
        if let Some(role_name) = &call.params.role_name {
            record.role_name = Some(role_name.clone());
        }
        record.updated_by_id = Some(updated_by_id);
        record.updated_date_time = Some(now);

        Ok(GatewayReply::ok(format!("{} approval updated successfully", kind.form_name())))
    }

    fn delete(state: &mut MemoryState, call: &ManageCall) -> Result<GatewayReply, RepositoryError> {
        let kind = call.kind;
        let key = call.key()?;
        let deleted_by_id = call.acting_user_id()?;

        let Some(stored) = state.active_mut(kind, key) else {
            return Ok(GatewayReply::rejected(missing_row_message(kind, key)));
        };
        stored.deletion = Some((deleted_by_id, Utc::now()));

        Ok(GatewayReply::ok(format!("{} approval deleted successfully", kind.form_name())))
    }
}

fn missing_row_message(kind: ApprovalKind, key: ApprovalKey) -> String {
    format!(
        "No active approval exists for {} {} and ApproverID {}",
        kind.entity_field(),
        key.entity_id,
        key.approver_id
    )
}

fn sort_records(records: &mut [ApprovalRecord], sort: SortOrder) {
    records.sort_by(|left, right| {
        let primary = match sort.column {
            SortColumn::EntityId => left.entity_id.cmp(&right.entity_id),
            SortColumn::ApproverId => left.approver_id.cmp(&right.approver_id),
            SortColumn::ApprovedYn => left.approved_yn.cmp(&right.approved_yn),
            SortColumn::ApproverDateTime => left.approver_date_time.cmp(&right.approver_date_time),
            SortColumn::CreatedDateTime => left.created_date_time.cmp(&right.created_date_time),
        };
        let primary = match sort.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| left.key().cmp(&right.key()))
    });
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn manage(&self, call: ManageCall) -> Result<GatewayReply, RepositoryError> {
        self.manage_calls.fetch_add(1, Ordering::SeqCst);
        if call.action.is_mutation() {
            self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        }

        let mut state = self.state.write().await;
        Self::check_available(&state)?;

        let reply = match call.action {
            ManageAction::Select => Self::select(&state, &call),
            ManageAction::Insert => Self::insert(&mut state, &call)?,
            ManageAction::Update => Self::update(&mut state, &call)?,
            ManageAction::Delete => Self::delete(&mut state, &call)?,
        };
        Ok(Self::with_injected_code(&state, reply))
    }

    async fn reference_exists(&self, check: &ReferenceCheck) -> Result<bool, RepositoryError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        Self::check_available(&state)?;

        let exists = match check {
            ReferenceCheck::Document { kind, id } => {
                state.documents.get(&(*kind, *id)).is_some_and(|document| !document.deleted)
            }
            ReferenceCheck::Person(person_id) => state.person_active(*person_id),
            ReferenceCheck::Form(form_name) => state.forms.contains(&name_key(form_name)),
            ReferenceCheck::Role(role_name) => state.roles.contains(&name_key(role_name)),
            ReferenceCheck::Approval { kind, key } => {
                state.active(*kind).any(|stored| stored.record.key() == *key)
            }
            ReferenceCheck::ApproverRole { approver_id, form_name, role_name } => {
                let role = name_key(role_name);
                let holds_role = state
                    .persons
                    .get(approver_id)
                    .filter(|person| !person.deleted)
                    .and_then(|person| person.role.as_deref())
                    .is_some_and(|held| name_key(held) == role);
                holds_role && state.form_roles.contains(&(name_key(form_name), role))
            }
        };

        Ok(exists)
    }

    async fn pending_approvals(
        &self,
        query: &PendingApprovalQuery,
    ) -> Result<PendingPage, RepositoryError> {
        let state = self.state.read().await;
        Self::check_available(&state)?;

        let mut items: Vec<PendingApprovalItem> = state
            .approvals
            .iter()
            .filter(|stored| stored.is_live() && stored.record.is_pending())
            .filter(|stored| stored.record.approver_id == query.user_id)
            .filter(|stored| query.matches_form(stored.kind))
            .filter_map(|stored| {
                let document = state
                    .documents
                    .get(&(stored.kind, stored.record.entity_id))
                    .filter(|document| !document.deleted)?;
                query.covers(document.created_date_time.date_naive()).then(|| PendingApprovalItem {
                    kind: stored.kind,
                    form_name: stored.kind.form_name().to_string(),
                    entity_id: stored.record.entity_id,
                    approver_id: stored.record.approver_id,
                    document_series: document.series.clone(),
                    document_created_date_time: document.created_date_time,
                    assigned_date_time: stored.record.created_date_time,
                    approved_yn: stored.record.approved_yn,
                })
            })
            .collect();
        items.sort_by(pending_order);

        let page = Page::from_ordered(items, query.page);
        Ok(PendingPage { items: page.items, total_records: page.total_records })
    }

    async fn parcel(&self, parcel_id: i64) -> Result<Option<ParcelRecord>, RepositoryError> {
        self.manage_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        Self::check_available(&state)?;

        let parcel = state
            .parcels
            .get(&parcel_id)
            .filter(|stored| stored.deletion.is_none())
            .filter(|stored| {
                state
                    .documents
                    .get(&(ApprovalKind::SalesQuotation, stored.record.sales_quotation_id))
                    .is_some_and(|document| !document.deleted)
            })
            .map(|stored| stored.record.clone());
        Ok(parcel)
    }

    async fn update_parcel(&self, change: &ParcelChange) -> Result<GatewayReply, RepositoryError> {
        let mut state = self.mutate().await?;

        let reply = match state.parcel_active_mut(change.parcel_id) {
            Some(stored) => {
                let record = &mut stored.record;
                if let Some(quantity) = change.item_quantity {
                    record.item_quantity = quantity;
                }
                if let Some(weight) = change.gross_weight_grams {
                    record.gross_weight_grams = Some(weight);
                }
                if let Some(notes) = &change.notes {
                    record.notes = Some(notes.clone());
                }
                record.updated_by_id = Some(change.updated_by_id);
                record.updated_date_time = Some(Utc::now());
                GatewayReply::ok("Sales quotation parcel updated successfully")
            }
            None => GatewayReply::rejected(missing_parcel_message(change.parcel_id)),
        };
        Ok(Self::with_injected_code(&state, reply))
    }

    async fn delete_parcel(
        &self,
        revocation: &ParcelRevocation,
    ) -> Result<GatewayReply, RepositoryError> {
        let mut state = self.mutate().await?;

        let reply = match state.parcel_active_mut(revocation.parcel_id) {
            Some(stored) => {
                stored.deletion = Some((revocation.deleted_by_id, Utc::now()));
                GatewayReply::ok("Sales quotation parcel deleted successfully")
            }
            None => GatewayReply::rejected(missing_parcel_message(revocation.parcel_id)),
        };
        Ok(Self::with_injected_code(&state, reply))
    }
}

/// Seeds an [`InMemoryGateway`] with reference data and pre-existing approvals.
#[derive(Debug, Default)]
pub struct InMemoryGatewayBuilder {
    state: MemoryState,
}

impl InMemoryGatewayBuilder {
    pub fn person(mut self, person_id: i64, role: Option<&str>) -> Self {
        self.state
            .persons
            .insert(person_id, MemoryPerson { role: role.map(str::to_string), deleted: false });
        self
    }

    pub fn deleted_person(mut self, person_id: i64) -> Self {
        self.state.persons.insert(person_id, MemoryPerson { role: None, deleted: true });
        self
    }

    pub fn role(mut self, role_name: &str) -> Self {
        self.state.roles.insert(name_key(role_name));
        self
    }

    pub fn form(mut self, form_name: &str) -> Self {
        self.state.forms.insert(name_key(form_name));
        self
    }

    pub fn form_role(mut self, form_name: &str, role_name: &str) -> Self {
        self.state.form_roles.insert((name_key(form_name), name_key(role_name)));
        self
    }

    pub fn document(
        mut self,
        kind: ApprovalKind,
        id: i64,
        series: &str,
        created_date_time: DateTime<Utc>,
    ) -> Self {
        self.state.documents.insert(
            (kind, id),
            MemoryDocument { series: series.to_string(), created_date_time, deleted: false },
        );
        self
    }

    pub fn deleted_document(mut self, kind: ApprovalKind, id: i64, series: &str) -> Self {
        self.state.documents.insert(
            (kind, id),
            MemoryDocument { series: series.to_string(), created_date_time: Utc::now(), deleted: true },
        );
        self
    }

    pub fn approval(mut self, kind: ApprovalKind, record: ApprovalRecord) -> Self {
        self.state.approvals.push(StoredApproval {
            kind,
            record,
            deletion: None,
        });
        self
    }

    pub fn parcel(mut self, record: ParcelRecord) -> Self {
        self.state.parcels.insert(record.parcel_id, StoredParcel { record, deletion: None });
        self
    }

    pub fn build(self) -> InMemoryGateway {
        InMemoryGateway { state: RwLock::new(self.state), ..InMemoryGateway::default() }
    }
}
