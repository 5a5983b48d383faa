use std::sync::Arc;

use tracing::{info, warn};

use tradeflow_core::approvals::validation::{ReferenceValidation, RequiredFields};
use tradeflow_core::domain::approval::{
    ApprovalDecision, ApprovalFilter, ApprovalKey, ApprovalRecord, ApprovalRevocation,
    NewApproval,
};
use tradeflow_core::domain::kind::ApprovalKind;
use tradeflow_core::pagination::{Page, PageRequest, SortOrder};

use super::{RepositoryError, RepositoryOutcome};
use crate::gateway::{GatewayReply, ManageCall, PageWindow, PersistenceGateway, ReferenceCheck};

pub type ApprovalPage = Page<ApprovalRecord>;

/// Typed access to one kind's approval table through the persistence gateway.
#[derive(Clone)]
pub struct ApprovalRepository {
    kind: ApprovalKind,
    gateway: Arc<dyn PersistenceGateway>,
}

/// A probe together with the reason reported when it finds nothing.
struct Probe {
    check: ReferenceCheck,
    reason: String,
}

impl ApprovalRepository {
    pub fn new(kind: ApprovalKind, gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { kind, gateway }
    }

    pub fn kind(&self) -> ApprovalKind {
        self.kind
    }

    pub async fn create(
        &self,
        approval: NewApproval,
    ) -> Result<RepositoryOutcome<()>, RepositoryError> {
        let kind = self.kind;
        if let Err(error) =
            self.scoped_fields(approval.form_name.as_deref(), approval.role_name.as_deref())
        {
            return Ok(RepositoryOutcome::failed(error.to_string()));
        }

        let mut probes = vec![
            self.document_probe(approval.key.entity_id),
            person_probe("ApproverID", approval.key.approver_id),
            person_probe("CreatedByID", approval.created_by_id),
        ];
        probes.extend(self.scope_probes(approval.key.approver_id, &approval.form_name, &approval.role_name));

        let validation = self.validate_references(probes).await?;
        if let Some(message) = validation.message() {
            warn!(
                event_name = "approval.create.rejected",
                kind = kind.as_str(),
                entity_id = approval.key.entity_id,
                approver_id = approval.key.approver_id,
                reason = %message,
                "approval create failed reference validation"
            );
            return Ok(RepositoryOutcome::failed(message));
        }

        let reply = self.gateway.manage(ManageCall::insert(kind, &approval)).await?;
        let outcome = mutation_outcome(reply)?;
        info!(
            event_name = "approval.created",
            kind = kind.as_str(),
            entity_id = approval.key.entity_id,
            approver_id = approval.key.approver_id,
            success = outcome.success,
            "approval create dispatched"
        );
        Ok(outcome)
    }

    pub async fn read(
        &self,
        key: ApprovalKey,
    ) -> Result<RepositoryOutcome<ApprovalRecord>, RepositoryError> {
        let filter = ApprovalFilter { entity_id: Some(key.entity_id), approver_id: Some(key.approver_id) };
        let reply = self.gateway.manage(ManageCall::select(self.kind, filter)).await?;
        if !reply.succeeded()? {
            return Ok(RepositoryOutcome::failed(reply.message));
        }

        let record = reply.records.into_iter().find(|record| record.key() == key);
        let message = match record {
            Some(_) => format!("{} approval retrieved successfully", self.kind.form_name()),
            None => format!(
                "{} approval not found for {} {} and ApproverID {}",
                self.kind.form_name(),
                self.kind.entity_field(),
                key.entity_id,
                key.approver_id
            ),
        };
        Ok(RepositoryOutcome::succeeded(message, record))
    }

    pub async fn read_all(
        &self,
        filter: ApprovalFilter,
    ) -> Result<RepositoryOutcome<Vec<ApprovalRecord>>, RepositoryError> {
        let reply = self.gateway.manage(ManageCall::select(self.kind, filter)).await?;
        if !reply.succeeded()? {
            return Ok(RepositoryOutcome::failed(reply.message));
        }

        let message = format!("{} approval(s) retrieved", reply.records.len());
        Ok(RepositoryOutcome::succeeded(message, Some(reply.records)))
    }

    pub async fn read_paginated(
        &self,
        filter: ApprovalFilter,
        page: PageRequest,
        sort: SortOrder,
    ) -> Result<RepositoryOutcome<ApprovalPage>, RepositoryError> {
        let call = ManageCall::select_page(self.kind, filter, PageWindow { page, sort });
        let reply = self.gateway.manage(call).await?;
        if !reply.succeeded()? {
            return Ok(RepositoryOutcome::failed(reply.message));
        }

        let total_records = reply.total_records.ok_or_else(|| {
            RepositoryError::MalformedReply(format!(
                "paginated select on {} returned no total record count",
                self.kind.approval_table()
            ))
        })?;
        let page = Page::new(reply.records, total_records, page);
        let message = format!("{} approval(s) retrieved", page.items.len());
        Ok(RepositoryOutcome::succeeded(message, Some(page)))
    }

    pub async fn update(
        &self,
        decision: ApprovalDecision,
    ) -> Result<RepositoryOutcome<()>, RepositoryError> {
        let kind = self.kind;
        let required = RequiredFields::new()
            .check("ApprovedYN", decision.approved_yn.is_some())
            .finish()
            .and_then(|()| {
                self.scoped_fields(decision.form_name.as_deref(), decision.role_name.as_deref())
            });
        if let Err(error) = required {
            return Ok(RepositoryOutcome::failed(error.to_string()));
        }

        let mut probes = vec![
            self.approval_probe(decision.key),
            person_probe("UpdatedByID", decision.updated_by_id),
        ];
        probes.extend(self.scope_probes(decision.key.approver_id, &decision.form_name, &decision.role_name));

        let validation = self.validate_references(probes).await?;
        if let Some(message) = validation.message() {
            warn!(
                event_name = "approval.update.rejected",
                kind = kind.as_str(),
                entity_id = decision.key.entity_id,
                approver_id = decision.key.approver_id,
                reason = %message,
                "approval update failed reference validation"
            );
            return Ok(RepositoryOutcome::failed(message));
        }

        let reply = self.gateway.manage(ManageCall::update(kind, &decision)).await?;
        let outcome = mutation_outcome(reply)?;
        info!(
            event_name = "approval.updated",
            kind = kind.as_str(),
            entity_id = decision.key.entity_id,
            approver_id = decision.key.approver_id,
            approved = ?decision.approved_yn,
            success = outcome.success,
            "approval decision dispatched"
        );
        Ok(outcome)
    }

    pub async fn delete(
        &self,
        revocation: ApprovalRevocation,
    ) -> Result<RepositoryOutcome<()>, RepositoryError> {
        let kind = self.kind;
        let probes = vec![
            self.approval_probe(revocation.key),
            person_probe("DeletedByID", revocation.deleted_by_id),
        ];

        let validation = self.validate_references(probes).await?;
        if let Some(message) = validation.message() {
            warn!(
                event_name = "approval.delete.rejected",
                kind = kind.as_str(),
                entity_id = revocation.key.entity_id,
                approver_id = revocation.key.approver_id,
                reason = %message,
                "approval delete failed reference validation"
            );
            return Ok(RepositoryOutcome::failed(message));
        }

        let reply = self.gateway.manage(ManageCall::delete(kind, &revocation)).await?;
        let outcome = mutation_outcome(reply)?;
        info!(
            event_name = "approval.deleted",
            kind = kind.as_str(),
            entity_id = revocation.key.entity_id,
            approver_id = revocation.key.approver_id,
            deleted_by_id = revocation.deleted_by_id,
            success = outcome.success,
            "approval delete dispatched"
        );
        Ok(outcome)
    }

    fn scoped_fields(
        &self,
        form_name: Option<&str>,
        role_name: Option<&str>,
    ) -> Result<(), tradeflow_core::DomainError> {
        if !self.kind.is_form_role_scoped() {
            return Ok(());
        }
        RequiredFields::new().check_text("FormName", form_name).check_text("RoleName", role_name).finish()
    }

    fn document_probe(&self, entity_id: i64) -> Probe {
        Probe {
            check: ReferenceCheck::Document { kind: self.kind, id: entity_id },
            reason: format!("{} {entity_id} does not exist or is deleted", self.kind.entity_field()),
        }
    }

    fn approval_probe(&self, key: ApprovalKey) -> Probe {
        Probe {
            check: ReferenceCheck::Approval { kind: self.kind, key },
            reason: format!(
                "No active approval exists for {} {} and ApproverID {}",
                self.kind.entity_field(),
                key.entity_id,
                key.approver_id
            ),
        }
    }

    fn scope_probes(
        &self,
        approver_id: i64,
        form_name: &Option<String>,
        role_name: &Option<String>,
    ) -> Vec<Probe> {
        if !self.kind.is_form_role_scoped() {
            return Vec::new();
        }
        let (Some(form_name), Some(role_name)) = (form_name, role_name) else {
            return Vec::new();
        };
        let form_name = form_name.trim();
        let role_name = role_name.trim();

        vec![
            Probe {
                check: ReferenceCheck::Form(form_name.to_string()),
                reason: format!("FormName '{form_name}' does not exist or is deleted"),
            },
            Probe {
                check: ReferenceCheck::Role(role_name.to_string()),
                reason: format!("RoleName '{role_name}' does not exist or is deleted"),
            },
            Probe {
                check: ReferenceCheck::ApproverRole {
                    approver_id,
                    form_name: form_name.to_string(),
                    role_name: role_name.to_string(),
                },
                reason: format!(
                    "ApproverID {approver_id} does not hold role '{role_name}' for form '{form_name}'"
                ),
            },
        ]
    }

    /// Runs every probe in order. The approver-role probe is skipped once any earlier probe
    /// failed, since its answer would only repeat those reasons.
    async fn validate_references(
        &self,
        probes: Vec<Probe>,
    ) -> Result<ReferenceValidation, RepositoryError> {
        let mut reasons = Vec::new();
        for probe in probes {
            if matches!(probe.check, ReferenceCheck::ApproverRole { .. }) && !reasons.is_empty() {
                continue;
            }
            if !self.gateway.reference_exists(&probe.check).await? {
                reasons.push(probe.reason);
            }
        }
        Ok(ReferenceValidation::from_reasons(reasons))
    }
}

fn person_probe(field: &str, person_id: i64) -> Probe {
    Probe {
        check: ReferenceCheck::Person(person_id),
        reason: format!("{field} {person_id} does not exist or is deleted"),
    }
}

pub(super) fn mutation_outcome(reply: GatewayReply) -> Result<RepositoryOutcome<()>, RepositoryError> {
    if reply.succeeded()? {
        Ok(RepositoryOutcome::succeeded(reply.message, None))
    } else {
        Ok(RepositoryOutcome::failed(reply.message))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use tradeflow_core::domain::approval::{
        ApprovalDecision, ApprovalFilter, ApprovalKey, ApprovalRecord, ApprovalRevocation,
        NewApproval,
    };
    use tradeflow_core::domain::kind::ApprovalKind;
    use tradeflow_core::pagination::{PageRequest, SortOrder};

    use super::ApprovalRepository;
    use crate::gateway::{InMemoryGateway, InjectedFailure};
    use crate::repositories::RepositoryError;

    fn gateway() -> Arc<InMemoryGateway> {
        let created = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let mut builder = InMemoryGateway::builder()
            .person(1, Some("Administrator"))
            .person(3, Some("Sales Manager"))
            .person(7, Some("Sales Manager"))
            .deleted_person(99)
            .role("Administrator")
            .role("Sales Manager")
            .form("Sales RFQ")
            .form_role("Sales RFQ", "Sales Manager");
        for kind in ApprovalKind::ALL {
            builder = builder.document(kind, 5, "DOC-5", created).document(kind, 6, "DOC-6", created);
        }
        Arc::new(builder.build())
    }

    fn new_approval(entity_id: i64, approver_id: i64) -> NewApproval {
        NewApproval {
            key: ApprovalKey::new(entity_id, approver_id),
            approved_yn: None,
            approver_date_time: None,
            form_name: None,
            role_name: None,
            created_by_id: 1,
        }
    }

    fn decision(entity_id: i64, approver_id: i64, approved: Option<bool>) -> ApprovalDecision {
        ApprovalDecision {
            key: ApprovalKey::new(entity_id, approver_id),
            approved_yn: approved,
            approver_date_time: None,
            form_name: None,
            role_name: None,
            updated_by_id: approver_id,
        }
    }

    #[tokio::test]
    async fn create_with_unknown_document_never_reaches_the_gateway_mutation() {
        for kind in ApprovalKind::ALL {
            let gateway = gateway();
            let repository = ApprovalRepository::new(kind, gateway.clone());
            let mut approval = new_approval(42, 7);
            approval.form_name = Some("Sales RFQ".to_string());
            approval.role_name = Some("Sales Manager".to_string());

            let outcome = repository.create(approval).await.expect("create");

            assert!(!outcome.success, "{kind:?}");
            assert!(
                outcome.message.contains(&format!("{} 42 does not exist or is deleted", kind.entity_field())),
                "{kind:?}: {}",
                outcome.message
            );
            assert_eq!(gateway.manage_calls(), 0, "{kind:?}");
        }
    }

    #[tokio::test]
    async fn purchase_rfq_missing_document_message_is_exact() {
        let gateway = gateway();
        let repository = ApprovalRepository::new(ApprovalKind::PurchaseRfq, gateway.clone());

        let outcome = repository.create(new_approval(42, 7)).await.expect("create");

        assert!(!outcome.success);
        assert_eq!(outcome.message, "PurchaseRFQID 42 does not exist or is deleted");
    }

    #[tokio::test]
    async fn update_and_delete_on_missing_pair_skip_the_mutation() {
        for kind in ApprovalKind::ALL {
            let gateway = gateway();
            let repository = ApprovalRepository::new(kind, gateway.clone());

            let mut update = decision(5, 7, Some(true));
            update.form_name = Some("Sales RFQ".to_string());
            update.role_name = Some("Sales Manager".to_string());
            let updated = repository.update(update).await.expect("update");
            let deleted = repository
                .delete(ApprovalRevocation { key: ApprovalKey::new(5, 7), deleted_by_id: 1 })
                .await
                .expect("delete");

            assert!(!updated.success, "{kind:?}");
            assert!(!deleted.success, "{kind:?}");
            assert!(deleted.message.starts_with("No active approval exists"), "{kind:?}");
            assert_eq!(gateway.mutation_calls(), 0, "{kind:?}");
        }
    }

    #[tokio::test]
    async fn delete_with_unknown_deleter_is_rejected_before_the_gateway() {
        let gateway = gateway();
        let repository = ApprovalRepository::new(ApprovalKind::SalesOrder, gateway.clone());
        repository.create(new_approval(5, 3)).await.expect("create");
        let mutations_before = gateway.mutation_calls();

        let outcome = repository
            .delete(ApprovalRevocation { key: ApprovalKey::new(5, 3), deleted_by_id: 99 })
            .await
            .expect("delete");

        assert!(!outcome.success);
        assert_eq!(outcome.message, "DeletedByID 99 does not exist or is deleted");
        assert_eq!(gateway.mutation_calls(), mutations_before);
    }

    #[tokio::test]
    async fn create_then_read_round_trips_and_reads_are_idempotent() {
        let gateway = gateway();
        let repository = ApprovalRepository::new(ApprovalKind::SalesInvoice, gateway.clone());

        let created = repository.create(new_approval(5, 7)).await.expect("create");
        assert!(created.success, "{}", created.message);

        let first = repository.read(ApprovalKey::new(5, 7)).await.expect("read");
        let second = repository.read(ApprovalKey::new(5, 7)).await.expect("read");
        assert_eq!(first, second);

        let record = first.data.expect("record");
        assert_eq!(record.approved_yn, None);
        assert_eq!(record.created_by_id, 1);

        let missing = repository.read(ApprovalKey::new(6, 7)).await.expect("read missing");
        assert!(missing.success);
        assert!(missing.data.is_none());
    }

    #[tokio::test]
    async fn decisions_may_flip_freely() {
        let gateway = gateway();
        let repository = ApprovalRepository::new(ApprovalKind::PurchaseOrder, gateway.clone());
        repository.create(new_approval(5, 7)).await.expect("create");

        for approved in [true, false, true] {
            let outcome = repository.update(decision(5, 7, Some(approved))).await.expect("update");
            assert!(outcome.success, "{}", outcome.message);
            let record = repository.read(ApprovalKey::new(5, 7)).await.expect("read").data;
            assert_eq!(record.and_then(|record| record.approved_yn), Some(approved));
        }
    }

    #[tokio::test]
    async fn update_requires_an_explicit_decision() {
        let gateway = gateway();
        let repository = ApprovalRepository::new(ApprovalKind::SalesOrder, gateway.clone());

        let outcome = repository.update(decision(5, 7, None)).await.expect("update");

        assert!(!outcome.success);
        assert_eq!(outcome.message, "ApprovedYN are required");
        assert_eq!(gateway.probe_calls(), 0);
    }

    #[tokio::test]
    async fn scoped_kinds_require_form_and_role_and_check_the_binding() {
        let gateway = gateway();
        let repository = ApprovalRepository::new(ApprovalKind::SupplierQuotation, gateway.clone());

        let missing = repository.create(new_approval(5, 7)).await.expect("create");
        assert_eq!(missing.message, "FormName, RoleName are required");

        let mut wrong_role = new_approval(5, 1);
        wrong_role.form_name = Some("Sales RFQ".to_string());
        wrong_role.role_name = Some("Sales Manager".to_string());
        let outcome = repository.create(wrong_role).await.expect("create");
        assert_eq!(
            outcome.message,
            "ApproverID 1 does not hold role 'Sales Manager' for form 'Sales RFQ'"
        );

        let mut unknown_form = new_approval(5, 7);
        unknown_form.form_name = Some("Ghost Form".to_string());
        unknown_form.role_name = Some("Sales Manager".to_string());
        let outcome = repository.create(unknown_form).await.expect("create");
        assert_eq!(outcome.message, "FormName 'Ghost Form' does not exist or is deleted");

        let mut valid = new_approval(5, 7);
        valid.form_name = Some("Sales RFQ".to_string());
        valid.role_name = Some("Sales Manager".to_string());
        let outcome = repository.create(valid).await.expect("create");
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(gateway.mutation_calls(), 1);
    }

    #[tokio::test]
    async fn duplicate_create_is_reported_as_unsuccessful() {
        let gateway = gateway();
        let repository = ApprovalRepository::new(ApprovalKind::SalesOrder, gateway.clone());

        assert!(repository.create(new_approval(5, 7)).await.expect("first").success);
        let second = repository.create(new_approval(5, 7)).await.expect("second");

        assert!(!second.success);
        assert!(second.message.contains("already exists"));
    }

    #[tokio::test]
    async fn pagination_windows_are_disjoint_and_stable() {
        let base = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let mut builder = InMemoryGateway::builder();
        for entity_id in 1..=25 {
            builder = builder.approval(
                ApprovalKind::SalesOrder,
                ApprovalRecord {
                    entity_id,
                    approver_id: 7,
                    approved_yn: None,
                    approver_date_time: None,
                    form_name: None,
                    role_name: None,
                    created_by_id: 1,
                    created_date_time: base + Duration::minutes(entity_id),
                    updated_by_id: None,
                    updated_date_time: None,
                },
            );
        }
        let repository = ApprovalRepository::new(ApprovalKind::SalesOrder, Arc::new(builder.build()));

        let page = |number| {
            let repository = repository.clone();
            async move {
                repository
                    .read_paginated(
                        ApprovalFilter::default(),
                        PageRequest::new(number, 10).expect("page"),
                        SortOrder::default(),
                    )
                    .await
                    .expect("page")
                    .data
                    .expect("data")
            }
        };
        let first = page(1).await;
        let second = page(2).await;

        let ids: Vec<i64> =
            first.items.iter().chain(second.items.iter()).map(|record| record.entity_id).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
        assert_eq!(first.total_records, 25);
        assert_eq!(first.total_pages, 3);
        assert_eq!(second.current_page, 2);
    }

    #[tokio::test]
    async fn read_all_filters_by_supplied_fields() {
        let gateway = gateway();
        let repository = ApprovalRepository::new(ApprovalKind::SalesQuotation, gateway.clone());
        for (entity_id, approver_id) in [(5, 7), (5, 3), (6, 7)] {
            repository.create(new_approval(entity_id, approver_id)).await.expect("create");
        }

        let by_entity = repository
            .read_all(ApprovalFilter { entity_id: Some(5), approver_id: None })
            .await
            .expect("read all")
            .data
            .expect("rows");
        assert_eq!(by_entity.len(), 2);

        let everything =
            repository.read_all(ApprovalFilter::default()).await.expect("read all").data.expect("rows");
        assert_eq!(everything.len(), 3);
    }

    #[tokio::test]
    async fn gateway_failures_are_errors_not_outcomes() {
        let gateway = gateway();
        let repository = ApprovalRepository::new(ApprovalKind::SalesOrder, gateway.clone());

        gateway.inject_failure(InjectedFailure::Unavailable).await;
        let error = repository.create(new_approval(5, 7)).await;
        assert!(matches!(error, Err(RepositoryError::Database(_))));

        gateway.inject_failure(InjectedFailure::ResultCode(2)).await;
        let error = repository.read_all(ApprovalFilter::default()).await;
        assert!(matches!(error, Err(RepositoryError::MalformedReply(_))));
    }
}
