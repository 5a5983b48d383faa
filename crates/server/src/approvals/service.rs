use std::collections::HashMap;

use serde_json::Value;

use tradeflow_core::approvals::policy::{ApprovalAction, PolicyTarget};
use tradeflow_core::config::ApprovalsConfig;
use tradeflow_core::domain::approval::{ApprovalKey, ApprovalRecord, ApprovalRevocation};
use tradeflow_core::domain::kind::ApprovalKind;
use tradeflow_core::domain::principal::Principal;
use tradeflow_core::errors::{ApplicationError, DomainError};
use tradeflow_db::{ApprovalRepository, RepositoryError, RepositoryOutcome};

use super::dto::{
    parse_body, CreateApprovalRequest, DeleteApprovalRequest, ListQuery, UpdateApprovalRequest,
};
use crate::envelope::PageMeta;

/// A request body as the handler received it; a body that failed to parse is carried
/// along so it is reported only after the caller passed authentication and policy.
pub type Body = Result<Value, DomainError>;

/// Successful answer of a service call, ready to be wrapped in an envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceReply<T> {
    pub message: String,
    pub data: Option<T>,
    pub entity_id: Option<i64>,
    pub page: Option<PageMeta>,
}

impl<T> ServiceReply<T> {
    fn new(message: String, data: Option<T>, entity_id: Option<i64>) -> Self {
        Self { message, data, entity_id, page: None }
    }
}

/// Authorization, request shaping and outcome mapping for one approval kind.
///
/// Every mutating call checks, in order: an authenticated caller, the kind's role policy,
/// the request shape, and only then the repository.
#[derive(Clone)]
pub struct ApprovalService {
    repository: ApprovalRepository,
    settings: ApprovalsConfig,
}

impl ApprovalService {
    pub fn new(repository: ApprovalRepository, settings: ApprovalsConfig) -> Self {
        Self { repository, settings }
    }

    pub fn kind(&self) -> ApprovalKind {
        self.repository.kind()
    }

    pub fn expose_internal_errors(&self) -> bool {
        self.settings.expose_internal_errors
    }

    fn authorize(
        &self,
        principal: Option<&Principal>,
        action: ApprovalAction,
    ) -> Result<Principal, ApplicationError> {
        let kind = self.kind();
        kind.policy()
            .authorize(principal, action, PolicyTarget::Approvals(kind))
            .cloned()
            .map_err(ApplicationError::from)
    }

    pub async fn create(
        &self,
        principal: Option<&Principal>,
        body: Body,
    ) -> Result<ServiceReply<()>, ApplicationError> {
        let acting = self.authorize(principal, ApprovalAction::Create)?;
        let request: CreateApprovalRequest = parse_body(self.kind(), body?)?;
        let approval = request.into_new_approval(self.kind(), &acting)?;
        let entity_id = approval.key.entity_id;

        let outcome = self.repository.create(approval).await.map_err(persistence)?;
        mutation_reply(outcome, entity_id)
    }

    pub async fn read(&self, key: ApprovalKey) -> Result<ServiceReply<ApprovalRecord>, ApplicationError> {
        let outcome = self.repository.read(key).await.map_err(persistence)?;
        if !outcome.success {
            return Err(ApplicationError::Rejected(outcome.message));
        }
        match outcome.data {
            Some(record) => Ok(ServiceReply::new(outcome.message, Some(record), Some(key.entity_id))),
            None => Err(ApplicationError::NotFound(outcome.message)),
        }
    }

    pub async fn list(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<ServiceReply<Vec<ApprovalRecord>>, ApplicationError> {
        let query = ListQuery::parse(
            self.kind(),
            params,
            self.settings.default_page_size,
            self.settings.max_page_size,
        )?;

        match query.page {
            None => {
                let outcome = self.repository.read_all(query.filter).await.map_err(persistence)?;
                if !outcome.success {
                    return Err(ApplicationError::Rejected(outcome.message));
                }
                Ok(ServiceReply::new(
                    outcome.message,
                    Some(outcome.data.unwrap_or_default()),
                    query.filter.entity_id,
                ))
            }
            Some((page, sort)) => {
                let outcome = self
                    .repository
                    .read_paginated(query.filter, page, sort)
                    .await
                    .map_err(persistence)?;
                if !outcome.success {
                    return Err(ApplicationError::Rejected(outcome.message));
                }
                let Some(page) = outcome.data else {
                    return Err(ApplicationError::Persistence(
                        "paginated read succeeded without a page".to_string(),
                    ));
                };
                let meta = PageMeta::of(&page);
                Ok(ServiceReply {
                    message: outcome.message,
                    data: Some(page.items),
                    entity_id: query.filter.entity_id,
                    page: Some(meta),
                })
            }
        }
    }

    /// `path` carries the identity when the route names it; otherwise it comes from the body.
    pub async fn update(
        &self,
        principal: Option<&Principal>,
        path: Option<ApprovalKey>,
        body: Body,
    ) -> Result<ServiceReply<()>, ApplicationError> {
        let acting = self.authorize(principal, ApprovalAction::Update)?;
        let request: UpdateApprovalRequest = parse_body(self.kind(), body?)?;
        let decision = request.into_decision(self.kind(), path, &acting)?;
        let entity_id = decision.key.entity_id;

        let outcome = self.repository.update(decision).await.map_err(persistence)?;
        mutation_reply(outcome, entity_id)
    }

    pub async fn delete(
        &self,
        principal: Option<&Principal>,
        path: Option<ApprovalKey>,
        body: Body,
    ) -> Result<ServiceReply<()>, ApplicationError> {
        let acting = self.authorize(principal, ApprovalAction::Delete)?;
        let revocation = match path {
            Some(key) => ApprovalRevocation { key, deleted_by_id: acting.person_id },
            None => {
                let request: DeleteApprovalRequest = parse_body(self.kind(), body?)?;
                request.into_revocation(self.kind(), &acting)?
            }
        };
        let entity_id = revocation.key.entity_id;

        let outcome = self.repository.delete(revocation).await.map_err(persistence)?;
        mutation_reply(outcome, entity_id)
    }
}

fn mutation_reply(
    outcome: RepositoryOutcome<()>,
    entity_id: i64,
) -> Result<ServiceReply<()>, ApplicationError> {
    if outcome.success {
        Ok(ServiceReply::new(outcome.message, None, Some(entity_id)))
    } else {
        Err(ApplicationError::Rejected(outcome.message))
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}
