use serde::Deserialize;
use serde_json::Value;

use tradeflow_core::approvals::policy::{
    ApprovalAction, PolicyTarget, SALES_QUOTATION_PARCEL_POLICY,
};
use tradeflow_core::config::ApprovalsConfig;
use tradeflow_core::domain::parcel::{ParcelChange, ParcelRecord, ParcelRevocation};
use tradeflow_core::domain::principal::Principal;
use tradeflow_core::errors::{ApplicationError, DomainError};
use tradeflow_db::{RepositoryError, RepositoryOutcome, SalesQuotationParcelRepository};

use crate::approvals::service::{Body, ServiceReply};

pub const PARCEL_ID: &str = "ParcelID";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateParcelRequest {
    pub item_quantity: Option<i64>,
    pub gross_weight_grams: Option<i64>,
    pub notes: Option<String>,
}

/// Parcel reads and the role-restricted parcel changes.
///
/// Changes check, in order: an authenticated caller, the order-coordination roles, the
/// parcel id and body, and only then the repository.
#[derive(Clone)]
pub struct ParcelService {
    repository: SalesQuotationParcelRepository,
    settings: ApprovalsConfig,
}

impl ParcelService {
    pub fn new(repository: SalesQuotationParcelRepository, settings: ApprovalsConfig) -> Self {
        Self { repository, settings }
    }

    pub fn expose_internal_errors(&self) -> bool {
        self.settings.expose_internal_errors
    }

    fn authorize(
        &self,
        principal: Option<&Principal>,
        action: ApprovalAction,
    ) -> Result<Principal, ApplicationError> {
        SALES_QUOTATION_PARCEL_POLICY
            .authorize(principal, action, PolicyTarget::SalesQuotationParcels)
            .cloned()
            .map_err(ApplicationError::from)
    }

    pub async fn read(&self, parcel_id: i64) -> Result<ServiceReply<ParcelRecord>, ApplicationError> {
        let outcome = self.repository.read(parcel_id).await.map_err(persistence)?;
        match outcome.data {
            Some(parcel) => Ok(ServiceReply {
                message: outcome.message,
                data: Some(parcel),
                entity_id: Some(parcel_id),
                page: None,
            }),
            None => Err(ApplicationError::NotFound(outcome.message)),
        }
    }

    pub async fn update(
        &self,
        principal: Option<&Principal>,
        parcel_id: Result<i64, DomainError>,
        body: Body,
    ) -> Result<ServiceReply<()>, ApplicationError> {
        let acting = self.authorize(principal, ApprovalAction::Update)?;
        let parcel_id = parcel_id?;
        let request: UpdateParcelRequest = parse_request(body?)?;
        let change = ParcelChange {
            parcel_id,
            item_quantity: request.item_quantity,
            gross_weight_grams: request.gross_weight_grams,
            notes: request.notes,
            updated_by_id: acting.person_id,
        };

        let outcome = self.repository.update(change).await.map_err(persistence)?;
        mutation_reply(outcome, parcel_id)
    }

    pub async fn delete(
        &self,
        principal: Option<&Principal>,
        parcel_id: Result<i64, DomainError>,
    ) -> Result<ServiceReply<()>, ApplicationError> {
        let acting = self.authorize(principal, ApprovalAction::Delete)?;
        let parcel_id = parcel_id?;
        let revocation = ParcelRevocation { parcel_id, deleted_by_id: acting.person_id };

        let outcome = self.repository.delete(revocation).await.map_err(persistence)?;
        mutation_reply(outcome, parcel_id)
    }
}

fn parse_request(body: Value) -> Result<UpdateParcelRequest, DomainError> {
    if !body.is_object() {
        return Err(DomainError::MalformedBody("expected a JSON object".to_string()));
    }
    serde_json::from_value(body).map_err(|error| DomainError::MalformedBody(error.to_string()))
}

fn mutation_reply(
    outcome: RepositoryOutcome<()>,
    parcel_id: i64,
) -> Result<ServiceReply<()>, ApplicationError> {
    if outcome.success {
        Ok(ServiceReply { message: outcome.message, data: None, entity_id: Some(parcel_id), page: None })
    } else {
        Err(ApplicationError::Rejected(outcome.message))
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}
