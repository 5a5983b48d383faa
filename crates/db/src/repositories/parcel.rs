use std::sync::Arc;

use tracing::{info, warn};

use tradeflow_core::approvals::validation::ReferenceValidation;
use tradeflow_core::domain::parcel::{ParcelChange, ParcelRecord, ParcelRevocation};

use super::approval::mutation_outcome;
use super::{RepositoryError, RepositoryOutcome};
use crate::gateway::{missing_parcel_message, PersistenceGateway, ReferenceCheck};

/// Parcels packed for a sales quotation. Role checks happen in the caller.
#[derive(Clone)]
pub struct SalesQuotationParcelRepository {
    gateway: Arc<dyn PersistenceGateway>,
}

impl SalesQuotationParcelRepository {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    pub async fn read(
        &self,
        parcel_id: i64,
    ) -> Result<RepositoryOutcome<ParcelRecord>, RepositoryError> {
        let parcel = self.gateway.parcel(parcel_id).await?;
        let message = match parcel {
            Some(_) => "Sales quotation parcel retrieved successfully".to_string(),
            None => format!("Sales quotation parcel not found for ParcelID {parcel_id}"),
        };
        Ok(RepositoryOutcome::succeeded(message, parcel))
    }

    pub async fn update(&self, change: ParcelChange) -> Result<RepositoryOutcome<()>, RepositoryError> {
        if let Err(error) = change.validate() {
            return Ok(RepositoryOutcome::failed(error.to_string()));
        }

        let validation =
            self.validate_references(change.parcel_id, "UpdatedByID", change.updated_by_id).await?;
        if let Some(message) = validation.message() {
            warn!(
                event_name = "parcel.update.rejected",
                parcel_id = change.parcel_id,
                reason = %message,
                "parcel update failed reference validation"
            );
            return Ok(RepositoryOutcome::failed(message));
        }

        let outcome = mutation_outcome(self.gateway.update_parcel(&change).await?)?;
        info!(
            event_name = "parcel.updated",
            parcel_id = change.parcel_id,
            updated_by_id = change.updated_by_id,
            success = outcome.success,
            "parcel update dispatched"
        );
        Ok(outcome)
    }

    pub async fn delete(
        &self,
        revocation: ParcelRevocation,
    ) -> Result<RepositoryOutcome<()>, RepositoryError> {
        let validation = self
            .validate_references(revocation.parcel_id, "DeletedByID", revocation.deleted_by_id)
            .await?;
        if let Some(message) = validation.message() {
            warn!(
                event_name = "parcel.delete.rejected",
                parcel_id = revocation.parcel_id,
                reason = %message,
                "parcel delete failed reference validation"
            );
            return Ok(RepositoryOutcome::failed(message));
        }

        let outcome = mutation_outcome(self.gateway.delete_parcel(&revocation).await?)?;
        info!(
            event_name = "parcel.deleted",
            parcel_id = revocation.parcel_id,
            deleted_by_id = revocation.deleted_by_id,
            success = outcome.success,
            "parcel delete dispatched"
        );
        Ok(outcome)
    }

    async fn validate_references(
        &self,
        parcel_id: i64,
        acting_field: &str,
        acting_id: i64,
    ) -> Result<ReferenceValidation, RepositoryError> {
        let mut reasons = Vec::new();
        if self.gateway.parcel(parcel_id).await?.is_none() {
            reasons.push(missing_parcel_message(parcel_id));
        }
        if !self.gateway.reference_exists(&ReferenceCheck::Person(acting_id)).await? {
            reasons.push(format!("{acting_field} {acting_id} does not exist or is deleted"));
        }
        Ok(ReferenceValidation::from_reasons(reasons))
    }
}
