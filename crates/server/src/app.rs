use std::sync::Arc;

use axum::{middleware::from_fn_with_state, Router};
use tower_http::trace::TraceLayer;

use tradeflow_core::config::{AppConfig, ApprovalsConfig, AuthConfig};
use tradeflow_core::domain::kind::ApprovalKind;
use tradeflow_db::{
    ApprovalRepository, DbPool, PendingApprovalsRepository, PersistenceGateway,
    SalesQuotationParcelRepository,
};

use crate::approvals::{self, service::ApprovalService};
use crate::auth::attach_principal;
use crate::health;
use crate::parcels::{self, service::ParcelService};
use crate::pending::{self, PendingState};

/// Everything request handlers share. The gateway is the only stateful piece.
#[derive(Clone)]
pub struct AppState {
    gateway: Arc<dyn PersistenceGateway>,
    approvals: ApprovalsConfig,
    auth: AuthConfig,
}

impl AppState {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, config: &AppConfig) -> Self {
        Self { gateway, approvals: config.approvals.clone(), auth: config.auth.clone() }
    }

    pub fn approval_service(&self, kind: ApprovalKind) -> ApprovalService {
        ApprovalService::new(ApprovalRepository::new(kind, self.gateway.clone()), self.approvals.clone())
    }

    pub fn parcel_service(&self) -> ParcelService {
        ParcelService::new(
            SalesQuotationParcelRepository::new(self.gateway.clone()),
            self.approvals.clone(),
        )
    }

    pub fn pending_state(&self) -> PendingState {
        PendingState {
            repository: PendingApprovalsRepository::new(self.gateway.clone()),
            settings: self.approvals.clone(),
        }
    }
}

/// Approval, parcel and pending-approval routes behind the identity adapter.
pub fn api_router(state: &AppState) -> Router {
    approvals::router(state)
        .merge(parcels::router(state.parcel_service()))
        .merge(pending::router(state.pending_state()))
        .layer(from_fn_with_state(state.auth.clone(), attach_principal))
}

pub fn router(state: &AppState, db_pool: DbPool) -> Router {
    api_router(state).merge(health::router(db_pool)).layer(TraceLayer::new_for_http())
}
