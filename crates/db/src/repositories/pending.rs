use std::sync::Arc;

use tracing::debug;

use tradeflow_core::domain::pending::{PendingApprovalItem, PendingApprovalQuery};
use tradeflow_core::pagination::Page;

use super::RepositoryError;
use crate::gateway::PersistenceGateway;

/// Cross-kind view of the approvals still waiting on one person.
#[derive(Clone)]
pub struct PendingApprovalsRepository {
    gateway: Arc<dyn PersistenceGateway>,
}

impl PendingApprovalsRepository {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    pub async fn get_pending(
        &self,
        query: &PendingApprovalQuery,
    ) -> Result<Page<PendingApprovalItem>, RepositoryError> {
        let page = self.gateway.pending_approvals(query).await?;
        debug!(
            event_name = "approval.pending.listed",
            user_id = query.user_id,
            form_name = query.form_name.as_deref().unwrap_or("*"),
            total_records = page.total_records,
            "pending approvals listed"
        );
        Ok(Page::new(page.items, page.total_records, query.page))
    }
}
