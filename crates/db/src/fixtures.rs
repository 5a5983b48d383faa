use sqlx::Executor;

use tradeflow_core::domain::kind::ApprovalKind;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Person who holds one pending approval on every document family after seeding.
pub const DEMO_PENDING_APPROVER_ID: i64 = 7;
/// Person who decided the first document of every family.
pub const DEMO_DECIDED_APPROVER_ID: i64 = 3;

const SEED_PERSON_IDS: &[i64] = &[1, 2, 3, 4, 5, 7, 99];
const SEED_ROLE_NAMES: &[&str] = &[
    "Administrator",
    "Customer Order Coordinator",
    "Sales Manager",
    "Procurement Officer",
    "Warehouse Staff",
];
const SEED_DOCUMENT_IDS: &[i64] = &[101, 102];
const SEED_PARCEL_IDS: &[i64] = &[1, 2, 3];

/// Demo data for every approval kind: reference people, forms and roles, two documents per
/// kind, one decided and one pending approval per kind, plus parcels on both sales quotations.
pub struct DemoDataset;

impl DemoDataset {
    pub const SQL: &'static str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Loads the dataset. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            persons: SEED_PERSON_IDS.len(),
            roles: SEED_ROLE_NAMES.len(),
            kinds_seeded: ApprovalKind::ALL.to_vec(),
            pending_approver_id: DEMO_PENDING_APPROVER_ID,
        })
    }

    /// Checks the seeded rows are present and still in their seeded decision state.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let persons: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM person WHERE person_id IN ({})",
            id_list(SEED_PERSON_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("persons".to_string(), persons == SEED_PERSON_IDS.len() as i64));

        let roles: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM role WHERE is_deleted = 0")
            .fetch_one(pool)
            .await?;
        checks.push(("roles".to_string(), roles >= SEED_ROLE_NAMES.len() as i64));

        let forms: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM form WHERE is_deleted = 0")
            .fetch_one(pool)
            .await?;
        checks.push(("forms".to_string(), forms >= ApprovalKind::ALL.len() as i64));

        for kind in ApprovalKind::ALL {
            let documents: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(1) FROM {} WHERE {} IN ({}) AND is_deleted = 0",
                kind.document_table(),
                kind.entity_column(),
                id_list(SEED_DOCUMENT_IDS)
            ))
            .fetch_one(pool)
            .await?;
            checks.push((
                format!("{}-documents", kind.as_str()),
                documents == SEED_DOCUMENT_IDS.len() as i64,
            ));

            let decided: i64 = sqlx::query_scalar(&format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = 101 AND approver_id = ?1
                                AND approved_yn = 1 AND is_deleted = 0)",
                kind.approval_table(),
                kind.entity_column()
            ))
            .bind(DEMO_DECIDED_APPROVER_ID)
            .fetch_one(pool)
            .await?;
            checks.push((format!("{}-decided-approval", kind.as_str()), decided == 1));

            let pending: i64 = sqlx::query_scalar(&format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = 102 AND approver_id = ?1
                                AND approved_yn IS NULL AND is_deleted = 0)",
                kind.approval_table(),
                kind.entity_column()
            ))
            .bind(DEMO_PENDING_APPROVER_ID)
            .fetch_one(pool)
            .await?;
            checks.push((format!("{}-pending-approval", kind.as_str()), pending == 1));
        }

        let parcels: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM sales_quotation_parcel WHERE parcel_id IN ({}) AND is_deleted = 0",
            id_list(SEED_PARCEL_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push((
            "sales-quotation-parcels".to_string(),
            parcels == SEED_PARCEL_IDS.len() as i64,
        ));

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

fn id_list(ids: &[i64]) -> String {
    ids.iter().map(i64::to_string).collect::<Vec<_>>().join(", ")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub persons: usize,
    pub roles: usize,
    pub kinds_seeded: Vec<ApprovalKind>,
    pub pending_approver_id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

impl VerificationResult {
    pub fn failed_checks(&self) -> Vec<&str> {
        self.checks.iter().filter(|(_, present)| !present).map(|(name, _)| name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tradeflow_core::domain::pending::PendingApprovalQuery;
    use tradeflow_core::pagination::PageRequest;

    use super::{DemoDataset, DEMO_PENDING_APPROVER_ID};
    use crate::gateway::SqlGateway;
    use crate::repositories::PendingApprovalsRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_loads_verifies_and_is_repeatable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let seeded = DemoDataset::load(&pool).await.expect("seed");
        assert_eq!(seeded.kinds_seeded.len(), 8);
        DemoDataset::load(&pool).await.expect("second seed");

        let verification = DemoDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "failed: {:?}", verification.failed_checks());
    }

    #[tokio::test]
    async fn verification_notices_a_decided_pending_row() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        DemoDataset::load(&pool).await.expect("seed");

        sqlx::query("UPDATE po_approval SET approved_yn = 1 WHERE po_id = 102")
            .execute(&pool)
            .await
            .expect("decide");

        let verification = DemoDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
        assert_eq!(verification.failed_checks(), vec!["purchase_order-pending-approval"]);
    }

    #[tokio::test]
    async fn seeded_approver_sees_one_pending_item_per_kind() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        DemoDataset::load(&pool).await.expect("seed");

        let repository = PendingApprovalsRepository::new(Arc::new(SqlGateway::new(pool)));
        let query = PendingApprovalQuery::new(
            DEMO_PENDING_APPROVER_ID,
            None,
            None,
            None,
            PageRequest::new(1, 20).expect("page"),
        )
        .expect("query");
        let page = repository.get_pending(&query).await.expect("pending");

        assert_eq!(page.total_records, 8);
        // Purchase Order documents are the most recent, so they lead.
        assert_eq!(page.items[0].document_series, "PO-0102");
    }
}
