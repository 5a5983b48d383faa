use std::sync::Arc;

use tradeflow_core::domain::approval::{ApprovalFilter, ApprovalKey, NewApproval};
use tradeflow_core::domain::kind::ApprovalKind;
use tradeflow_db::{
    connect_with_settings, migrations, ApprovalRepository, DbPool, DemoDataset, SqlGateway,
};

async fn file_pool(dir: &tempfile::TempDir) -> DbPool {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("concurrent.db").display());
    let pool = connect_with_settings(&url, 8, 10).await.expect("pool should connect");
    migrations::run_pending(&pool).await.expect("migrations");
    DemoDataset::load(&pool).await.expect("seed");
    pool
}

fn pending(approver_id: i64) -> NewApproval {
    NewApproval {
        key: ApprovalKey::new(102, approver_id),
        approved_yn: None,
        approver_date_time: None,
        form_name: None,
        role_name: None,
        created_by_id: 1,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_creates_on_a_shared_file_never_fail_and_keep_one_row_per_pair() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = file_pool(&dir).await;
    let repository = Arc::new(ApprovalRepository::new(
        ApprovalKind::SalesOrder,
        Arc::new(SqlGateway::new(pool.clone())),
    ));

    // Five distinct pairs, each requested six times at once.
    let mut tasks = Vec::new();
    for _ in 0..6 {
        for approver_id in 1..=5 {
            let repository = repository.clone();
            tasks.push(tokio::spawn(async move {
                (approver_id, repository.create(pending(approver_id)).await)
            }));
        }
    }

    let mut created = [0usize; 6];
    for task in tasks {
        let (approver_id, outcome) = task.await.expect("task should not panic");
        let outcome = outcome.unwrap_or_else(|error| {
            panic!("create for approver {approver_id} errored instead of answering: {error}")
        });
        if outcome.success {
            created[approver_id as usize] += 1;
        } else {
            assert!(outcome.message.contains("already exists"), "{}", outcome.message);
        }
    }
    assert_eq!(&created[1..], &[1, 1, 1, 1, 1]);

    let rows = repository
        .read_all(ApprovalFilter { entity_id: Some(102), approver_id: None })
        .await
        .expect("read all")
        .data
        .expect("rows");
    for approver_id in 1..=5 {
        assert_eq!(rows.iter().filter(|record| record.approver_id == approver_id).count(), 1);
    }

    pool.close().await;
}
