use tradeflow_db::migrations;

use crate::commands::{with_database, CommandResult, Failure, EXIT_MIGRATION};

pub fn run() -> CommandResult {
    let outcome = with_database(|pool| async move {
        let before = migrations::applied_versions(&pool).await.unwrap_or_default().len();
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
        let after = migrations::applied_versions(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?
            .len();

        let applied = after.saturating_sub(before);
        Ok::<_, Failure>(format!("applied {applied} pending migration(s); {after} total"))
    });

    CommandResult::from_outcome("migrate", outcome)
}
