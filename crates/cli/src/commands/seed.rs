use tradeflow_db::{migrations, DemoDataset, SeedResult, VerificationResult};

use crate::commands::{with_database, CommandResult, Failure, EXIT_MIGRATION, EXIT_VERIFICATION};

pub fn run() -> CommandResult {
    let outcome = with_database(|pool| async move {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

        let seeded = DemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_MIGRATION))?;

        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_VERIFICATION))?;

        if !verification.all_present {
            return Err(("seed_verification", verification_message(&verification), EXIT_VERIFICATION));
        }

        Ok::<_, Failure>(summary(&seeded))
    });

    CommandResult::from_outcome("seed", outcome)
}

fn verification_message(verification: &VerificationResult) -> String {
    let failed = verification.failed_checks();
    if failed.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed.join(", "))
    }
}

fn summary(seeded: &SeedResult) -> String {
    let kinds = seeded.kinds_seeded.iter().map(|kind| kind.form_name()).collect::<Vec<_>>();
    format!(
        "demo dataset loaded: {} persons, {} roles, {} approval kinds ({}); person {} has pending approvals",
        seeded.persons,
        seeded.roles,
        kinds.len(),
        kinds.join(", "),
        seeded.pending_approver_id
    )
}

#[cfg(test)]
mod tests {
    use tradeflow_db::VerificationResult;

    use super::verification_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let verification = VerificationResult {
            all_present: false,
            checks: vec![
                ("persons".to_string(), true),
                ("sales_order-pending-approval".to_string(), false),
                ("purchase_order-documents".to_string(), false),
            ],
        };

        assert_eq!(
            verification_message(&verification),
            "seed verification failed for checks: sales_order-pending-approval, purchase_order-documents"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let verification = VerificationResult { all_present: false, checks: Vec::new() };

        assert_eq!(verification_message(&verification), "some seed data failed to load");
    }
}
