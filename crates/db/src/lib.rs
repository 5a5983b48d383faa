pub mod connection;
pub mod fixtures;
pub mod gateway;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_from_config, connect_with_settings, ping, DbPool};
pub use fixtures::{DemoDataset, SeedResult, VerificationResult};
pub use gateway::{InMemoryGateway, PersistenceGateway, SqlGateway};
pub use repositories::{
    ApprovalRepository, PendingApprovalsRepository, RepositoryError, RepositoryOutcome,
    SalesQuotationParcelRepository,
};
