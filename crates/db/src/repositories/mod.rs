use thiserror::Error;

pub mod approval;
pub mod parcel;
pub mod pending;

pub use approval::{ApprovalPage, ApprovalRepository};
pub use parcel::SalesQuotationParcelRepository;
pub use pending::PendingApprovalsRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("malformed gateway reply: {0}")]
    MalformedReply(String),
}

/// Uniform answer of every repository operation.
///
/// `success == false` covers everything the caller should report as a client error:
/// missing fields, failed reference checks, and operations the data layer declined.
/// Failures of the data layer itself travel as [`RepositoryError`] instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryOutcome<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> RepositoryOutcome<T> {
    pub fn succeeded(message: impl Into<String>, data: Option<T>) -> Self {
        Self { success: true, message: message.into(), data }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), data: None }
    }
}
