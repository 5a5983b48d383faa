pub mod approvals;
pub mod config;
pub mod domain;
pub mod errors;
pub mod pagination;

pub use approvals::policy::{ApprovalAction, ApprovalPolicy, AuthorizationFailure, PolicyTarget};
pub use approvals::validation::{DecisionInput, IdInput, ReferenceValidation, RequiredFields};
pub use domain::approval::{
    ApprovalDecision, ApprovalFilter, ApprovalKey, ApprovalRecord, ApprovalRevocation,
    NewApproval,
};
pub use domain::kind::ApprovalKind;
pub use domain::parcel::{ParcelChange, ParcelRecord, ParcelRevocation};
pub use domain::pending::{PendingApprovalItem, PendingApprovalQuery};
pub use domain::principal::Principal;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pagination::{Page, PageRequest, SortColumn, SortDirection, SortOrder};
