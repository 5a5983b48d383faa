use thiserror::Error;

use crate::approvals::policy::AuthorizationFailure;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{} are required", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("{field} must be {expected}")]
    InvalidField { field: String, expected: String },
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("{}", .0.join("; "))]
    ReferentialIntegrity(Vec<String>),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("authentication required")]
    Unauthenticated,
    #[error("role `{role}` is not permitted to {action} {target}")]
    Forbidden { role: String, action: String, target: String },
    #[error("{0}")]
    NotFound(String),
    /// The data layer declined the operation (duplicate pair, missing row).
    #[error("{0}")]
    Rejected(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Internal { .. } => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Unauthorized { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Unauthorized { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Unauthorized { .. } => "Authentication is required for this operation.",
            Self::Forbidden { .. } => "You are not permitted to perform this operation.",
            Self::NotFound { .. } => "The requested record was not found.",
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    /// Text placed in the response envelope. Only internal errors are masked, and only
    /// when raw passthrough is disabled.
    pub fn client_message(&self, expose_internal: bool) -> String {
        match self {
            Self::Internal { .. } if !expose_internal => self.user_message().to_string(),
            _ => self.message().to_string(),
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Unauthorized { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<AuthorizationFailure> for ApplicationError {
    fn from(value: AuthorizationFailure) -> Self {
        match value {
            AuthorizationFailure::Unauthenticated => Self::Unauthenticated,
            AuthorizationFailure::RoleNotPermitted { role, action, target } => Self::Forbidden {
                role,
                action: action.as_str().to_string(),
                target: target.to_string(),
            },
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::Rejected(message) => {
                Self::BadRequest { message, correlation_id: unassigned }
            }
            ApplicationError::Unauthenticated => Self::Unauthorized {
                message: "authentication required".to_owned(),
                correlation_id: unassigned,
            },
            error @ ApplicationError::Forbidden { .. } => {
                Self::Forbidden { message: error.to_string(), correlation_id: unassigned }
            }
            ApplicationError::NotFound(message) => {
                Self::NotFound { message, correlation_id: unassigned }
            }
            ApplicationError::Persistence(message) | ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::approvals::policy::{ApprovalAction, AuthorizationFailure, PolicyTarget};
    use crate::domain::kind::ApprovalKind;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn missing_fields_name_every_field() {
        let error =
            DomainError::MissingFields(vec!["PurchaseRFQID".to_owned(), "ApproverID".to_owned()]);
        assert_eq!(error.to_string(), "PurchaseRFQID, ApproverID are required");
    }

    #[test]
    fn referential_integrity_reasons_are_joined_with_semicolons() {
        let error = DomainError::ReferentialIntegrity(vec![
            "SalesOrderID 5 does not exist or is deleted".to_owned(),
            "DeletedByID 99 does not exist or is deleted".to_owned(),
        ]);
        assert_eq!(
            error.to_string(),
            "SalesOrderID 5 does not exist or is deleted; DeletedByID 99 does not exist or is deleted"
        );
    }

    #[test]
    fn domain_error_maps_to_bad_request_with_correlation_id() {
        let interface = ApplicationError::from(DomainError::MissingFields(vec![
            "ApproverID".to_owned(),
        ]))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(interface.status_code(), 400);
        assert_eq!(interface.message(), "ApproverID are required");
    }

    #[test]
    fn authorization_failures_map_to_401_and_403() {
        let unauthenticated = ApplicationError::from(AuthorizationFailure::Unauthenticated)
            .into_interface("req-2");
        assert_eq!(unauthenticated.status_code(), 401);

        let forbidden = ApplicationError::from(AuthorizationFailure::RoleNotPermitted {
            role: "Warehouse Staff".to_owned(),
            action: ApprovalAction::Create,
            target: PolicyTarget::Approvals(ApprovalKind::PurchaseRfq),
        })
        .into_interface("req-3");
        assert_eq!(forbidden.status_code(), 403);
        assert_eq!(
            forbidden.message(),
            "role `Warehouse Staff` is not permitted to create Purchase RFQ approvals"
        );

        let parcel = ApplicationError::from(AuthorizationFailure::RoleNotPermitted {
            role: "Sales Manager".to_owned(),
            action: ApprovalAction::Delete,
            target: PolicyTarget::SalesQuotationParcels,
        });
        assert_eq!(
            parcel.to_string(),
            "role `Sales Manager` is not permitted to delete sales quotation parcels"
        );
    }

    #[test]
    fn persistence_error_is_masked_unless_passthrough_is_enabled() {
        let interface = ApplicationError::Persistence("database is locked".to_owned())
            .into_interface("req-4");

        assert_eq!(interface.status_code(), 500);
        assert_eq!(interface.client_message(false), "An unexpected internal error occurred.");
        assert_eq!(interface.client_message(true), "database is locked");
    }

    #[test]
    fn not_found_and_rejected_keep_their_messages() {
        let not_found =
            ApplicationError::NotFound("approval not found".to_owned()).into_interface("req-5");
        assert_eq!(not_found.status_code(), 404);
        assert_eq!(not_found.client_message(false), "approval not found");

        let rejected =
            ApplicationError::Rejected("approval already exists".to_owned()).into_interface("r");
        assert_eq!(rejected.status_code(), 400);
    }
}
