use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::kind::ApprovalKind;
use crate::domain::principal::Principal;

pub const ADMINISTRATOR: &str = "Administrator";
pub const CUSTOMER_ORDER_COORDINATOR: &str = "Customer Order Coordinator";

/// Roles allowed to manage purchase RFQ approvals and sales quotation parcels.
pub const ORDER_COORDINATION_ROLES: &[&str] = &[ADMINISTRATOR, CUSTOMER_ORDER_COORDINATOR];

/// Parcel updates and deletes; reads are open to any caller.
pub const SALES_QUOTATION_PARCEL_POLICY: ApprovalPolicy =
    ApprovalPolicy::Roles(ORDER_COORDINATION_ROLES);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Create,
    Update,
    Delete,
}

impl ApprovalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// What a policy guards, as a refusal names it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyTarget {
    Approvals(ApprovalKind),
    SalesQuotationParcels,
}

impl fmt::Display for PolicyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approvals(kind) => write!(f, "{kind} approvals"),
            Self::SalesQuotationParcels => f.write_str("sales quotation parcels"),
        }
    }
}

/// Who may create, update or delete approvals of a given kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalPolicy {
    AnyAuthenticated,
    Roles(&'static [&'static str]),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationFailure {
    Unauthenticated,
    RoleNotPermitted { role: String, action: ApprovalAction, target: PolicyTarget },
}

impl ApprovalPolicy {
    /// Returns the principal to act as, or why the caller may not proceed.
    pub fn authorize<'a>(
        &self,
        principal: Option<&'a Principal>,
        action: ApprovalAction,
        target: PolicyTarget,
    ) -> Result<&'a Principal, AuthorizationFailure> {
        let Some(principal) = principal else {
            return Err(AuthorizationFailure::Unauthenticated);
        };

        match self {
            Self::AnyAuthenticated => Ok(principal),
            Self::Roles(roles) if roles.iter().any(|role| principal.has_role(role)) => {
                Ok(principal)
            }
            Self::Roles(_) => Err(AuthorizationFailure::RoleNotPermitted {
                role: principal.role.clone(),
                action,
                target,
            }),
        }
    }
}
