use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::kind::ApprovalKind;
use crate::errors::DomainError;
use crate::pagination::PageRequest;

/// Filter for the cross-document list of approvals awaiting one person.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingApprovalQuery {
    pub user_id: i64,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub form_name: Option<String>,
    pub page: PageRequest,
}

impl PendingApprovalQuery {
    pub fn new(
        user_id: i64,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
        form_name: Option<String>,
        page: PageRequest,
    ) -> Result<Self, DomainError> {
        if let (Some(from), Some(to)) = (from_date, to_date) {
            if from > to {
                return Err(DomainError::InvalidField {
                    field: "fromDate".to_string(),
                    expected: "on or before toDate".to_string(),
                });
            }
        }

        let form_name =
            form_name.map(|name| name.trim().to_string()).filter(|name| !name.is_empty());

        Ok(Self { user_id, from_date, to_date, form_name, page })
    }

    /// Inclusive on both ends.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.from_date.map_or(true, |from| date >= from)
            && self.to_date.map_or(true, |to| date <= to)
    }

    pub fn matches_form(&self, kind: ApprovalKind) -> bool {
        self.form_name.as_deref().map_or(true, |name| kind.form_name().eq_ignore_ascii_case(name))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApprovalItem {
    pub kind: ApprovalKind,
    pub form_name: String,
    pub entity_id: i64,
    pub approver_id: i64,
    pub document_series: String,
    pub document_created_date_time: DateTime<Utc>,
    pub assigned_date_time: DateTime<Utc>,
    #[serde(rename = "approvedYN")]
    pub approved_yn: Option<bool>,
}
