use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite identity of an approval row: the document and the person deciding on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalKey {
    pub entity_id: i64,
    pub approver_id: i64,
}

impl ApprovalKey {
    pub fn new(entity_id: i64, approver_id: i64) -> Self {
        Self { entity_id, approver_id }
    }
}

/// One active (not soft-deleted) approval row as the data layer returns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRecord {
    pub entity_id: i64,
    pub approver_id: i64,
    #[serde(rename = "approvedYN")]
    pub approved_yn: Option<bool>,
    pub approver_date_time: Option<DateTime<Utc>>,
    pub form_name: Option<String>,
    pub role_name: Option<String>,
    pub created_by_id: i64,
    pub created_date_time: DateTime<Utc>,
    pub updated_by_id: Option<i64>,
    pub updated_date_time: Option<DateTime<Utc>>,
}

impl ApprovalRecord {
    pub fn key(&self) -> ApprovalKey {
        ApprovalKey::new(self.entity_id, self.approver_id)
    }

    pub fn is_pending(&self) -> bool {
        self.approved_yn.is_none()
    }
}

/// Insert payload. `created_by_id` is always the authenticated principal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewApproval {
    pub key: ApprovalKey,
    pub approved_yn: Option<bool>,
    pub approver_date_time: Option<DateTime<Utc>>,
    pub form_name: Option<String>,
    pub role_name: Option<String>,
    pub created_by_id: i64,
}

/// Decision update. Any decision may overwrite any other; callers gate who may call it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalDecision {
    pub key: ApprovalKey,
    pub approved_yn: Option<bool>,
    pub approver_date_time: Option<DateTime<Utc>>,
    pub form_name: Option<String>,
    pub role_name: Option<String>,
    pub updated_by_id: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApprovalRevocation {
    pub key: ApprovalKey,
    pub deleted_by_id: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApprovalFilter {
    pub entity_id: Option<i64>,
    pub approver_id: Option<i64>,
}

impl ApprovalFilter {
    pub fn is_unfiltered(&self) -> bool {
        self.entity_id.is_none() && self.approver_id.is_none()
    }

    pub fn matches(&self, key: &ApprovalKey) -> bool {
        self.entity_id.map_or(true, |id| id == key.entity_id)
            && self.approver_id.map_or(true, |id| id == key.approver_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{ApprovalFilter, ApprovalKey, ApprovalRecord};

    fn record(approved_yn: Option<bool>) -> ApprovalRecord {
        ApprovalRecord {
            entity_id: 42,
            approver_id: 7,
            approved_yn,
            approver_date_time: None,
            form_name: None,
            role_name: None,
            created_by_id: 1,
            created_date_time: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            updated_by_id: None,
            updated_date_time: None,
        }
    }

    #[test]
    fn only_an_undecided_record_is_pending() {
        assert!(record(None).is_pending());
        assert!(!record(Some(true)).is_pending());
        assert!(!record(Some(false)).is_pending());
    }

    #[test]
    fn record_serializes_with_legacy_decision_field_name() {
        let json = serde_json::to_value(record(Some(true))).expect("serialize");
        assert_eq!(json["approvedYN"], true);
        assert_eq!(json["entityId"], 42);
        assert_eq!(json["approverId"], 7);
        assert!(json["approverDateTime"].is_null());
    }

    #[test]
    fn filter_matches_on_supplied_fields_only() {
        let key = ApprovalKey::new(42, 7);
        assert!(ApprovalFilter::default().matches(&key));
        assert!(ApprovalFilter { entity_id: Some(42), approver_id: None }.matches(&key));
        assert!(!ApprovalFilter { entity_id: Some(42), approver_id: Some(8) }.matches(&key));
        assert!(ApprovalFilter::default().is_unfiltered());
    }
}
