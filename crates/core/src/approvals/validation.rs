use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Result of the foreign-key probes that run before a mutating gateway call.
///
/// The probes and the mutation are separate round trips, so a referenced row can still
/// disappear in between; the data layer's own constraints are the last line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceValidation {
    Valid,
    Invalid(Vec<String>),
}

impl ReferenceValidation {
    pub fn from_reasons(reasons: Vec<String>) -> Self {
        if reasons.is_empty() {
            Self::Valid
        } else {
            Self::Invalid(reasons)
        }
    }

    pub fn message(&self) -> Option<String> {
        match self {
            Self::Valid => None,
            Self::Invalid(reasons) => Some(reasons.join("; ")),
        }
    }
}

/// Collects the names of absent fields so one message can list all of them.
#[derive(Clone, Debug, Default)]
pub struct RequiredFields {
    missing: Vec<String>,
}

impl RequiredFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(mut self, field: &str, present: bool) -> Self {
        if !present {
            self.missing.push(field.to_string());
        }
        self
    }

    pub fn check_text(self, field: &str, value: Option<&str>) -> Self {
        let present = value.map(|value| !value.trim().is_empty()).unwrap_or(false);
        self.check(field, present)
    }

    pub fn finish(self) -> Result<(), DomainError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(DomainError::MissingFields(self.missing))
        }
    }
}

/// A person or document id as clients send it: a JSON number or a numeric string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdInput {
    Number(i64),
    Text(String),
}

impl IdInput {
    pub fn coerce(&self, field: &str) -> Result<i64, DomainError> {
        match self {
            Self::Number(value) => ensure_positive(field, *value),
            Self::Text(raw) => parse_id(field, raw),
        }
    }
}

impl From<i64> for IdInput {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

pub fn parse_id(field: &str, raw: &str) -> Result<i64, DomainError> {
    let value = raw.trim().parse::<i64>().map_err(|_| invalid_id(field))?;
    ensure_positive(field, value)
}

fn ensure_positive(field: &str, value: i64) -> Result<i64, DomainError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(invalid_id(field))
    }
}

fn invalid_id(field: &str) -> DomainError {
    DomainError::InvalidField {
        field: field.to_string(),
        expected: "a positive numeric id".to_string(),
    }
}

/// An approve/reject flag as legacy clients send it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecisionInput {
    Flag(bool),
    Number(i64),
    Text(String),
}

impl DecisionInput {
    pub fn coerce(&self, field: &str) -> Result<bool, DomainError> {
        let invalid = || DomainError::InvalidField {
            field: field.to_string(),
            expected: "true or false".to_string(),
        };

        match self {
            Self::Flag(value) => Ok(*value),
            Self::Number(1) => Ok(true),
            Self::Number(0) => Ok(false),
            Self::Number(_) => Err(invalid()),
            Self::Text(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "y" | "yes" => Ok(true),
                "false" | "0" | "n" | "no" => Ok(false),
                _ => Err(invalid()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_id, DecisionInput, IdInput, ReferenceValidation, RequiredFields};
    use crate::errors::DomainError;

    #[test]
    fn required_fields_report_all_missing_names_in_order() {
        let error = RequiredFields::new()
            .check("SalesOrderID", false)
            .check("ApproverID", true)
            .check_text("FormName", Some("   "))
            .check_text("RoleName", None)
            .finish()
            .expect_err("fields are missing");

        assert_eq!(error.to_string(), "SalesOrderID, FormName, RoleName are required");
    }

    #[test]
    fn ids_accept_numbers_and_numeric_strings() {
        assert_eq!(IdInput::Number(42).coerce("PurchaseRFQID"), Ok(42));
        assert_eq!(IdInput::Text(" 7 ".to_string()).coerce("ApproverID"), Ok(7));
        assert_eq!(parse_id("ApproverID", "12"), Ok(12));
    }

    #[test]
    fn non_numeric_or_non_positive_ids_name_the_field() {
        let error = IdInput::Text("abc".to_string()).coerce("ApproverID").expect_err("invalid");
        assert_eq!(error.to_string(), "ApproverID must be a positive numeric id");
        assert!(matches!(
            IdInput::Number(0).coerce("POID"),
            Err(DomainError::InvalidField { ref field, .. }) if field == "POID"
        ));
    }

    #[test]
    fn decisions_accept_legacy_spellings() {
        assert_eq!(DecisionInput::Flag(true).coerce("approvedYN"), Ok(true));
        assert_eq!(DecisionInput::Number(0).coerce("approvedYN"), Ok(false));
        assert_eq!(DecisionInput::Text("Y".to_string()).coerce("approvedYN"), Ok(true));
        assert!(DecisionInput::Number(2).coerce("approvedYN").is_err());
        assert!(DecisionInput::Text("maybe".to_string()).coerce("approvedYN").is_err());
    }

    #[test]
    fn reference_validation_joins_reasons() {
        assert_eq!(ReferenceValidation::from_reasons(Vec::new()).message(), None);

        let invalid = ReferenceValidation::from_reasons(vec![
            "PurchaseRFQID 42 does not exist or is deleted".to_string(),
            "ApproverID 7 does not exist or is deleted".to_string(),
        ]);
        assert_eq!(
            invalid.message().as_deref(),
            Some(
                "PurchaseRFQID 42 does not exist or is deleted; ApproverID 7 does not exist or is deleted"
            )
        );
    }
}
