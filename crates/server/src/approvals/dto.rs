use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use tradeflow_core::approvals::validation::{parse_id, DecisionInput, IdInput, RequiredFields};
use tradeflow_core::domain::approval::{
    ApprovalDecision, ApprovalFilter, ApprovalKey, ApprovalRevocation, NewApproval,
};
use tradeflow_core::domain::kind::ApprovalKind;
use tradeflow_core::domain::principal::Principal;
use tradeflow_core::errors::DomainError;
use tradeflow_core::pagination::{PageRequest, SortColumn, SortDirection, SortOrder};

const ENTITY_ID: &str = "entityId";
const APPROVER_ID: &str = "ApproverID";
const APPROVED_YN: &str = "ApprovedYN";

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateApprovalRequest {
    pub entity_id: Option<IdInput>,
    #[serde(alias = "ApproverID")]
    pub approver_id: Option<IdInput>,
    #[serde(rename = "approvedYN", alias = "ApprovedYN")]
    pub approved_yn: Option<DecisionInput>,
    #[serde(alias = "ApproverDateTime")]
    pub approver_date_time: Option<DateTime<Utc>>,
    #[serde(alias = "FormName")]
    pub form_name: Option<String>,
    #[serde(alias = "RoleName")]
    pub role_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateApprovalRequest {
    pub entity_id: Option<IdInput>,
    #[serde(alias = "ApproverID")]
    pub approver_id: Option<IdInput>,
    #[serde(rename = "approvedYN", alias = "ApprovedYN")]
    pub approved_yn: Option<DecisionInput>,
    #[serde(alias = "ApproverDateTime")]
    pub approver_date_time: Option<DateTime<Utc>>,
    #[serde(alias = "FormName")]
    pub form_name: Option<String>,
    #[serde(alias = "RoleName")]
    pub role_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeleteApprovalRequest {
    pub entity_id: Option<IdInput>,
    #[serde(alias = "ApproverID")]
    pub approver_id: Option<IdInput>,
}

/// Deserializes a request body after folding the kind's own id spellings
/// (`PurchaseRFQID`, `purchaseRFQId`) into `entityId`.
pub fn parse_body<T: DeserializeOwned>(kind: ApprovalKind, body: Value) -> Result<T, DomainError> {
    let Value::Object(mut fields) = body else {
        return Err(DomainError::MalformedBody("expected a JSON object".to_string()));
    };
    fold_entity_key(kind, &mut fields)?;
    serde_json::from_value(Value::Object(fields))
        .map_err(|error| DomainError::MalformedBody(error.to_string()))
}

fn fold_entity_key(kind: ApprovalKind, fields: &mut Map<String, Value>) -> Result<(), DomainError> {
    for alias in [kind.entity_field(), kind.envelope_id_key()] {
        let Some(value) = fields.remove(alias) else {
            continue;
        };
        if fields.contains_key(ENTITY_ID) {
            return Err(DomainError::MalformedBody(format!(
                "`{alias}` and `{ENTITY_ID}` name the same field; send only one"
            )));
        }
        fields.insert(ENTITY_ID.to_string(), value);
    }
    Ok(())
}

fn scoped_fields(
    kind: ApprovalKind,
    required: RequiredFields,
    form_name: Option<&str>,
    role_name: Option<&str>,
) -> RequiredFields {
    if kind.is_form_role_scoped() {
        required.check_text("FormName", form_name).check_text("RoleName", role_name)
    } else {
        required
    }
}

/// Resolves the approval identity from the path when present, otherwise from the body.
/// An approver missing from both is the caller.
fn resolve_key(
    kind: ApprovalKind,
    path: Option<ApprovalKey>,
    entity_id: Option<&IdInput>,
    approver_id: Option<&IdInput>,
    acting: &Principal,
) -> Result<ApprovalKey, DomainError> {
    let entity_field = kind.entity_field();
    let body_entity = entity_id.map(|id| id.coerce(entity_field)).transpose()?;
    let body_approver = approver_id.map(|id| id.coerce(APPROVER_ID)).transpose()?;

    if let Some(path) = path {
        let mismatch = |field: &str| DomainError::InvalidField {
            field: field.to_string(),
            expected: "equal to the id in the request path".to_string(),
        };
        if body_entity.is_some_and(|id| id != path.entity_id) {
            return Err(mismatch(entity_field));
        }
        if body_approver.is_some_and(|id| id != path.approver_id) {
            return Err(mismatch(APPROVER_ID));
        }
        return Ok(path);
    }

    let Some(entity_id) = body_entity else {
        return Err(DomainError::MissingFields(vec![entity_field.to_string()]));
    };
    Ok(ApprovalKey::new(entity_id, body_approver.unwrap_or(acting.person_id)))
}

impl CreateApprovalRequest {
    pub fn into_new_approval(
        self,
        kind: ApprovalKind,
        acting: &Principal,
    ) -> Result<NewApproval, DomainError> {
        let required = RequiredFields::new().check(kind.entity_field(), self.entity_id.is_some());
        scoped_fields(kind, required, self.form_name.as_deref(), self.role_name.as_deref())
            .finish()?;

        let key =
            resolve_key(kind, None, self.entity_id.as_ref(), self.approver_id.as_ref(), acting)?;
        let approved_yn = self.approved_yn.map(|value| value.coerce(APPROVED_YN)).transpose()?;

        Ok(NewApproval {
            key,
            approved_yn,
            approver_date_time: self.approver_date_time,
            form_name: self.form_name,
            role_name: self.role_name,
            created_by_id: acting.person_id,
        })
    }
}

impl UpdateApprovalRequest {
    pub fn into_decision(
        self,
        kind: ApprovalKind,
        path: Option<ApprovalKey>,
        acting: &Principal,
    ) -> Result<ApprovalDecision, DomainError> {
        let required = RequiredFields::new()
            .check(kind.entity_field(), path.is_some() || self.entity_id.is_some())
            .check(APPROVED_YN, self.approved_yn.is_some());
        scoped_fields(kind, required, self.form_name.as_deref(), self.role_name.as_deref())
            .finish()?;

        let key =
            resolve_key(kind, path, self.entity_id.as_ref(), self.approver_id.as_ref(), acting)?;
        let approved_yn = self.approved_yn.map(|value| value.coerce(APPROVED_YN)).transpose()?;

        Ok(ApprovalDecision {
            key,
            approved_yn,
            approver_date_time: self.approver_date_time,
            form_name: self.form_name,
            role_name: self.role_name,
            updated_by_id: acting.person_id,
        })
    }
}

impl DeleteApprovalRequest {
    pub fn into_revocation(
        self,
        kind: ApprovalKind,
        acting: &Principal,
    ) -> Result<ApprovalRevocation, DomainError> {
        let key =
            resolve_key(kind, None, self.entity_id.as_ref(), self.approver_id.as_ref(), acting)?;
        Ok(ApprovalRevocation { key, deleted_by_id: acting.person_id })
    }
}

pub fn path_key(
    kind: ApprovalKind,
    entity_id: &str,
    approver_id: &str,
) -> Result<ApprovalKey, DomainError> {
    Ok(ApprovalKey::new(parse_id(kind.entity_field(), entity_id)?, parse_id(APPROVER_ID, approver_id)?))
}

/// Listing parameters after validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: ApprovalFilter,
    /// `None` lists every matching row without a window.
    pub page: Option<(PageRequest, SortOrder)>,
}

const LIST_PARAMS: &[&str] =
    &["entityId", "approverId", "pageNumber", "pageSize", "sortColumn", "sortDirection"];
const APPROVER_ALIASES: [&str; 2] = ["approverId", APPROVER_ID];

impl ListQuery {
    pub fn parse(
        kind: ApprovalKind,
        params: &HashMap<String, String>,
        default_page_size: u32,
        max_page_size: u32,
    ) -> Result<Self, DomainError> {
        let entity_aliases = [ENTITY_ID, kind.entity_field(), kind.envelope_id_key()];
        if let Some(unknown) = params.keys().find(|key| {
            let key = key.as_str();
            !LIST_PARAMS.contains(&key)
                && !entity_aliases.contains(&key)
                && !APPROVER_ALIASES.contains(&key)
        }) {
            return Err(DomainError::InvalidField {
                field: unknown.clone(),
                expected: format!("one of {}", LIST_PARAMS.join(", ")),
            });
        }

        let param = |name: &str| params.get(name).map(String::as_str).filter(|v| !v.is_empty());
        let entity_id = entity_aliases
            .iter()
            .find_map(|alias| param(*alias))
            .map(|raw| parse_id(kind.entity_field(), raw))
            .transpose()?;
        let approver_id = APPROVER_ALIASES
            .iter()
            .find_map(|alias| param(*alias))
            .map(|raw| parse_id(APPROVER_ID, raw))
            .transpose()?;
        let filter = ApprovalFilter { entity_id, approver_id };

        let page_number = param("pageNumber");
        let page_size = param("pageSize");
        if page_number.is_none() && page_size.is_none() {
            return Ok(Self { filter, page: None });
        }

        let page_number = page_number.map(|raw| parse_count("pageNumber", raw)).transpose()?;
        let page_size = page_size.map(|raw| parse_count("pageSize", raw)).transpose()?;
        let page = PageRequest::new(
            page_number.unwrap_or(1),
            page_size.unwrap_or(i64::from(default_page_size)),
        )?;
        if page.page_size() > max_page_size {
            return Err(DomainError::InvalidField {
                field: "pageSize".to_string(),
                expected: format!("at most {max_page_size}"),
            });
        }

        let sort = SortOrder {
            column: param("sortColumn").map(str::parse::<SortColumn>).transpose()?.unwrap_or_default(),
            direction: param("sortDirection").map(str::parse::<SortDirection>).transpose()?.unwrap_or_default(),
        };
        Ok(Self { filter, page: Some((page, sort)) })
    }
}

pub fn parse_count(field: &str, raw: &str) -> Result<i64, DomainError> {
    raw.trim().parse::<i64>().map_err(|_| DomainError::InvalidField {
        field: field.to_string(),
        expected: "a positive integer".to_string(),
    })
}
