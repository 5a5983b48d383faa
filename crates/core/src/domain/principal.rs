use serde::{Deserialize, Serialize};

/// Identity attached to a request by the upstream authentication layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub person_id: i64,
    pub role: String,
}

impl Principal {
    pub fn new(person_id: i64, role: impl Into<String>) -> Self {
        Self { person_id, role: role.into() }
    }

    pub fn has_role(&self, role: &str) -> bool {
        normalize_role(&self.role) == normalize_role(role)
    }
}

pub(crate) fn normalize_role(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}
