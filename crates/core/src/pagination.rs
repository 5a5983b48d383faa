use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// One-based page window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    page_number: u32,
    page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page_number: 1, page_size: DEFAULT_PAGE_SIZE }
    }
}

impl PageRequest {
    pub fn new(page_number: i64, page_size: i64) -> Result<Self, DomainError> {
        let page_number = positive("pageNumber", page_number)?;
        let page_size = positive("pageSize", page_size)?;
        Ok(Self { page_number, page_size })
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page_number - 1) * u64::from(self.page_size)
    }

    pub fn total_pages(&self, total_records: u64) -> u32 {
        let pages = total_records.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

fn positive(field: &str, value: i64) -> Result<u32, DomainError> {
    u32::try_from(value).ok().filter(|value| *value > 0).ok_or_else(|| {
        DomainError::InvalidField {
            field: field.to_string(),
            expected: "a positive integer".to_string(),
        }
    })
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            _ => Err(DomainError::InvalidField {
                field: "sortDirection".to_string(),
                expected: "ASC or DESC".to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortColumn {
    #[default]
    EntityId,
    ApproverId,
    ApprovedYn,
    ApproverDateTime,
    CreatedDateTime,
}

impl FromStr for SortColumn {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key: String =
            value.trim().chars().filter(|ch| *ch != '_').collect::<String>().to_ascii_lowercase();
        match key.as_str() {
            "entityid" => Ok(Self::EntityId),
            "approverid" => Ok(Self::ApproverId),
            "approvedyn" => Ok(Self::ApprovedYn),
            "approverdatetime" => Ok(Self::ApproverDateTime),
            "createddatetime" => Ok(Self::CreatedDateTime),
            _ => Err(DomainError::InvalidField {
                field: "sortColumn".to_string(),
                expected: "one of entityId|approverId|approvedYN|approverDateTime|createdDateTime"
                    .to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub column: SortColumn,
    pub direction: SortDirection,
}

/// A window of results plus the totals needed to render pagination controls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_records: u64,
    pub total_pages: u32,
    pub current_page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_records: u64, request: PageRequest) -> Self {
        Self {
            items,
            total_records,
            total_pages: request.total_pages(total_records),
            current_page: request.page_number(),
            page_size: request.page_size(),
        }
    }

    /// Slices an already ordered, complete result set.
    pub fn from_ordered(all: Vec<T>, request: PageRequest) -> Self {
        let total_records = all.len() as u64;
        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let items = all.into_iter().skip(offset).take(request.page_size() as usize).collect();
        Self::new(items, total_records, request)
    }
}
