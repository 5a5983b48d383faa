use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// One packed parcel of a sales quotation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelRecord {
    pub parcel_id: i64,
    pub sales_quotation_id: i64,
    pub parcel_number: i64,
    pub item_quantity: i64,
    pub gross_weight_grams: Option<i64>,
    pub notes: Option<String>,
    pub created_by_id: i64,
    pub created_date_time: DateTime<Utc>,
    pub updated_by_id: Option<i64>,
    pub updated_date_time: Option<DateTime<Utc>>,
}

/// Partial parcel update. Absent fields keep their stored value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParcelChange {
    pub parcel_id: i64,
    pub item_quantity: Option<i64>,
    pub gross_weight_grams: Option<i64>,
    pub notes: Option<String>,
    pub updated_by_id: i64,
}

impl ParcelChange {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.item_quantity.is_none() && self.gross_weight_grams.is_none() && self.notes.is_none()
        {
            return Err(DomainError::MissingFields(vec![
                "itemQuantity, grossWeightGrams or notes".to_string(),
            ]));
        }
        positive("itemQuantity", self.item_quantity)?;
        positive("grossWeightGrams", self.gross_weight_grams)
    }
}

fn positive(field: &str, value: Option<i64>) -> Result<(), DomainError> {
    match value {
        Some(value) if value <= 0 => Err(DomainError::InvalidField {
            field: field.to_string(),
            expected: "a positive number".to_string(),
        }),
        _ => Ok(()),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParcelRevocation {
    pub parcel_id: i64,
    pub deleted_by_id: i64,
}

#[cfg(test)]
mod tests {
    use super::ParcelChange;
    use crate::errors::DomainError;

    fn change(item_quantity: Option<i64>, gross_weight_grams: Option<i64>) -> ParcelChange {
        ParcelChange { parcel_id: 1, item_quantity, gross_weight_grams, notes: None, updated_by_id: 2 }
    }

    #[test]
    fn change_needs_a_field_and_positive_amounts() {
        assert!(matches!(change(None, None).validate(), Err(DomainError::MissingFields(_))));
        assert!(matches!(
            change(Some(0), None).validate(),
            Err(DomainError::InvalidField { ref field, .. }) if field == "itemQuantity"
        ));
        assert!(change(None, Some(-5)).validate().is_err());
        assert_eq!(change(Some(3), Some(900)).validate(), Ok(()));
    }
}
