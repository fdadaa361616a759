//! Expense records and their explicit update operations.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{ExpenseId, OwnerId};

/// Status given to freshly ingested expenses when the caller has none.
pub const DEFAULT_STATUS: &str = "pending";

/// One user expense as stored in the remote `expenses` table.
///
/// Fields are public so stores and tests can build records directly; use
/// [`ExpenseRecord::new`] + [`ExpenseRecord::validate`] when the input is untrusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub id: ExpenseId,
    #[serde(rename = "user_id")]
    pub owner_id: OwnerId,
    /// ISO-8601 date (`2024-03-01`) or RFC 3339 timestamp.
    pub date: String,
    pub amount: f64,
    pub category: String,
    /// Free-form workflow status (`pending`, `approved`, ...).
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ExpenseRecord {
    /// Build a validated record with the default status and no optional fields.
    pub fn new(
        id: ExpenseId,
        owner_id: OwnerId,
        date: impl Into<String>,
        amount: f64,
        category: impl Into<String>,
    ) -> DomainResult<Self> {
        let record = Self {
            id,
            owner_id,
            date: date.into(),
            amount,
            category: category.into(),
            status: DEFAULT_STATUS.to_string(),
            merchant: None,
            notes: None,
            created_at: None,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    /// Check every record invariant.
    pub fn validate(&self) -> DomainResult<()> {
        validate_amount(self.amount)?;
        validate_timestamp("date", &self.date)?;
        if let Some(created_at) = &self.created_at {
            validate_timestamp("created_at", created_at)?;
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::validation("category must not be blank"));
        }
        Ok(())
    }

    /// Apply an explicit update. The identifier and owner never change.
    ///
    /// The update is applied to a copy first so a rejected update leaves `self` untouched.
    pub fn apply(&mut self, update: ExpenseUpdate) -> DomainResult<()> {
        let mut next = self.clone();
        if let Some(date) = update.date {
            next.date = date;
        }
        if let Some(amount) = update.amount {
            next.amount = amount;
        }
        if let Some(category) = update.category {
            next.category = category;
        }
        if let Some(status) = update.status {
            next.status = status;
        }
        if let Some(merchant) = update.merchant {
            next.merchant = merchant;
        }
        if let Some(notes) = update.notes {
            next.notes = notes;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// Partial update of an expense. `None` leaves the field unchanged.
///
/// For the optional columns, `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

impl ExpenseUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn merchant(mut self, merchant: Option<String>) -> Self {
        self.merchant = Some(merchant);
        self
    }

    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = Some(notes);
        self
    }
}

/// Amounts must be finite and non-negative.
pub fn validate_amount(amount: f64) -> DomainResult<()> {
    if amount.is_nan() {
        return Err(DomainError::validation("amount is NaN"));
    }
    if amount.is_infinite() {
        return Err(DomainError::validation("amount is not finite"));
    }
    if amount < 0.0 {
        return Err(DomainError::validation(format!("amount {amount} is negative")));
    }
    Ok(())
}

fn validate_timestamp(field: &str, value: &str) -> DomainResult<()> {
    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(value).is_ok()
    {
        return Ok(());
    }
    Err(DomainError::validation(format!(
        "{field} '{value}' is not an ISO-8601 date or RFC 3339 timestamp"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(amount: f64) -> DomainResult<ExpenseRecord> {
        ExpenseRecord::new(
            ExpenseId::parse("exp-1").unwrap(),
            OwnerId::parse("owner-1").unwrap(),
            "2024-03-01",
            amount,
            "Food",
        )
    }

    #[test]
    fn new_record_gets_default_status() {
        let r = record(12.5).unwrap();
        assert_eq!(r.status, DEFAULT_STATUS);
        assert_eq!(r.id.as_str(), "exp-1");
    }

    #[test]
    fn rejects_negative_and_non_finite_amounts() {
        assert!(record(-0.01).is_err());
        assert!(record(f64::NAN).is_err());
        assert!(record(f64::INFINITY).is_err());
        assert!(record(0.0).is_ok());
    }

    #[test]
    fn accepts_rfc3339_and_rejects_garbage_dates() {
        let mut r = record(1.0).unwrap();
        r.date = "2024-03-01T10:15:00Z".to_string();
        assert!(r.validate().is_ok());
        r.date = "yesterday".to_string();
        assert!(matches!(r.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn apply_updates_fields_and_keeps_identity() {
        let mut r = record(10.0).unwrap().with_merchant("Cafe");
        r.apply(
            ExpenseUpdate::default()
                .amount(12.0)
                .category("Transport")
                .merchant(None),
        )
        .unwrap();

        assert_eq!(r.id.as_str(), "exp-1");
        assert_eq!(r.amount, 12.0);
        assert_eq!(r.category, "Transport");
        assert_eq!(r.merchant, None);
    }

    #[test]
    fn rejected_update_leaves_record_unchanged() {
        let mut r = record(10.0).unwrap();
        let before = r.clone();
        assert!(r.apply(ExpenseUpdate::default().amount(-5.0)).is_err());
        assert_eq!(r, before);
    }

    #[test]
    fn deserializes_backend_row() {
        let row = serde_json::json!({
            "id": "exp-9",
            "user_id": "owner-1",
            "date": "2024-01-31",
            "amount": 42.0,
            "category": "Office",
            "status": "approved",
            "merchant": "Paper Co"
        });
        let r: ExpenseRecord = serde_json::from_value(row).unwrap();
        assert_eq!(r.owner_id.as_str(), "owner-1");
        assert_eq!(r.merchant.as_deref(), Some("Paper Co"));
        assert_eq!(r.notes, None);
    }

    proptest! {
        #[test]
        fn any_non_negative_finite_amount_is_valid(amount in 0.0f64..1.0e12) {
            prop_assert!(validate_amount(amount).is_ok());
        }
    }
}
