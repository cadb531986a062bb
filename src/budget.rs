//! Budget entry record and the inputs that create or modify it.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::error::ValidationError;

/// Bring a date to the form the store keeps: UTC with millisecond precision.
pub fn stored_date(date: OffsetDateTime) -> OffsetDateTime {
    let date = date.to_offset(UtcOffset::UTC);
    date - Duration::nanoseconds(i64::from(date.nanosecond() % 1_000_000))
}

/// A single titled monetary amount in a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetEntry {
    /// Store-assigned identifier.
    pub id: String,
    /// Short description.
    pub title: String,
    /// Monetary amount.
    pub amount: f64,
    /// Free-form category name.
    pub category: String,
    /// When the entry applies; defaults to creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// Validated fields for a budget that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBudget {
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub date: OffsetDateTime,
}

/// Body of a create request, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBudgetRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

impl CreateBudgetRequest {
    /// Validate required fields, defaulting `date` to `now`.
    ///
    /// `title`, `amount` and `category` must all be present and truthy: an
    /// empty string or a zero amount counts as missing.
    pub fn into_new_budget(self, now: OffsetDateTime) -> Result<NewBudget, ValidationError> {
        let mut missing = Vec::new();

        let title = self.title.filter(|t| !t.is_empty());
        if title.is_none() {
            missing.push("title");
        }
        let amount = self.amount.filter(|a| *a != 0.0 && !a.is_nan());
        if amount.is_none() {
            missing.push("amount");
        }
        let category = self.category.filter(|c| !c.is_empty());
        if category.is_none() {
            missing.push("category");
        }

        match (title, amount, category) {
            (Some(title), Some(amount), Some(category)) => {
                if !amount.is_finite() {
                    return Err(ValidationError::NonFiniteAmount);
                }
                Ok(NewBudget {
                    title,
                    amount,
                    category,
                    date: self.date.unwrap_or(now),
                })
            }
            _ => Err(ValidationError::MissingFields(missing)),
        }
    }
}

/// Fields supplied to an update. Absent or `null` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BudgetPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

impl BudgetPatch {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.date.is_none()
    }

    /// Reject values that would break the stored-record invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.as_deref() == Some("") {
            return Err(ValidationError::EmptyField("title"));
        }
        if self.category.as_deref() == Some("") {
            return Err(ValidationError::EmptyField("category"));
        }
        if self.amount.is_some_and(|a| !a.is_finite()) {
            return Err(ValidationError::NonFiniteAmount);
        }
        Ok(())
    }

    /// Overwrite the supplied fields of `entry`.
    pub fn apply_to(&self, entry: &mut BudgetEntry) {
        if let Some(title) = &self.title {
            entry.title = title.clone();
        }
        if let Some(amount) = self.amount {
            entry.amount = amount;
        }
        if let Some(category) = &self.category {
            entry.category = category.clone();
        }
        if let Some(date) = self.date {
            entry.date = date;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    fn request(
        title: Option<&str>,
        amount: Option<f64>,
        category: Option<&str>,
    ) -> CreateBudgetRequest {
        CreateBudgetRequest {
            title: title.map(String::from),
            amount,
            category: category.map(String::from),
            date: None,
        }
    }

    #[test]
    fn create_defaults_date_to_now() {
        let now = datetime!(2024-03-01 12:00 UTC);
        let budget = request(Some("Rent"), Some(1200.0), Some("Housing"))
            .into_new_budget(now)
            .unwrap();

        assert_eq!(
            budget,
            NewBudget {
                title: "Rent".into(),
                amount: 1200.0,
                category: "Housing".into(),
                date: now,
            }
        );
    }

    #[test]
    fn create_keeps_supplied_date() {
        let supplied = datetime!(2023-12-24 08:30 UTC);
        let mut req = request(Some("Gifts"), Some(80.0), Some("Holidays"));
        req.date = Some(supplied);

        let budget = req.into_new_budget(datetime!(2024-01-01 0:00 UTC)).unwrap();
        assert_eq!(budget.date, supplied);
    }

    #[test]
    fn create_rejects_missing_and_falsy_fields() {
        let now = OffsetDateTime::now_utc();

        let err = request(None, Some(10.0), Some("Food")).into_new_budget(now).unwrap_err();
        assert_eq!(err, ValidationError::MissingFields(vec!["title"]));

        let err = request(Some(""), Some(0.0), None).into_new_budget(now).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields(vec!["title", "amount", "category"])
        );
    }

    #[test]
    fn create_accepts_negative_amounts() {
        let budget = request(Some("Refund"), Some(-25.5), Some("Shopping"))
            .into_new_budget(OffsetDateTime::now_utc())
            .unwrap();
        assert_eq!(budget.amount, -25.5);
    }

    #[test]
    fn create_request_ignores_unknown_fields() {
        let req: CreateBudgetRequest = serde_json::from_str(
            r#"{"title":"Rent","amount":1200,"category":"Housing","_id":"abc","extra":true}"#,
        )
        .unwrap();
        assert_eq!(req.amount, Some(1200.0));
        assert!(req.date.is_none());
    }

    #[test]
    fn patch_from_json_treats_null_as_absent() {
        let patch: BudgetPatch = serde_json::from_str(r#"{"amount":500,"title":null}"#).unwrap();
        assert_eq!(
            patch,
            BudgetPatch {
                amount: Some(500.0),
                ..Default::default()
            }
        );
        assert!(!patch.is_empty());
        assert!(BudgetPatch::default().is_empty());
    }

    #[test]
    fn patch_validate_rejects_empty_text() {
        let patch = BudgetPatch {
            category: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(patch.validate(), Err(ValidationError::EmptyField("category")));
    }

    #[test]
    fn patch_changes_only_supplied_fields() {
        let mut entry = BudgetEntry {
            id: "65f0c0ffee0000000000abcd".into(),
            title: "Groceries".into(),
            amount: 150.0,
            category: "Food".into(),
            date: datetime!(2024-02-01 0:00 UTC),
        };
        let before = entry.clone();

        BudgetPatch {
            amount: Some(175.0),
            ..Default::default()
        }
        .apply_to(&mut entry);

        assert_eq!(entry.amount, 175.0);
        assert_eq!(entry.title, before.title);
        assert_eq!(entry.category, before.category);
        assert_eq!(entry.date, before.date);
        assert_eq!(entry.id, before.id);
    }

    #[test]
    fn stored_date_truncates_to_millis_in_utc() {
        let date = datetime!(2024-01-15 08:30:00.999999999 -05:00);
        let stored = stored_date(date);
        assert_eq!(stored, datetime!(2024-01-15 13:30:00.999 UTC));
        assert_eq!(stored.offset(), time::UtcOffset::UTC);
        assert_eq!(stored_date(stored), stored);
    }

    #[test]
    fn entry_serializes_date_as_rfc3339() {
        let entry = BudgetEntry {
            id: "65f0c0ffee0000000000abcd".into(),
            title: "Rent".into(),
            amount: 1200.0,
            category: "Housing".into(),
            date: datetime!(2024-03-01 12:00 UTC),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["date"], "2024-03-01T12:00:00Z");
        assert_eq!(value["id"], "65f0c0ffee0000000000abcd");
    }
}
