//! Employee record as stored in the `emps` table and exchanged over HTTP.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Typed shape of one `emps` row: `(id, firstname, lastname, age)`.
///
/// Rows are decoded straight into this tuple by the driver, so a column
/// whose CQL type differs from the expected one fails the decode instead of
/// being coerced.
pub type EmployeeRow = (String, Option<String>, Option<String>, Option<i32>);

/// A single employee record.
///
/// Absent fields are never defaulted: a record posted without `lastName` is
/// written with a null `lastname` column.
///
/// On output a field is omitted when it is empty, meaning absent or holding
/// its zero value (`""` for names, `0` for age). The stored value is not
/// touched: an age of `0` is still written as `0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    /// Primary key.
    pub id: String,
    /// Given name.
    #[serde(default, skip_serializing_if = "is_blank")]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default, skip_serializing_if = "is_blank")]
    pub last_name: Option<String>,
    /// Age in years.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub age: Option<i32>,
}

impl Employee {
    /// Creates a record carrying only its key.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            first_name: None,
            last_name: None,
            age: None,
        }
    }

    /// Sets the first name.
    #[must_use]
    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    /// Sets the last name.
    #[must_use]
    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    /// Sets the age.
    #[must_use]
    pub fn with_age(mut self, age: i32) -> Self {
        self.age = Some(age);
        self
    }

    /// Returns the bind values for the keyed `UPDATE`, in statement order:
    /// `firstname, lastname, age, id`.
    #[must_use]
    pub fn update_values(&self) -> (Option<String>, Option<String>, Option<i32>, String) {
        (
            self.first_name.clone(),
            self.last_name.clone(),
            self.age,
            self.id.clone(),
        )
    }
}

impl From<EmployeeRow> for Employee {
    fn from((id, first_name, last_name, age): EmployeeRow) -> Self {
        Self {
            id,
            first_name,
            last_name,
            age,
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

fn is_zero(value: &Option<i32>) -> bool {
    value.is_none_or(|age| age == 0)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn serializes_only_present_fields() {
        let emp = Employee::new("7").with_first_name("Ada");
        let Ok(json) = serde_json::to_string(&emp) else {
            panic!("serialization failed");
        };
        assert_eq!(json, r#"{"id":"7","firstName":"Ada"}"#);
    }

    #[test]
    fn empty_strings_are_omitted() {
        let emp = Employee::new("7").with_first_name("").with_age(41);
        let Ok(json) = serde_json::to_string(&emp) else {
            panic!("serialization failed");
        };
        assert_eq!(json, r#"{"id":"7","age":41}"#);
    }

    #[test]
    fn zero_age_is_omitted_like_empty_names() {
        let emp = Employee::new("7").with_last_name("").with_age(0);
        let Ok(json) = serde_json::to_string(&emp) else {
            panic!("serialization failed");
        };
        assert_eq!(json, r#"{"id":"7"}"#);
        assert_eq!(emp.update_values().2, Some(0));
    }

    #[test]
    fn missing_fields_stay_absent() {
        let Ok(emp) = serde_json::from_str::<Employee>(r#"{"id":"9","lastName":"Hopper"}"#)
        else {
            panic!("deserialization failed");
        };
        assert_eq!(emp.first_name, None);
        assert_eq!(emp.last_name.as_deref(), Some("Hopper"));
        assert_eq!(emp.age, None);
    }

    #[test]
    fn missing_id_is_rejected() {
        let result = serde_json::from_str::<Employee>(r#"{"firstName":"Ada"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn wrong_age_type_is_rejected() {
        let result = serde_json::from_str::<Employee>(r#"{"id":"1","age":"forty"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn row_conversion_keeps_nulls() {
        let row: EmployeeRow = ("3".to_string(), Some("Grace".to_string()), None, Some(85));
        let emp = Employee::from(row);
        assert_eq!(emp, Employee::new("3").with_first_name("Grace").with_age(85));
    }

    #[test]
    fn update_values_follow_statement_order() {
        let emp = Employee::new("5").with_last_name("Lovelace").with_age(36);
        let (first, last, age, id) = emp.update_values();
        assert_eq!(first, None);
        assert_eq!(last.as_deref(), Some("Lovelace"));
        assert_eq!(age, Some(36));
        assert_eq!(id, "5");
    }
}
