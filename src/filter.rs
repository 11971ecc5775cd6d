use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::{status_text, DetailRecord, UnitAggregate};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    DateTime(DateTime<Utc>),
}

impl FieldValue {
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Text(value) => value.clone(),
            FieldValue::Integer(value) => value.to_string(),
            FieldValue::DateTime(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Named field access used by filters and the export projection.
pub trait Fields {
    fn field(&self, name: &str) -> Option<FieldValue>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Eq(String, String),
    Ne(String, String),
    Contains(String, String),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Ne(field.into(), value.into())
    }

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Contains(field.into(), value.into())
    }

    pub fn matches<F: Fields + ?Sized>(&self, row: &F) -> bool {
        match self {
            Filter::And(children) => children.iter().all(|child| child.matches(row)),
            Filter::Or(children) => children.iter().any(|child| child.matches(row)),
            Filter::Eq(field, expected) => row
                .field(field)
                .is_some_and(|value| value.as_text() == *expected),
            Filter::Ne(field, expected) => row
                .field(field)
                .map_or(true, |value| value.as_text() != *expected),
            Filter::Contains(field, needle) => row.field(field).is_some_and(|value| {
                value
                    .as_text()
                    .to_lowercase()
                    .contains(&needle.to_lowercase())
            }),
        }
    }

    /// Renders the tree as an OData v2 `$filter` expression.
    pub fn to_odata(&self) -> String {
        match self {
            Filter::And(children) => join_group(children, " and "),
            Filter::Or(children) => join_group(children, " or "),
            Filter::Eq(field, value) => format!("{field} eq {}", quote(value)),
            Filter::Ne(field, value) => format!("{field} ne {}", quote(value)),
            Filter::Contains(field, value) => format!("substringof({},{field})", quote(value)),
        }
    }
}

fn join_group(children: &[Filter], separator: &str) -> String {
    let parts: Vec<String> = children
        .iter()
        .map(|child| match child {
            Filter::And(nested) | Filter::Or(nested) if nested.len() > 1 => {
                format!("({})", child.to_odata())
            }
            _ => child.to_odata(),
        })
        .collect();
    parts.join(separator)
}

pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl Fields for Value {
    fn field(&self, name: &str) -> Option<FieldValue> {
        match self.get(name)? {
            Value::String(text) => Some(FieldValue::Text(text.clone())),
            Value::Number(number) => match number.as_i64() {
                Some(value) => Some(FieldValue::Integer(value)),
                None => Some(FieldValue::Text(number.to_string())),
            },
            Value::Bool(flag) => Some(FieldValue::Text(flag.to_string())),
            _ => None,
        }
    }
}

impl Fields for UnitAggregate {
    fn field(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "code" => FieldValue::Text(self.code.clone()),
            "text" => FieldValue::Text(self.text.clone()),
            "draft" => FieldValue::Integer(self.counts.draft),
            "pending_approval" => FieldValue::Integer(self.counts.pending_approval),
            "approved" => FieldValue::Integer(self.counts.approved),
            "self_approved" => FieldValue::Integer(self.counts.self_approved),
            "rejected" => FieldValue::Integer(self.counts.rejected),
            "total" => FieldValue::Integer(self.total),
            "no_action_yet" => FieldValue::Integer(self.no_action_yet),
            "population" => FieldValue::Integer(self.population.unwrap_or(0)),
            _ => return None,
        };
        Some(value)
    }
}

impl Fields for DetailRecord {
    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "person_id" => self.person_id.clone().map(FieldValue::Text),
            "unit_text" => self.unit_text.clone().map(FieldValue::Text),
            "status" => Some(FieldValue::Text(self.status.clone())),
            "status_text" => Some(FieldValue::Text(status_text(&self.status).to_string())),
            "last_modified" => self.last_modified.map(FieldValue::DateTime),
            "submitted_by" => self.submitted_by.clone().map(FieldValue::Text),
            "approver" => self.approver.clone().map(FieldValue::Text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluates_nested_trees() {
        let unit = json!({"externalCode": "IC1", "name": "Buildings", "status": "A"});
        let filter = Filter::And(vec![
            Filter::eq("status", "A"),
            Filter::Or(vec![
                Filter::contains("name", "build"),
                Filter::eq("externalCode", "IC9"),
            ]),
            Filter::ne("externalCode", "IC5"),
        ]);
        assert!(filter.matches(&unit));

        let excluded = json!({"externalCode": "IC5", "name": "Buildings", "status": "A"});
        assert!(!filter.matches(&excluded));
    }

    #[test]
    fn missing_fields_never_match_eq_or_contains() {
        let row = json!({"name": "x"});
        assert!(!Filter::eq("code", "x").matches(&row));
        assert!(!Filter::contains("code", "x").matches(&row));
        assert!(Filter::ne("code", "x").matches(&row));
        assert!(Filter::And(vec![]).matches(&row));
        assert!(!Filter::Or(vec![]).matches(&row));
    }

    #[test]
    fn numbers_compare_by_text() {
        let row = json!({"count": 3});
        assert!(Filter::eq("count", "3").matches(&row));
    }

    #[test]
    fn renders_odata_with_groups_and_quotes() {
        let filter = Filter::And(vec![
            Filter::eq("status", "A"),
            Filter::ne("externalCode", "O'NEIL"),
            Filter::Or(vec![
                Filter::contains("name", "dam"),
                Filter::eq("externalCode", "IC1"),
            ]),
        ]);
        assert_eq!(
            filter.to_odata(),
            "status eq 'A' and externalCode ne 'O''NEIL' and (substringof('dam',name) or externalCode eq 'IC1')"
        );
    }
}
