//! Structured join representation

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of SQL join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// SQL keyword placed before `JOIN`
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One table-to-table join
///
/// `join_field` is assumed to name a column present in both tables. Nothing
/// here checks that; the session does when strict join fields are enabled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct JoinSpec {
    pub source_table: String,
    pub target_table: String,
    pub join_field: String,
    pub join_type: JoinType,
}

impl JoinSpec {
    pub fn new(
        source_table: impl Into<String>,
        target_table: impl Into<String>,
        join_field: impl Into<String>,
        join_type: JoinType,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            target_table: target_table.into(),
            join_field: join_field.into(),
            join_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_type_serializes_lowercase() {
        let spec = JoinSpec::new("orders", "customers", "customer_id", JoinType::Left);
        let json = serde_json::to_value(&spec).unwrap_or_default();
        assert_eq!(json["join_type"], "left");
        assert_eq!(JoinType::Full.to_string(), "FULL");
    }
}
