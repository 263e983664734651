//! Syntactic pre-check for join descriptions
//!
//! Rules run in order and the first failure wins. Table and field existence
//! is not checked here.

use lazy_regex::{Lazy, Regex, lazy_regex};
use thiserror::Error;

static TABLE_PAIR: Lazy<Regex> = lazy_regex!(r"join\s+(\w+)\s+table\s+with\s+(\w+)\s+table");
static JOIN_FIELD: Lazy<Regex> = lazy_regex!(r"using\s+(\w+)");

const REQUIRED_KEYWORDS: [&str; 4] = ["join", "table", "with", "using"];

/// Why a join description was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinConditionError {
    #[error("join condition cannot be empty")]
    Empty,

    #[error("join condition must include 'join', 'table', 'with', and 'using' keywords")]
    MissingKeywords,

    #[error("invalid table name format")]
    InvalidTableFormat,

    #[error("invalid join field format")]
    InvalidFieldFormat,
}

/// Check that `text` looks like `join <a> table with <b> table using <field>`
///
/// ```
/// # use kodegen_dataset_views::join::{validate_join_condition, JoinConditionError};
/// assert!(validate_join_condition("Join orders table with customers table using customer_id").is_ok());
/// assert_eq!(validate_join_condition("   "), Err(JoinConditionError::Empty));
/// ```
pub fn validate_join_condition(text: &str) -> Result<(), JoinConditionError> {
    if text.trim().is_empty() {
        return Err(JoinConditionError::Empty);
    }

    let lowered = text.to_lowercase();

    if !REQUIRED_KEYWORDS.iter().all(|kw| lowered.contains(kw)) {
        return Err(JoinConditionError::MissingKeywords);
    }

    if !TABLE_PAIR.is_match(&lowered) {
        return Err(JoinConditionError::InvalidTableFormat);
    }

    if !JOIN_FIELD.is_match(&lowered) {
        return Err(JoinConditionError::InvalidFieldFormat);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_condition() {
        let err = validate_join_condition("");
        assert_eq!(err, Err(JoinConditionError::Empty));
        assert!(JoinConditionError::Empty.to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_valid_condition() {
        assert_eq!(
            validate_join_condition("Join orders table with customers table using customer_id"),
            Ok(())
        );
    }

    #[test]
    fn test_missing_keyword() {
        assert_eq!(
            validate_join_condition("join orders table with customers table on customer_id"),
            Err(JoinConditionError::MissingKeywords)
        );
        assert_eq!(
            JoinConditionError::MissingKeywords.to_string(),
            "join condition must include 'join', 'table', 'with', and 'using' keywords"
        );
    }

    #[test]
    fn test_bad_table_format() {
        assert_eq!(
            validate_join_condition("join orders with customers table using id"),
            Err(JoinConditionError::InvalidTableFormat)
        );
    }

    #[test]
    fn test_bad_field_format() {
        // "using" is present but not followed by an identifier
        assert_eq!(
            validate_join_condition("join orders table with customers table using"),
            Err(JoinConditionError::InvalidFieldFormat)
        );
    }

    #[test]
    fn test_keywords_matched_as_substrings() {
        // "joined" satisfies the keyword check, the table pattern still fails
        assert_eq!(
            validate_join_condition("joined tables with ids using x"),
            Err(JoinConditionError::InvalidTableFormat)
        );
    }
}
