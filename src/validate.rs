//! Identifier validation for SQL injection prevention
//!
//! Table, column and view names end up unescaped inside generated SQL. Every
//! such name passes through here first: either a syntactic check
//! ([`validate_identifier`]) or membership in the live catalog
//! ([`ensure_allowed`]), usually both.

use crate::error::DatabaseError;

/// Longest identifier accepted (SQL Server's sysname limit)
const MAX_IDENTIFIER_LEN: usize = 128;

/// Keywords that could be exploited or cause confusion as bare names
const RESERVED: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TABLE", "INDEX", "VIEW",
    "TRIGGER", "PRAGMA", "ATTACH", "DETACH", "BEGIN", "COMMIT", "ROLLBACK", "VACUUM", "ANALYZE",
    "GRANT", "REVOKE", "EXEC", "EXECUTE", "TRUNCATE", "FROM", "WHERE", "JOIN", "UNION",
];

/// Validate an identifier for safe interpolation into SQL
///
/// ## Validation Rules
///
/// - **Length**: 1-128 characters
/// - **Characters**: Only alphanumeric and underscore `[a-zA-Z0-9_]`
/// - **Start character**: Must be letter or underscore (not digit)
/// - **Keywords**: Cannot be a statement keyword (SELECT, DROP, etc.)
///
/// ## Example
///
/// ```rust
/// use kodegen_dataset_views::validate::validate_identifier;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
///
/// validate_identifier("customer_orders")?;
/// validate_identifier("_staging")?;
///
/// # assert!(validate_identifier("orders; DROP TABLE orders").is_err());
/// # assert!(validate_identifier("orders'").is_err());
/// # assert!(validate_identifier("").is_err());
/// # assert!(validate_identifier("9lives").is_err());
/// # assert!(validate_identifier("select").is_err());
/// # Ok(())
/// # }
/// ```
pub fn validate_identifier(name: &str) -> Result<(), DatabaseError> {
    if name.is_empty() {
        return Err(DatabaseError::ValidationError(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(DatabaseError::ValidationError(format!(
            "Identifier too long: {} characters (max {})",
            name.len(),
            MAX_IDENTIFIER_LEN
        )));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::ValidationError(format!(
            "Invalid identifier: '{}'. Only alphanumeric and underscore allowed",
            name
        )));
    }

    if let Some(first_char) = name.chars().next()
        && first_char.is_ascii_digit()
    {
        return Err(DatabaseError::ValidationError(format!(
            "Identifier cannot start with digit: '{}'",
            name
        )));
    }

    if RESERVED.contains(&name.to_uppercase().as_str()) {
        return Err(DatabaseError::ValidationError(format!(
            "Identifier cannot be SQL keyword: '{}'",
            name
        )));
    }

    Ok(())
}

/// Check `name` against names reported by the schema introspector
///
/// Matching is case-insensitive, since the join grammar lowercases table
/// names while catalogs keep their declared case. Returns the catalog's
/// spelling of the name.
pub fn ensure_allowed<'a, S: AsRef<str>>(
    name: &str,
    allow_list: &'a [S],
) -> Result<&'a str, DatabaseError> {
    validate_identifier(name)?;
    allow_list
        .iter()
        .map(|s| s.as_ref())
        .find(|known| known.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            DatabaseError::ValidationError(format!(
                "'{}' is not a table in the connected database",
                name
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_injection_attempts() {
        for bad in ["users; DROP TABLE users", "users)", "users'", "users--", "a b"] {
            assert!(validate_identifier(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_rejects_overlong_identifier() {
        let long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(validate_identifier(&long).is_err());
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LEN)).is_ok());
    }

    #[test]
    fn test_allow_list_is_case_insensitive() {
        let tables = vec!["Orders".to_string(), "Customers".to_string()];
        assert!(matches!(ensure_allowed("orders", &tables), Ok("Orders")));
        assert!(ensure_allowed("invoices", &tables).is_err());
    }

    #[test]
    fn test_allow_list_still_checks_syntax() {
        let tables = vec!["odd name".to_string()];
        assert!(ensure_allowed("odd name", &tables).is_err());
    }
}
