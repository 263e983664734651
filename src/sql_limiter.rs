//! Bounded preview queries for tables and views

use crate::error::DatabaseError;
use crate::types::DatabaseType;
use crate::validate::validate_identifier;

/// Build a bounded `SELECT *` preview of a table or view
///
/// For SQL Server: `SELECT TOP n * FROM object`
/// For PostgreSQL, MySQL, MariaDB, SQLite: `SELECT * FROM object LIMIT n`
///
/// The object name is interpolated, so it must pass identifier validation.
///
/// # Examples
/// ```
/// # use kodegen_dataset_views::sql_limiter::sample_query;
/// # use kodegen_dataset_views::types::DatabaseType;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// assert_eq!(sample_query("sales_v", 5, DatabaseType::SqlServer)?, "SELECT TOP 5 * FROM sales_v");
/// assert_eq!(sample_query("sales_v", 5, DatabaseType::SQLite)?, "SELECT * FROM sales_v LIMIT 5");
/// # Ok(())
/// # }
/// ```
pub fn sample_query(
    object: &str,
    max_rows: usize,
    db_type: DatabaseType,
) -> Result<String, DatabaseError> {
    validate_identifier(object)?;

    if max_rows == 0 {
        return Err(DatabaseError::ValidationError(
            "Sample size must be at least 1 row".to_string(),
        ));
    }

    Ok(match db_type {
        DatabaseType::SqlServer => format!("SELECT TOP {} * FROM {}", max_rows, object),
        DatabaseType::Postgres
        | DatabaseType::MySQL
        | DatabaseType::MariaDB
        | DatabaseType::SQLite => format!("SELECT * FROM {} LIMIT {}", object, max_rows),
    })
}
