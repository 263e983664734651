//! Database-specific catalog queries
//!
//! Pure functions that return SQL text plus bind parameters for
//! introspecting tables, columns and keys, reading the connection identity,
//! checking object existence and building registry statements.
//!
//! These functions DO NOT execute queries; the introspector, connection
//! manager and executor run them.
//!
//! ## Parameter Placeholders
//!
//! - PostgreSQL: `$1`, `$2`, `$3` (positional)
//! - MySQL/MariaDB: `?` (positional)
//! - SQLite: `?` (positional; table-valued PRAGMA functions accept them too)
//! - SQL Server: `@P1`, `@P2`, `@P3` (named)
//!
//! ## Column Aliases
//!
//! Every query aliases its output to lower-case names (`column_name`,
//! `data_type`, `is_nullable`, `referred_table`, ...) and CASTs catalog
//! domain types to TEXT so rows decode uniformly through `sqlx::any`.

use crate::types::DatabaseType;

/// Placeholder for the `index`-th (1-based) bind parameter
///
/// ```rust
/// use kodegen_dataset_views::types::DatabaseType;
/// use kodegen_dataset_views::schema_queries::placeholder;
///
/// assert_eq!(placeholder(DatabaseType::Postgres, 2), "$2");
/// assert_eq!(placeholder(DatabaseType::SQLite, 2), "?");
/// assert_eq!(placeholder(DatabaseType::SqlServer, 2), "@P2");
/// ```
pub fn placeholder(db_type: DatabaseType, index: usize) -> String {
    match db_type {
        DatabaseType::Postgres => format!("${}", index),
        DatabaseType::MySQL | DatabaseType::MariaDB | DatabaseType::SQLite => "?".to_string(),
        DatabaseType::SqlServer => format!("@P{}", index),
    }
}

/// Returns the default schema name for each database type
///
/// MySQL/MariaDB have no static default (the current `DATABASE()` is used
/// inside the queries instead), so they return `None`.
pub fn get_default_schema(db_type: DatabaseType) -> Option<&'static str> {
    match db_type {
        DatabaseType::Postgres => Some("public"),
        DatabaseType::MySQL | DatabaseType::MariaDB => None,
        DatabaseType::SQLite => Some("main"),
        DatabaseType::SqlServer => Some("dbo"),
    }
}

/// Schema predicate + params for information_schema based dialects
fn schema_filter(
    db_type: DatabaseType,
    column: &str,
    schema: Option<&str>,
    index: usize,
) -> (String, Vec<String>) {
    match (db_type, schema) {
        (DatabaseType::MySQL | DatabaseType::MariaDB, None) => {
            (format!("{} = DATABASE()", column), vec![])
        }
        (_, schema) => {
            let schema = schema
                .or_else(|| get_default_schema(db_type))
                .unwrap_or("public");
            (
                format!("{} = {}", column, placeholder(db_type, index)),
                vec![schema.to_string()],
            )
        }
    }
}

/// Returns SQL to list base tables + parameters (output column `table_name`)
///
/// ```rust
/// use kodegen_dataset_views::types::DatabaseType;
/// use kodegen_dataset_views::schema_queries::get_tables_query;
///
/// let (sql, params) = get_tables_query(DatabaseType::Postgres, None);
/// assert!(sql.contains("table_schema = $1"));
/// assert_eq!(params, vec!["public".to_string()]);
/// ```
pub fn get_tables_query(db_type: DatabaseType, schema: Option<&str>) -> (String, Vec<String>) {
    match db_type {
        DatabaseType::SQLite => (
            "SELECT name AS table_name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name"
                .to_string(),
            vec![],
        ),
        _ => {
            let (filter, params) = schema_filter(db_type, "table_schema", schema, 1);
            let sql = format!(
                "SELECT CAST(table_name AS {}) AS table_name FROM information_schema.tables \
                 WHERE {} AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
                text_type(db_type),
                filter
            );
            (sql, params)
        }
    }
}

/// Returns SQL to get column information for a table + parameters
///
/// Output columns: `column_name`, `data_type`, `is_nullable` ("YES"/"NO").
/// SQLite uses the table-valued `pragma_table_info(?)` so the table name is
/// bound rather than interpolated.
pub fn get_columns_query(
    db_type: DatabaseType,
    schema: Option<&str>,
    table: &str,
) -> (String, Vec<String>) {
    match db_type {
        DatabaseType::SQLite => (
            "SELECT name AS column_name, type AS data_type, \
             CASE WHEN \"notnull\" = 0 THEN 'YES' ELSE 'NO' END AS is_nullable \
             FROM pragma_table_info(?) \
             ORDER BY cid"
                .to_string(),
            vec![table.to_string()],
        ),
        _ => {
            let (filter, mut params) = schema_filter(db_type, "table_schema", schema, 1);
            let text = text_type(db_type);
            let sql = format!(
                "SELECT \
                     CAST(column_name AS {text}) AS column_name, \
                     CAST(data_type AS {text}) AS data_type, \
                     CAST(is_nullable AS {text}) AS is_nullable \
                 FROM information_schema.columns \
                 WHERE {filter} AND table_name = {table_ph} \
                 ORDER BY ordinal_position",
                text = text,
                filter = filter,
                table_ph = placeholder(db_type, params.len() + 1),
            );
            params.push(table.to_string());
            (sql, params)
        }
    }
}

/// Returns SQL to list primary key columns (output column `column_name`)
pub fn get_primary_keys_query(
    db_type: DatabaseType,
    schema: Option<&str>,
    table: &str,
) -> Option<(String, Vec<String>)> {
    match db_type {
        DatabaseType::SQLite => Some((
            "SELECT name AS column_name FROM pragma_table_info(?) \
             WHERE pk > 0 ORDER BY pk"
                .to_string(),
            vec![table.to_string()],
        )),
        _ => {
            let (filter, mut params) = schema_filter(db_type, "tc.table_schema", schema, 1);
            let sql = format!(
                "SELECT CAST(kcu.column_name AS {text}) AS column_name \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name \
                  AND tc.table_schema = kcu.table_schema \
                  AND tc.table_name = kcu.table_name \
                 WHERE tc.constraint_type = 'PRIMARY KEY' AND {filter} \
                   AND tc.table_name = {table_ph} \
                 ORDER BY kcu.ordinal_position",
                text = text_type(db_type),
                filter = filter,
                table_ph = placeholder(db_type, params.len() + 1),
            );
            params.push(table.to_string());
            Some((sql, params))
        }
    }
}

/// Returns SQL to list foreign keys of a table
///
/// Output columns: `constraint_name`, `column_name`, `referred_table`,
/// `referred_column`.
pub fn get_foreign_keys_query(
    db_type: DatabaseType,
    schema: Option<&str>,
    table: &str,
) -> Option<(String, Vec<String>)> {
    match db_type {
        DatabaseType::SQLite => Some((
            "SELECT CAST(id AS TEXT) AS constraint_name, \"from\" AS column_name, \
             \"table\" AS referred_table, \"to\" AS referred_column \
             FROM pragma_foreign_key_list(?) \
             ORDER BY id, seq"
                .to_string(),
            vec![table.to_string()],
        )),
        DatabaseType::MySQL | DatabaseType::MariaDB => {
            let (filter, mut params) = schema_filter(db_type, "table_schema", schema, 1);
            let sql = format!(
                "SELECT constraint_name AS constraint_name, column_name AS column_name, \
                 referenced_table_name AS referred_table, \
                 referenced_column_name AS referred_column \
                 FROM information_schema.key_column_usage \
                 WHERE {} AND table_name = ? AND referenced_table_name IS NOT NULL \
                 ORDER BY constraint_name, ordinal_position",
                filter
            );
            params.push(table.to_string());
            Some((sql, params))
        }
        DatabaseType::Postgres | DatabaseType::SqlServer => {
            let (filter, mut params) = schema_filter(db_type, "tc.table_schema", schema, 1);
            let sql = format!(
                "SELECT \
                     CAST(tc.constraint_name AS {text}) AS constraint_name, \
                     CAST(kcu.column_name AS {text}) AS column_name, \
                     CAST(ccu.table_name AS {text}) AS referred_table, \
                     CAST(ccu.column_name AS {text}) AS referred_column \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name \
                  AND tc.table_schema = kcu.table_schema \
                 JOIN information_schema.constraint_column_usage ccu \
                   ON ccu.constraint_name = tc.constraint_name \
                  AND ccu.table_schema = tc.table_schema \
                 WHERE tc.constraint_type = 'FOREIGN KEY' AND {filter} \
                   AND tc.table_name = {table_ph} \
                 ORDER BY tc.constraint_name, kcu.ordinal_position",
                text = text_type(db_type),
                filter = filter,
                table_ph = placeholder(db_type, params.len() + 1),
            );
            params.push(table.to_string());
            Some((sql, params))
        }
    }
}

/// Returns SQL reading `server_name`, `database_name`, `user_name`
///
/// SQLite has no server-side identity; the connection manager builds it from
/// the profile and this returns `None`.
pub fn get_identity_query(db_type: DatabaseType) -> Option<&'static str> {
    match db_type {
        DatabaseType::Postgres => Some(
            "SELECT \
                 CAST(COALESCE(CAST(inet_server_addr() AS TEXT), 'localhost') AS TEXT) AS server_name, \
                 CAST(current_database() AS TEXT) AS database_name, \
                 CAST(current_user AS TEXT) AS user_name",
        ),
        DatabaseType::MySQL | DatabaseType::MariaDB => Some(
            "SELECT @@hostname AS server_name, DATABASE() AS database_name, \
             CURRENT_USER() AS user_name",
        ),
        DatabaseType::SqlServer => Some(
            "SELECT @@SERVERNAME AS server_name, DB_NAME() AS database_name, \
             SYSTEM_USER AS user_name",
        ),
        DatabaseType::SQLite => None,
    }
}

/// Returns SQL counting objects (tables or views) with the given name
///
/// Output column `found` is 0 when the object does not exist. SQL Server uses
/// the `OBJECT_ID` scalar lookup. Names compare case-insensitively elsewhere:
/// PostgreSQL folds an unquoted `CREATE VIEW CustomerOrders` to
/// `customerorders`, and SQLite identifiers ignore case.
///
/// ```rust
/// use kodegen_dataset_views::types::DatabaseType;
/// use kodegen_dataset_views::schema_queries::get_object_exists_query;
///
/// let (sql, params) = get_object_exists_query(DatabaseType::SqlServer, None, "sales_view");
/// assert!(sql.contains("OBJECT_ID(@P1)"));
/// assert_eq!(params, vec!["sales_view".to_string()]);
/// ```
pub fn get_object_exists_query(
    db_type: DatabaseType,
    schema: Option<&str>,
    name: &str,
) -> (String, Vec<String>) {
    match db_type {
        DatabaseType::SQLite => (
            "SELECT COUNT(*) AS found FROM sqlite_master \
             WHERE type IN ('table', 'view') AND name = ? COLLATE NOCASE"
                .to_string(),
            vec![name.to_string()],
        ),
        DatabaseType::SqlServer => (
            "SELECT CASE WHEN OBJECT_ID(@P1) IS NULL THEN 0 ELSE 1 END AS found".to_string(),
            vec![name.to_string()],
        ),
        _ => {
            let (filter, mut params) = schema_filter(db_type, "table_schema", schema, 1);
            let sql = format!(
                "SELECT COUNT(*) AS found FROM information_schema.tables \
                 WHERE {} AND LOWER(table_name) = LOWER({})",
                filter,
                placeholder(db_type, params.len() + 1)
            );
            params.push(name.to_string());
            (sql, params)
        }
    }
}

/// Text type used in CASTs for each dialect
fn text_type(db_type: DatabaseType) -> &'static str {
    match db_type {
        DatabaseType::MySQL | DatabaseType::MariaDB => "CHAR",
        DatabaseType::SqlServer => "NVARCHAR(256)",
        DatabaseType::Postgres | DatabaseType::SQLite => "TEXT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_defaults_to_current_database() {
        let (sql, params) = get_tables_query(DatabaseType::MySQL, None);
        assert!(sql.contains("table_schema = DATABASE()"));
        assert!(params.is_empty());

        let (sql, params) = get_tables_query(DatabaseType::MySQL, Some("crm"));
        assert!(sql.contains("table_schema = ?"));
        assert_eq!(params, vec!["crm".to_string()]);
    }

    #[test]
    fn test_columns_query_binds_table_name() {
        let (sql, params) = get_columns_query(DatabaseType::Postgres, None, "orders");
        assert!(sql.contains("table_name = $2"));
        assert_eq!(params, vec!["public".to_string(), "orders".to_string()]);

        let (sql, params) = get_columns_query(DatabaseType::SQLite, None, "orders");
        assert!(sql.contains("pragma_table_info(?)"));
        assert!(!sql.contains("orders"));
        assert_eq!(params, vec!["orders".to_string()]);
    }

    #[test]
    fn test_sql_server_uses_named_placeholders() {
        let (sql, params) = get_columns_query(DatabaseType::SqlServer, None, "orders");
        assert!(sql.contains("table_schema = @P1"));
        assert!(sql.contains("table_name = @P2"));
        assert_eq!(params, vec!["dbo".to_string(), "orders".to_string()]);
    }

    #[test]
    fn test_key_queries_exist_for_every_dialect() {
        for db in [
            DatabaseType::Postgres,
            DatabaseType::MySQL,
            DatabaseType::SQLite,
            DatabaseType::SqlServer,
        ] {
            assert!(get_primary_keys_query(db, None, "t").is_some(), "{db}");
            assert!(get_foreign_keys_query(db, None, "t").is_some(), "{db}");
        }
    }

    #[test]
    fn test_object_exists_ignores_case() {
        let (sql, params) = get_object_exists_query(DatabaseType::Postgres, None, "CustomerOrders");
        assert!(sql.contains("table_schema = $1"));
        assert!(sql.contains("LOWER(table_name) = LOWER($2)"));
        assert_eq!(params, vec!["public".to_string(), "CustomerOrders".to_string()]);

        let (sql, _) = get_object_exists_query(DatabaseType::MySQL, None, "CustomerOrders");
        assert!(sql.contains("LOWER(table_name) = LOWER(?)"));

        let (sql, _) = get_object_exists_query(DatabaseType::SQLite, None, "CustomerOrders");
        assert!(sql.contains("name = ? COLLATE NOCASE"));
    }

    #[test]
    fn test_identity_queries() {
        assert!(get_identity_query(DatabaseType::SQLite).is_none());
        let sql = get_identity_query(DatabaseType::SqlServer).unwrap_or_default();
        assert!(sql.contains("DB_NAME()"));
        assert!(sql.contains("@@SERVERNAME"));
        assert!(sql.contains("SYSTEM_USER"));
    }
}
