//! SQL parsing utilities: code-fence cleanup, statement classification,
//! view-name extraction and relation discovery
//!
//! Uses the sqlparser crate wherever a real parse is needed.

use crate::error::DatabaseError;
use crate::types::DatabaseType;
use lazy_regex::{Lazy, Regex, lazy_regex};
use sqlparser::ast::{ObjectName, Statement, visit_relations};
use sqlparser::dialect::{Dialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;
use std::collections::BTreeSet;
use std::ops::ControlFlow;

// Compile-time validated regexes
static CREATE_VIEW_PREFIX: Lazy<Regex> = lazy_regex!(r"(?i)^CREATE\s+VIEW\b");
static CREATE_VIEW_NAME: Lazy<Regex> = lazy_regex!(
    r#"(?i)^\s*CREATE\s+(?:OR\s+(?:REPLACE|ALTER)\s+)?VIEW\s+(?:IF\s+NOT\s+EXISTS\s+)?([\w\.\[\]"`]+)"#
);

/// Get appropriate SQL dialect for the database type
fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::Postgres => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySQL | DatabaseType::MariaDB => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
        DatabaseType::SqlServer => Box::new(MsSqlDialect {}),
    }
}

/// How the executor treats a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Starts with SELECT: executed as a read, returns rows
    Read,
    /// Starts with CREATE VIEW: executed, then verified in the catalog
    CreateView,
    /// Anything else: executed inside a transaction, returns nothing
    Write,
}

/// Remove markdown code-fence markup that generated SQL sometimes carries
///
/// Every "```sql" and "```" occurrence is removed, then the result trimmed.
///
/// ```
/// # use kodegen_dataset_views::sql_parser::strip_code_fences;
/// assert_eq!(strip_code_fences("```sql\nSELECT 1\n```"), "SELECT 1");
/// assert_eq!(strip_code_fences("  SELECT 1; "), "SELECT 1;");
/// ```
pub fn strip_code_fences(sql: &str) -> String {
    sql.replace("```sql", "")
        .replace("```SQL", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Classify an already fence-stripped statement by its leading keywords
///
/// ```
/// # use kodegen_dataset_views::sql_parser::{classify_statement, StatementKind};
/// assert_eq!(classify_statement("select * from t"), StatementKind::Read);
/// assert_eq!(classify_statement("CREATE VIEW v AS SELECT 1"), StatementKind::CreateView);
/// assert_eq!(classify_statement("INSERT INTO t VALUES (1)"), StatementKind::Write);
/// ```
pub fn classify_statement(sql: &str) -> StatementKind {
    let trimmed = sql.trim_start();
    if trimmed
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("SELECT"))
    {
        StatementKind::Read
    } else if CREATE_VIEW_PREFIX.is_match(trimmed) {
        StatementKind::CreateView
    } else {
        StatementKind::Write
    }
}

/// Name of the view a CREATE VIEW statement creates, without schema or quotes
///
/// Falls back to the third whitespace-separated token when the statement
/// does not match the expected shape.
///
/// ```
/// # use kodegen_dataset_views::sql_parser::create_view_name;
/// assert_eq!(create_view_name("CREATE VIEW dbo.[SalesView] AS SELECT 1").as_deref(), Some("SalesView"));
/// assert_eq!(create_view_name("create or replace view v1 as select 1").as_deref(), Some("v1"));
/// assert_eq!(create_view_name("SELECT 1"), None);
/// ```
pub fn create_view_name(sql: &str) -> Option<String> {
    let raw = match CREATE_VIEW_NAME.captures(sql) {
        Some(caps) => caps.get(1).map(|m| m.as_str().to_string()),
        None => {
            if classify_statement(sql) != StatementKind::CreateView {
                return None;
            }
            sql.split_whitespace().nth(2).map(|s| s.to_string())
        }
    }?;
    let name = unqualify(&raw);
    (!name.is_empty()).then_some(name)
}

/// Parse SQL that must consist of exactly one statement
pub fn parse_single_statement(sql: &str, db_type: DatabaseType) -> Result<Statement, DatabaseError> {
    let dialect = get_dialect(db_type);
    let mut statements = Parser::parse_sql(&*dialect, sql)
        .map_err(|e| DatabaseError::GenerationError(format!("SQL parse error: {}", e)))?;

    match statements.len() {
        1 => Ok(statements.remove(0)),
        0 => Err(DatabaseError::GenerationError(
            "No SQL statement provided".to_string(),
        )),
        n => Err(DatabaseError::GenerationError(format!(
            "Expected a single statement, found {}",
            n
        ))),
    }
}

/// A relation named in a statement, unquoted
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RelationName {
    /// Schema the name was qualified with, if any
    pub schema: Option<String>,
    pub name: String,
}

/// Every table/view a statement reads from
pub fn referenced_relations(statement: &Statement) -> BTreeSet<RelationName> {
    let mut relations = BTreeSet::new();
    let _ = visit_relations(statement, |relation: &ObjectName| {
        let full = relation.to_string();
        let schema = full
            .rsplit_once('.')
            .map(|(qualifier, _)| unqualify(qualifier))
            .filter(|q| !q.is_empty());
        relations.insert(RelationName {
            schema,
            name: unqualify(&full),
        });
        ControlFlow::<()>::Continue(())
    });
    relations
}

/// Last dotted segment with identifier quoting removed
fn unqualify(name: &str) -> String {
    name.rsplit('.')
        .next()
        .unwrap_or(name)
        .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
        .to_string()
}
