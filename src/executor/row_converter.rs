//! Row to typed struct conversion for SQL results
//!
//! Converts sqlx AnyRow instances into [`SqlRow`] values. Dispatch is on the
//! type of each value, not the column: SQLite declares no type for
//! expression columns such as `COUNT(*)`. The Any driver reports a small set
//! of type names (NULL, BOOLEAN, SMALLINT, INTEGER, BIGINT, REAL, DOUBLE,
//! TEXT, BLOB); the native spellings are accepted too.

use crate::error::DatabaseError;
use crate::types::{QueryResult, SqlColumnValue, SqlRow, SqlValue};
use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Convert a sqlx Row to a typed SqlRow structure
///
/// # Errors
/// `ExecutionError` if a column has an unsupported type or fails to decode
pub fn row_to_typed(row: &AnyRow) -> Result<SqlRow, DatabaseError> {
    let mut columns = Vec::with_capacity(row.columns().len());

    for column in row.columns() {
        let ordinal = column.ordinal();
        let name = column.name().to_string();
        let raw = row.try_get_raw(ordinal).map_err(|e| {
            DatabaseError::ExecutionError(format!("Failed to read column '{}': {}", name, e))
        })?;
        if raw.is_null() {
            columns.push(SqlColumnValue {
                name,
                value: SqlValue::Null,
            });
            continue;
        }
        let type_name = raw.type_info().name().to_string();

        let decode_err = |kind: &str, e: sqlx::Error| {
            DatabaseError::ExecutionError(format!(
                "Failed to extract column '{}' as {}: {}",
                name, kind, e
            ))
        };

        let value = match type_name.to_uppercase().as_str() {
            "TEXT" | "VARCHAR" | "CHAR" | "STRING" | "BPCHAR" | "NAME" | "CITEXT" | "NVARCHAR"
            | "JSON" | "JSONB" | "UUID" | "TIMESTAMP" | "TIMESTAMPTZ" | "DATETIME" | "DATE"
            | "TIME" => row
                .try_get::<Option<String>, _>(ordinal)
                .map_err(|e| decode_err("TEXT", e))?
                .map_or(SqlValue::Null, SqlValue::Text),
            "SMALLINT" | "INTEGER" | "INT" | "INT2" | "INT4" | "INT8" | "BIGINT" | "MEDIUMINT" => {
                row.try_get::<Option<i64>, _>(ordinal)
                    .map_err(|e| decode_err("INTEGER", e))?
                    .map_or(SqlValue::Null, SqlValue::Int)
            }
            "BOOLEAN" | "BOOL" => row
                .try_get::<Option<bool>, _>(ordinal)
                .map_err(|e| decode_err("BOOLEAN", e))?
                .map_or(SqlValue::Null, SqlValue::Bool),
            "REAL" | "FLOAT4" => row
                .try_get::<Option<f32>, _>(ordinal)
                .map_err(|e| decode_err("REAL", e))?
                .map_or(SqlValue::Null, |v| SqlValue::Float(f64::from(v))),
            "DOUBLE" | "FLOAT" | "FLOAT8" | "DOUBLE PRECISION" => row
                .try_get::<Option<f64>, _>(ordinal)
                .map_err(|e| decode_err("DOUBLE", e))?
                .map_or(SqlValue::Null, SqlValue::Float),
            // DECIMAL/NUMERIC - try as f64 first, fall back to string
            "NUMERIC" | "DECIMAL" | "NUMBER" => match row.try_get::<Option<f64>, _>(ordinal) {
                Ok(v) => v.map_or(SqlValue::Null, SqlValue::Float),
                Err(_) => row
                    .try_get::<Option<String>, _>(ordinal)
                    .map_err(|e| decode_err("DECIMAL", e))?
                    .map_or(SqlValue::Null, SqlValue::Text),
            },
            "BLOB" | "BYTEA" | "BINARY" | "VARBINARY" => row
                .try_get::<Option<Vec<u8>>, _>(ordinal)
                .map_err(|e| decode_err("BLOB", e))?
                .map_or(SqlValue::Null, SqlValue::Blob),
            _ => {
                return Err(DatabaseError::ExecutionError(format!(
                    "Unsupported column type '{}' for column '{}'. \
                     Consider casting this column in your query: CAST({} AS TEXT)",
                    type_name, name, name
                )));
            }
        };

        columns.push(SqlColumnValue { name, value });
    }

    Ok(SqlRow { columns })
}

/// Convert a full result set, taking column names from the first row
pub fn rows_to_result(rows: &[AnyRow]) -> Result<QueryResult, DatabaseError> {
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect()
        })
        .unwrap_or_default();

    let rows = rows
        .iter()
        .map(row_to_typed)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QueryResult { columns, rows })
}
