//! Column statistics for a dataset view

use crate::connection::ConnectionManager;
use crate::error::DatabaseError;
use crate::executor::QueryExecutor;
use crate::types::{QueryResult, SqlValue};
use serde::Serialize;
use std::collections::HashSet;

/// Statistics of one column over the sampled rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub column: String,
    /// integer, float, boolean, text, blob, mixed, or null when every value is NULL
    pub inferred_type: String,
    pub total_rows: usize,
    pub null_count: usize,
    pub null_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    /// Sample standard deviation (n - 1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_values: Option<usize>,
}

/// Profile of a whole view sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProfile {
    pub view_name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnProfile>,
}

/// Sample up to `profile_rows` rows of `view_name` and profile them
pub async fn profile_dataset(
    conn: &ConnectionManager,
    view_name: &str,
) -> Result<DatasetProfile, DatabaseError> {
    let sample = QueryExecutor::new(conn)
        .sample(view_name, conn.config().profile_rows)
        .await?;

    if sample.is_empty() {
        log::warn!("No data found in view: {}", view_name);
    }

    let columns = profile_result(&sample);
    Ok(DatasetProfile {
        view_name: view_name.to_string(),
        row_count: sample.row_count(),
        column_count: sample.columns.len(),
        columns,
    })
}

/// Per-column statistics of a result set
pub fn profile_result(result: &QueryResult) -> Vec<ColumnProfile> {
    result
        .columns
        .iter()
        .map(|column| profile_column(column, result))
        .collect()
}

fn profile_column(column: &str, result: &QueryResult) -> ColumnProfile {
    let values: Vec<&SqlValue> = result.column_values(column).collect();
    let total_rows = result.row_count();
    let null_count = values.iter().filter(|v| v.is_null()).count() + (total_rows - values.len());
    let null_percentage = if total_rows == 0 {
        0.0
    } else {
        null_count as f64 / total_rows as f64 * 100.0
    };

    let present: Vec<&SqlValue> = values.into_iter().filter(|v| !v.is_null()).collect();
    let inferred_type = infer_type(&present);

    let mut profile = ColumnProfile {
        column: column.to_string(),
        inferred_type: inferred_type.to_string(),
        total_rows,
        null_count,
        null_percentage,
        min: None,
        max: None,
        mean: None,
        median: None,
        std_dev: None,
        unique_values: None,
    };

    match inferred_type {
        "integer" | "float" => {
            let mut numbers: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
            numbers.sort_by(f64::total_cmp);
            profile.min = numbers.first().copied();
            profile.max = numbers.last().copied();
            profile.mean = mean(&numbers);
            profile.median = median(&numbers);
            profile.std_dev = sample_std_dev(&numbers);
        }
        "text" => {
            let unique: HashSet<&str> = present
                .iter()
                .filter_map(|v| match v {
                    SqlValue::Text(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            profile.unique_values = Some(unique.len());
        }
        _ => {}
    }

    profile
}

fn infer_type(values: &[&SqlValue]) -> &'static str {
    let mut kinds = values.iter().map(|v| match v {
        SqlValue::Int(_) => "integer",
        SqlValue::Float(_) => "float",
        SqlValue::Bool(_) => "boolean",
        SqlValue::Text(_) => "text",
        SqlValue::Blob(_) => "blob",
        SqlValue::Null => "null",
    });

    let Some(first) = kinds.next() else {
        return "null";
    };
    kinds.fold(first, |acc, kind| match (acc, kind) {
        (a, b) if a == b => a,
        ("integer", "float") | ("float", "integer") => "float",
        _ => "mixed",
    })
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

// Expects sorted input
fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SqlColumnValue, SqlRow};

    fn result(rows: Vec<Vec<(&str, SqlValue)>>) -> QueryResult {
        let columns = rows
            .first()
            .map(|r| r.iter().map(|(n, _)| n.to_string()).collect())
            .unwrap_or_default();
        QueryResult {
            columns,
            rows: rows
                .into_iter()
                .map(|r| SqlRow {
                    columns: r
                        .into_iter()
                        .map(|(name, value)| SqlColumnValue {
                            name: name.to_string(),
                            value,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_numeric_statistics() {
        let data = result(vec![
            vec![("total", SqlValue::Int(2))],
            vec![("total", SqlValue::Float(4.0))],
            vec![("total", SqlValue::Null)],
            vec![("total", SqlValue::Int(4))],
            vec![("total", SqlValue::Int(6))],
        ]);
        let profiles = profile_result(&data);
        let p = &profiles[0];

        assert_eq!(p.inferred_type, "float");
        assert_eq!(p.total_rows, 5);
        assert_eq!(p.null_count, 1);
        assert!((p.null_percentage - 20.0).abs() < 1e-9);
        assert_eq!(p.min, Some(2.0));
        assert_eq!(p.max, Some(6.0));
        assert_eq!(p.mean, Some(4.0));
        assert_eq!(p.median, Some(4.0));
        // sample variance of [2, 4, 4, 6] is 8/3
        assert!(p.std_dev.is_some_and(|s| (s - (8.0f64 / 3.0).sqrt()).abs() < 1e-9));
        assert_eq!(p.unique_values, None);
    }

    #[test]
    fn test_text_unique_count() {
        let data = result(vec![
            vec![("region", SqlValue::Text("north".into()))],
            vec![("region", SqlValue::Text("south".into()))],
            vec![("region", SqlValue::Text("north".into()))],
        ]);
        let p = &profile_result(&data)[0];
        assert_eq!(p.inferred_type, "text");
        assert_eq!(p.unique_values, Some(2));
        assert_eq!(p.mean, None);
    }

    #[test]
    fn test_all_null_and_mixed() {
        let data = result(vec![
            vec![("a", SqlValue::Null), ("b", SqlValue::Int(1))],
            vec![("a", SqlValue::Null), ("b", SqlValue::Text("x".into()))],
        ]);
        let profiles = profile_result(&data);
        assert_eq!(profiles[0].inferred_type, "null");
        assert!((profiles[0].null_percentage - 100.0).abs() < 1e-9);
        assert_eq!(profiles[1].inferred_type, "mixed");
    }

    #[tokio::test]
    async fn test_empty_view_keeps_columns() {
        use crate::config::DatasetConfig;
        use crate::dsn::ConnectionProfile;

        let conn = match ConnectionManager::connect(
            ConnectionProfile::sqlite(":memory:"),
            &DatasetConfig::default(),
        )
        .await
        {
            Ok(conn) => conn,
            Err(e) => panic!("connect failed: {}", e),
        };
        let executor = QueryExecutor::new(&conn);
        for sql in [
            "CREATE TABLE orders (order_id INTEGER PRIMARY KEY, total REAL)",
            "CREATE VIEW big_orders AS SELECT order_id, total * 2 AS doubled FROM orders WHERE total > 100",
        ] {
            if let Err(e) = executor.execute(sql).await {
                panic!("seed failed: {}", e);
            }
        }

        let profile = profile_dataset(&conn, "big_orders").await;
        let profile = match profile {
            Ok(profile) => profile,
            Err(e) => panic!("profile failed: {}", e),
        };
        assert_eq!(profile.row_count, 0);
        assert_eq!(profile.column_count, 2);
        assert_eq!(profile.columns[1].column, "doubled");
        assert_eq!(profile.columns[1].inferred_type, "null");
    }

    #[test]
    fn test_median_even() {
        assert_eq!(median(&[1.0, 2.0, 3.0, 10.0]), Some(2.5));
        assert_eq!(sample_std_dev(&[1.0]), None);
    }
}
