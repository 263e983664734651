//! Optional per-statement timeout
//!
//! Nothing here retries: a failure or an elapsed timeout is returned as is.

use crate::error::{DatabaseError, driver_message, is_connection_error};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Run a database future, bounded by `limit` when one is configured
///
/// Driver failures are mapped through `on_error` with the database's message
/// unchanged, except connection-level failures which become
/// `ConnectionError`.
///
/// # Example
///
/// ```rust
/// # use kodegen_dataset_views::executor::timeout::execute_with_timeout;
/// # use kodegen_dataset_views::error::DatabaseError;
/// # async fn example() -> Result<(), DatabaseError> {
/// let rows = execute_with_timeout(
///     None,
///     "Fetching users",
///     DatabaseError::ExecutionError,
///     async { Ok::<Vec<()>, sqlx::Error>(vec![]) },
/// )
/// .await?;
/// # assert!(rows.is_empty());
/// # Ok(())
/// # }
/// ```
pub async fn execute_with_timeout<T, Fut>(
    limit: Option<Duration>,
    operation_description: &str,
    on_error: fn(String) -> DatabaseError,
    query: Fut,
) -> Result<T, DatabaseError>
where
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let outcome = match limit {
        Some(duration) => match timeout(duration, query).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => {
                return Err(on_error(format!(
                    "{} timed out after {:?}. Increase query_timeout_secs or narrow the query",
                    operation_description, duration
                )));
            }
        },
        None => query.await,
    };

    outcome.map_err(|e| {
        if is_connection_error(&e) {
            DatabaseError::ConnectionError(format!("{}: {}", operation_description, e))
        } else {
            on_error(driver_message(&e))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_timeout_is_not_retried() {
        let result: Result<(), DatabaseError> = execute_with_timeout(
            Some(Duration::from_secs(1)),
            "Sleeping",
            DatabaseError::ExecutionError,
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;

        match result {
            Err(DatabaseError::ExecutionError(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pool_closed_becomes_connection_error() {
        let result: Result<(), DatabaseError> = execute_with_timeout(
            None,
            "Listing tables",
            DatabaseError::SchemaLookupError,
            async { Err(sqlx::Error::PoolClosed) },
        )
        .await;
        assert!(matches!(result, Err(DatabaseError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_other_errors_use_mapper() {
        let result: Result<(), DatabaseError> = execute_with_timeout(
            None,
            "Listing tables",
            DatabaseError::SchemaLookupError,
            async { Err(sqlx::Error::RowNotFound) },
        )
        .await;
        assert!(matches!(result, Err(DatabaseError::SchemaLookupError(_))));
    }
}
