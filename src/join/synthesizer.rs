//! Deterministic `FROM ... JOIN ...` rendering

use super::spec::JoinSpec;

/// Render join specs into a `FROM` clause
///
/// Empty input renders as an empty string. Specs are rendered exactly as
/// given: no deduplication and no check that a spec's source table was
/// introduced by an earlier one.
///
/// ```
/// # use kodegen_dataset_views::join::{synthesize_join_clause, JoinSpec, JoinType};
/// let joins = [JoinSpec::new("orders", "customers", "customer_id", JoinType::Inner)];
/// assert_eq!(
///     synthesize_join_clause(&joins),
///     "FROM orders\nINNER JOIN customers ON orders.customer_id = customers.customer_id"
/// );
/// ```
pub fn synthesize_join_clause(joins: &[JoinSpec]) -> String {
    let Some(first) = joins.first() else {
        return String::new();
    };

    let mut sql = format!("FROM {}", first.source_table);
    for join in joins {
        sql.push_str(&format!(
            "\n{} JOIN {} ON {}.{} = {}.{}",
            join.join_type,
            join.target_table,
            join.source_table,
            join.join_field,
            join.target_table,
            join.join_field
        ));
    }
    sql
}
