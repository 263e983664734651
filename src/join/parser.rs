//! Join description parser

use super::spec::{JoinSpec, JoinType};
use lazy_regex::{Lazy, Regex, lazy_regex};

static JOIN_CLAUSE: Lazy<Regex> =
    lazy_regex!(r"join\s+(\w+)\s+table\s+with\s+(\w+)\s+table\s+using\s+(\w+)");

/// Parse a join description into join specs, in input order
///
/// The text is split on commas and every clause parsed on its own.
/// Clauses that do not match are dropped without error. The join type is
/// `left`, `right` or `full` if that word appears anywhere in the clause
/// (checked in that order), otherwise `inner`. Names come back lowercased.
///
/// ```
/// # use kodegen_dataset_views::join::{parse_join_condition, JoinSpec, JoinType};
/// let joins = parse_join_condition("Join orders table with customers table using customer_id");
/// assert_eq!(joins, vec![JoinSpec::new("orders", "customers", "customer_id", JoinType::Inner)]);
/// ```
pub fn parse_join_condition(text: &str) -> Vec<JoinSpec> {
    text.split(',')
        .filter_map(|clause| parse_clause(&clause.trim().to_lowercase()))
        .collect()
}

fn parse_clause(clause: &str) -> Option<JoinSpec> {
    let caps = JOIN_CLAUSE.captures(clause)?;
    Some(JoinSpec::new(
        caps.get(1)?.as_str(),
        caps.get(2)?.as_str(),
        caps.get(3)?.as_str(),
        join_type_of(clause),
    ))
}

fn join_type_of(clause: &str) -> JoinType {
    if clause.contains("left") {
        JoinType::Left
    } else if clause.contains("right") {
        JoinType::Right
    } else if clause.contains("full") {
        JoinType::Full
    } else {
        JoinType::Inner
    }
}
