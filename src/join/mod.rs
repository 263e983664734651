//! Natural-language join grammar
//!
//! Text of the form `join <source> table with <target> table using <field>`
//! (comma separated for multi-hop chains) is validated, parsed into
//! [`JoinSpec`] values and rendered into a `FROM ... JOIN ...` clause.
//!
//! - [`validate_join_condition`]: cheap syntactic pre-check
//! - [`parse_join_condition`]: text to ordered `JoinSpec` list
//! - [`synthesize_join_clause`]: `JoinSpec` list to SQL

pub mod parser;
pub mod spec;
pub mod synthesizer;
pub mod validator;

pub use parser::parse_join_condition;
pub use spec::{JoinSpec, JoinType};
pub use synthesizer::synthesize_join_clause;
pub use validator::{JoinConditionError, validate_join_condition};
