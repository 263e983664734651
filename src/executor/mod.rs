//! Query execution
//!
//! Classifies statements (read, view creation, other writes), runs them
//! against a verified connection and converts rows into typed values.

#[allow(clippy::module_inception)]
mod executor;
pub mod row_converter;
pub mod timeout;

pub use executor::QueryExecutor;
pub(crate) use executor::bind_params;
