//! Window matching and list filtering

pub mod filter;
pub mod predicate;

pub use filter::{BlackoutQuery, FieldMatcher, QueryError, QueryField};
pub use predicate::matches;
