//! Query Engine: a read-only, immutable query builder over one
//! cache table.

mod builder;
mod predicate;

pub use builder::{Query, SortDirection};
