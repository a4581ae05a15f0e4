//! Relational storage for Estante.
//!
//! [`Database`] wraps the SQLite pool and applies module migrations;
//! [`query`] holds the list-endpoint helpers (prefix search, allow-listed
//! ordering, page-number pagination) on top of `sqlx::QueryBuilder`.

pub mod database;
pub mod query;

pub use database::{Database, DbError};
pub use query::{
    fetch_page, like_prefix, parse_ordering, push_ordering, OrderBy, Page, PageRequest,
    TOTAL_COLUMN,
};

/// Primary key of every table.
pub type Id = i64;
