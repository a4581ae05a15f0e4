//! List query helpers shared by every list endpoint.

use serde::Serialize;
use sqlx::{
    sqlite::{Sqlite, SqlitePool, SqliteRow},
    FromRow, QueryBuilder, Row,
};

use crate::DbError;

/// Select-list entry every paged query carries; read back by [`fetch_page`].
pub const TOTAL_COLUMN: &str = "COUNT(*) OVER () AS _total";

/// One `ordering` term, e.g. `-titulo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// Parse a comma-separated `ordering` parameter, keeping only allow-listed
/// fields. Unknown fields are dropped silently.
pub fn parse_ordering(raw: Option<&str>, allowed: &[&str]) -> Vec<OrderBy> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    raw.split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .filter_map(|term| {
            let (field, descending) = match term.strip_prefix('-') {
                Some(field) => (field, true),
                None => (term, false),
            };
            allowed.contains(&field).then(|| OrderBy {
                field: field.to_string(),
                descending,
            })
        })
        .collect()
}

/// Append `ORDER BY` for `ordering`, always ending on `tie_breaker` so pages
/// are stable. `columns` maps each allowed field to its SQL expression.
pub fn push_ordering(
    qb: &mut QueryBuilder<'_, Sqlite>,
    ordering: &[OrderBy],
    columns: &[(&str, &str)],
    tie_breaker: &str,
) {
    qb.push(" ORDER BY ");
    for term in ordering {
        let Some((_, column)) = columns.iter().find(|(field, _)| *field == term.field) else {
            continue;
        };
        qb.push(*column);
        qb.push(if term.descending { " DESC, " } else { " ASC, " });
    }
    qb.push(tie_breaker);
}

/// `LIKE` pattern for a case-insensitive prefix search, to be used with
/// `ESCAPE '\'`.
pub fn like_prefix(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 1);
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Requested 1-based page and its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: i64,
    pub size: i64,
}

impl PageRequest {
    /// A missing page means the first one. Zero or a non-numeric page is
    /// [`DbError::InvalidPage`].
    pub fn parse(raw: Option<&str>, size: usize) -> Result<Self, DbError> {
        let number = match raw {
            None => 1,
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| DbError::InvalidPage)?,
        };
        if number < 1 {
            return Err(DbError::InvalidPage);
        }
        Ok(Self {
            number,
            size: i64::try_from(size.max(1)).unwrap_or(i64::MAX),
        })
    }

    fn offset(&self) -> i64 {
        (self.number - 1).saturating_mul(self.size)
    }
}

/// One page of a list result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub number: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Convert the rows of this page, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            number: self.number,
            has_next: self.has_next,
            has_previous: self.has_previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// Run `qb` (a `SELECT` carrying [`TOTAL_COLUMN`]) for one page.
///
/// Page 1 of an empty result is valid; any later page without rows is
/// [`DbError::InvalidPage`].
pub async fn fetch_page<T>(
    mut qb: QueryBuilder<'_, Sqlite>,
    page: PageRequest,
    pool: &SqlitePool,
) -> Result<Page<T>, DbError>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    qb.push(" LIMIT ")
        .push_bind(page.size)
        .push(" OFFSET ")
        .push_bind(page.offset());
    let rows = qb.build().fetch_all(pool).await?;

    let count = match rows.first() {
        Some(row) => row.try_get::<i64, _>("_total")?,
        None if page.number > 1 => return Err(DbError::InvalidPage),
        None => 0,
    };
    let results = rows
        .iter()
        .map(T::from_row)
        .collect::<Result<Vec<T>, sqlx::Error>>()?;

    Ok(Page {
        count: usize::try_from(count).unwrap_or_default(),
        number: usize::try_from(page.number).unwrap_or_default(),
        has_next: page.number.saturating_mul(page.size) < count,
        has_previous: page.number > 1,
        results,
    })
}
