//! Queries for books, authors and categories.

use estante_db::{
    fetch_page, like_prefix, push_ordering, Database, DbError, Id, OrderBy, Page, PageRequest,
    TOTAL_COLUMN,
};
use sqlx::{QueryBuilder, Sqlite};
use time::Date;

use super::models::{Book, BookDraft, NamedRecord};

/// A table of rows addressed by a unique `nome`, referenced from `livro`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedTable {
    pub table: &'static str,
    /// Column of `livro` pointing at this table.
    pub foreign_key: &'static str,
}

pub const AUTHORS: NamedTable = NamedTable {
    table: "autor",
    foreign_key: "autor_id",
};

pub const CATEGORIES: NamedTable = NamedTable {
    table: "categoria",
    foreign_key: "categoria_id",
};

const BOOK_COLUMNS: &[(&str, &str)] = &[
    ("titulo", "livro.titulo"),
    ("autor", "autor.nome"),
    ("categoria", "categoria.nome"),
    ("publicado_em", "livro.publicado_em"),
];

const SELECT_BOOK: &str = "SELECT livro.id AS id, livro.titulo AS titulo, \
     livro.autor_id AS autor_id, autor.nome AS autor, \
     livro.categoria_id AS categoria_id, categoria.nome AS categoria, \
     livro.publicado_em AS publicado_em";

const FROM_BOOK: &str = " FROM livro \
     JOIN autor ON autor.id = livro.autor_id \
     JOIN categoria ON categoria.id = livro.categoria_id";

/// Criteria for the book list, already validated.
#[derive(Debug, Clone, Default)]
pub struct BookQuery {
    pub author: Option<String>,
    pub category: Option<String>,
    pub published_on: Option<Date>,
    pub published_after: Option<Date>,
    pub published_before: Option<Date>,
    pub search: Option<String>,
    pub ordering: Vec<OrderBy>,
}

fn select_named<'a>(kind: NamedTable, extra: &str) -> QueryBuilder<'a, Sqlite> {
    QueryBuilder::new(format!(
        "SELECT {t}.id AS id, {t}.nome AS nome, \
         (SELECT json_group_array(livro.id ORDER BY livro.id) FROM livro \
          WHERE livro.{fk} = {t}.id) AS livros{extra} \
         FROM {t}",
        t = kind.table,
        fk = kind.foreign_key,
        extra = extra,
    ))
}

pub async fn list_named(
    db: &Database,
    kind: NamedTable,
    search: Option<&str>,
    ordering: &[OrderBy],
    page: PageRequest,
) -> Result<Page<NamedRecord>, DbError> {
    let mut qb = select_named(kind, &format!(", {}", TOTAL_COLUMN));
    if let Some(term) = search {
        qb.push(format!(" WHERE {}.nome LIKE ", kind.table))
            .push_bind(like_prefix(term))
            .push(" ESCAPE '\\'");
    }
    let name_column = format!("{}.nome", kind.table);
    push_ordering(
        &mut qb,
        ordering,
        &[("nome", name_column.as_str())],
        &format!("{}.id", kind.table),
    );
    fetch_page(qb, page, db.pool()).await
}

pub async fn find_named(db: &Database, kind: NamedTable, id: Id) -> Result<NamedRecord, DbError> {
    let mut qb = select_named(kind, "");
    qb.push(format!(" WHERE {}.id = ", kind.table)).push_bind(id);
    qb.build_query_as::<NamedRecord>()
        .fetch_optional(db.pool())
        .await?
        .ok_or(DbError::NotFound {
            table: kind.table,
            id,
        })
}

/// Natural-key lookup by exact name.
pub async fn named_id(db: &Database, kind: NamedTable, name: &str) -> Result<Option<Id>, DbError> {
    let sql = format!("SELECT id FROM {} WHERE nome = ?", kind.table);
    Ok(sqlx::query_scalar(&sql)
        .bind(name)
        .fetch_optional(db.pool())
        .await?)
}

pub async fn insert_named(db: &Database, kind: NamedTable, name: &str) -> Result<Id, DbError> {
    let sql = format!("INSERT INTO {} (nome) VALUES (?) RETURNING id", kind.table);
    Ok(sqlx::query_scalar(&sql)
        .bind(name)
        .fetch_one(db.pool())
        .await?)
}

pub async fn rename_named(
    db: &Database,
    kind: NamedTable,
    id: Id,
    name: &str,
) -> Result<(), DbError> {
    let sql = format!("UPDATE {} SET nome = ? WHERE id = ?", kind.table);
    let done = sqlx::query(&sql)
        .bind(name)
        .bind(id)
        .execute(db.pool())
        .await?;
    if done.rows_affected() == 0 {
        return Err(DbError::NotFound {
            table: kind.table,
            id,
        });
    }
    Ok(())
}

/// Fails with a foreign key violation while books still reference the row.
pub async fn delete_named(db: &Database, kind: NamedTable, id: Id) -> Result<(), DbError> {
    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table);
    let done = sqlx::query(&sql).bind(id).execute(db.pool()).await?;
    if done.rows_affected() == 0 {
        return Err(DbError::NotFound {
            table: kind.table,
            id,
        });
    }
    Ok(())
}

pub async fn list_books(
    db: &Database,
    query: &BookQuery,
    page: PageRequest,
) -> Result<Page<Book>, DbError> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_BOOK);
    qb.push(", ").push(TOTAL_COLUMN).push(FROM_BOOK).push(" WHERE 1 = 1");

    if let Some(name) = &query.author {
        qb.push(" AND autor.nome = ").push_bind(name.clone());
    }
    if let Some(name) = &query.category {
        qb.push(" AND categoria.nome = ").push_bind(name.clone());
    }
    if let Some(date) = query.published_on {
        qb.push(" AND livro.publicado_em = ").push_bind(date);
    }
    if let Some(date) = query.published_after {
        qb.push(" AND livro.publicado_em >= ").push_bind(date);
    }
    if let Some(date) = query.published_before {
        qb.push(" AND livro.publicado_em <= ").push_bind(date);
    }
    if let Some(term) = &query.search {
        qb.push(" AND livro.titulo LIKE ")
            .push_bind(like_prefix(term))
            .push(" ESCAPE '\\'");
    }

    push_ordering(&mut qb, &query.ordering, BOOK_COLUMNS, "livro.id");
    fetch_page(qb, page, db.pool()).await
}

pub async fn find_book(db: &Database, id: Id) -> Result<Book, DbError> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_BOOK);
    qb.push(FROM_BOOK).push(" WHERE livro.id = ").push_bind(id);
    qb.build_query_as::<Book>()
        .fetch_optional(db.pool())
        .await?
        .ok_or(DbError::NotFound { table: "livro", id })
}

pub async fn insert_book(db: &Database, draft: &BookDraft) -> Result<Id, DbError> {
    Ok(sqlx::query_scalar(
        "INSERT INTO livro (titulo, autor_id, categoria_id, publicado_em) \
         VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(&draft.title)
    .bind(draft.author_id)
    .bind(draft.category_id)
    .bind(draft.published_on)
    .fetch_one(db.pool())
    .await?)
}

pub async fn update_book(db: &Database, id: Id, draft: &BookDraft) -> Result<(), DbError> {
    let done = sqlx::query(
        "UPDATE livro SET titulo = ?, autor_id = ?, categoria_id = ?, publicado_em = ? \
         WHERE id = ?",
    )
    .bind(&draft.title)
    .bind(draft.author_id)
    .bind(draft.category_id)
    .bind(draft.published_on)
    .bind(id)
    .execute(db.pool())
    .await?;
    if done.rows_affected() == 0 {
        return Err(DbError::NotFound { table: "livro", id });
    }
    Ok(())
}

/// Collection memberships go with the book.
pub async fn delete_book(db: &Database, id: Id) -> Result<(), DbError> {
    let done = sqlx::query("DELETE FROM livro WHERE id = ?")
        .bind(id)
        .execute(db.pool())
        .await?;
    if done.rows_affected() == 0 {
        return Err(DbError::NotFound { table: "livro", id });
    }
    Ok(())
}

/// Which of `ids` name existing books.
pub async fn existing_books(db: &Database, ids: &[Id]) -> Result<Vec<Id>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM livro WHERE id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    qb.push(")");
    Ok(qb.build_query_scalar::<Id>().fetch_all(db.pool()).await?)
}
