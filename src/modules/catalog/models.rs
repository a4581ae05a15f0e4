use estante_db::Id;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::Date;

/// Author or category row, with the ids of the books referencing it.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct NamedRecord {
    pub id: Id,
    #[sqlx(rename = "nome")]
    pub name: String,
    #[sqlx(rename = "livros")]
    pub book_ids: Json<Vec<Id>>,
}

/// Book row joined with its author and category names.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Book {
    pub id: Id,
    #[sqlx(rename = "titulo")]
    pub title: String,
    #[sqlx(rename = "autor_id")]
    pub author_id: Id,
    #[sqlx(rename = "autor")]
    pub author: String,
    #[sqlx(rename = "categoria_id")]
    pub category_id: Id,
    #[sqlx(rename = "categoria")]
    pub category: String,
    #[sqlx(rename = "publicado_em")]
    pub published_on: Date,
}

/// Author or category as served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct NamedView {
    pub url: String,
    #[serde(rename = "nome")]
    pub name: String,
    /// Links to the books referencing this row.
    #[serde(rename = "livros")]
    pub books: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookView {
    pub url: String,
    #[serde(rename = "autor")]
    pub author: String,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "publicado_em")]
    pub published_on: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedPayload {
    #[serde(rename = "nome")]
    pub name: Option<String>,
}

/// Book write payload. Author and category are given by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookPayload {
    #[serde(rename = "titulo")]
    pub title: Option<String>,
    #[serde(rename = "autor")]
    pub author: Option<String>,
    #[serde(rename = "categoria")]
    pub category: Option<String>,
    #[serde(rename = "publicado_em")]
    pub published_on: Option<String>,
}

/// Validated book fields with references already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct BookDraft {
    pub title: String,
    pub author_id: Id,
    pub category_id: Id,
    pub published_on: Date,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookFilter {
    #[serde(rename = "autor")]
    pub author: Option<String>,
    #[serde(rename = "categoria")]
    pub category: Option<String>,
    #[serde(rename = "publicado_em")]
    pub published_on: Option<String>,
    #[serde(rename = "publicado_em_min")]
    pub published_after: Option<String>,
    #[serde(rename = "publicado_em_max")]
    pub published_before: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedFilter {
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<String>,
}
