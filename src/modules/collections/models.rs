use estante_db::Id;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};

/// A user's named set of books, with the owner's username joined in.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Collection {
    pub id: Id,
    #[sqlx(rename = "nome")]
    pub name: String,
    #[sqlx(rename = "descricao")]
    pub description: String,
    /// Book ids in insertion order, without duplicates.
    #[sqlx(rename = "livros")]
    pub book_ids: Json<Vec<Id>>,
    #[sqlx(rename = "colecionador_id")]
    pub owner_id: Id,
    #[sqlx(rename = "colecionador")]
    pub owner: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionView {
    pub url: String,
    pub id: Id,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "livros")]
    pub books: Vec<Id>,
    /// Owner username; read-only.
    #[serde(rename = "colecionador")]
    pub owner: String,
}

/// Collection write payload.
///
/// There is no owner field: a `colecionador` sent by the client is dropped
/// during deserialization and the caller becomes the owner.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionPayload {
    #[serde(rename = "nome")]
    pub name: Option<String>,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "livros")]
    pub books: Option<Vec<Id>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDraft {
    pub name: String,
    pub description: String,
    pub book_ids: Vec<Id>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionFilter {
    #[serde(rename = "nome")]
    pub name: Option<String>,
    pub page: Option<String>,
}
