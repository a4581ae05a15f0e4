//! Authors and categories: identical resources keyed by a unique name.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use estante_db::{parse_ordering, Database, DbError, Id, PageRequest};
use estante_http::{AppError, Payload};

use crate::modules::catalog::models::{NamedFilter, NamedPayload, NamedRecord, NamedView};
use crate::modules::catalog::repo::{self, NamedTable, AUTHORS, CATEGORIES};
use crate::state::AppState;
use crate::utils::{self, FieldErrors, Links, Paginated};

pub const ORDERING_FIELDS: &[&str] = &["nome"];

/// Table selection for one named resource.
pub trait NamedKind: Send + Sync + 'static {
    const TABLE: NamedTable;

    fn url(links: &Links, id: Id) -> String;

    /// Singular label used in messages and logs.
    fn label() -> &'static str {
        Self::TABLE.table
    }
}

pub struct Authors;

impl NamedKind for Authors {
    const TABLE: NamedTable = AUTHORS;

    fn url(links: &Links, id: Id) -> String {
        links.author(id)
    }
}

pub struct Categories;

impl NamedKind for Categories {
    const TABLE: NamedTable = CATEGORIES;

    fn url(links: &Links, id: Id) -> String {
        links.category(id)
    }
}

fn view<K: NamedKind>(row: &NamedRecord, links: &Links) -> NamedView {
    NamedView {
        url: K::url(links, row.id),
        name: row.name.clone(),
        books: row.book_ids.iter().map(|id| links.book(*id)).collect(),
    }
}

fn name_taken<K: NamedKind>() -> AppError {
    AppError::invalid_field("nome", format!("{} with this nome already exists.", K::label()))
}

/// Validated, unique name. `current` is the row being renamed, if any.
async fn validate_name<K: NamedKind>(
    db: &Database,
    name: Option<String>,
    current: Option<Id>,
) -> Result<String, AppError> {
    let mut errors = FieldErrors::default();
    let name = errors
        .field("nome", name, None)
        .and_then(|name| errors.non_blank("nome", name));

    if let Some(name) = &name {
        let holder = repo::named_id(db, K::TABLE, name).await?;
        if holder.is_some_and(|id| Some(id) != current) {
            return Err(name_taken::<K>());
        }
    }

    match name {
        Some(name) if errors.is_empty() => Ok(name),
        _ => Err(errors.into_error()),
    }
}

/// A concurrent writer may claim the name between the check and the write.
fn unique_write<K: NamedKind>(err: DbError) -> AppError {
    if err.is_unique_violation() {
        name_taken::<K>()
    } else {
        err.into()
    }
}

pub async fn list<K: NamedKind>(
    State(state): State<AppState>,
    links: Links,
    Query(filter): Query<NamedFilter>,
) -> Result<Json<Paginated<NamedView>>, AppError> {
    let page = PageRequest::parse(filter.page.as_deref(), state.page_size)?;
    let ordering = parse_ordering(filter.ordering.as_deref(), ORDERING_FIELDS);
    let search = filter.search.as_deref().filter(|term| !term.trim().is_empty());

    let page = repo::list_named(&state.db, K::TABLE, search, &ordering, page)
        .await?
        .map(|row| view::<K>(&row, &links));
    Ok(Json(Paginated::new(page, &links)))
}

pub async fn create<K: NamedKind>(
    State(state): State<AppState>,
    links: Links,
    Payload(payload): Payload<NamedPayload>,
) -> Result<(StatusCode, Json<NamedView>), AppError> {
    let name = validate_name::<K>(&state.db, payload.name, None).await?;
    let id = repo::insert_named(&state.db, K::TABLE, &name)
        .await
        .map_err(unique_write::<K>)?;
    let row = repo::find_named(&state.db, K::TABLE, id).await?;

    tracing::info!(kind = K::label(), id, name = %row.name, "created");
    Ok((StatusCode::CREATED, Json(view::<K>(&row, &links))))
}

pub async fn retrieve<K: NamedKind>(
    State(state): State<AppState>,
    links: Links,
    Path(id): Path<String>,
) -> Result<Json<NamedView>, AppError> {
    let row = repo::find_named(&state.db, K::TABLE, utils::lookup_id(&id)?).await?;
    Ok(Json(view::<K>(&row, &links)))
}

async fn save<K: NamedKind>(
    state: &AppState,
    links: &Links,
    id: Id,
    payload: NamedPayload,
    partial: bool,
) -> Result<Json<NamedView>, AppError> {
    let current = repo::find_named(&state.db, K::TABLE, id).await?;

    let name = match payload.name {
        None if partial => current.name,
        name => validate_name::<K>(&state.db, name, Some(id)).await?,
    };
    repo::rename_named(&state.db, K::TABLE, id, &name)
        .await
        .map_err(unique_write::<K>)?;
    let row = repo::find_named(&state.db, K::TABLE, id).await?;

    tracing::info!(kind = K::label(), id, partial, "updated");
    Ok(Json(view::<K>(&row, links)))
}

pub async fn replace<K: NamedKind>(
    State(state): State<AppState>,
    links: Links,
    Path(id): Path<String>,
    Payload(payload): Payload<NamedPayload>,
) -> Result<Json<NamedView>, AppError> {
    save::<K>(&state, &links, utils::lookup_id(&id)?, payload, false).await
}

pub async fn update<K: NamedKind>(
    State(state): State<AppState>,
    links: Links,
    Path(id): Path<String>,
    Payload(payload): Payload<NamedPayload>,
) -> Result<Json<NamedView>, AppError> {
    save::<K>(&state, &links, utils::lookup_id(&id)?, payload, true).await
}

fn still_referenced<K: NamedKind>(row: &NamedRecord, links: &Links) -> AppError {
    AppError::conflict(
        row.book_ids
            .iter()
            .map(|book_id| serde_json::json!({ "livro": links.book(*book_id) }))
            .collect(),
        format!(
            "Cannot delete {} '{}': {} livro(s) still reference it.",
            K::label(),
            row.name,
            row.book_ids.len()
        ),
    )
}

/// Rows still referenced by books are kept; the caller must move or delete
/// those books first.
pub async fn destroy<K: NamedKind>(
    State(state): State<AppState>,
    links: Links,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = utils::lookup_id(&id)?;
    let row = repo::find_named(&state.db, K::TABLE, id).await?;
    if !row.book_ids.is_empty() {
        return Err(still_referenced::<K>(&row, &links));
    }

    match repo::delete_named(&state.db, K::TABLE, id).await {
        Ok(()) => {}
        Err(err) if err.is_foreign_key_violation() => {
            let row = repo::find_named(&state.db, K::TABLE, id).await?;
            return Err(still_referenced::<K>(&row, &links));
        }
        Err(err) => return Err(err.into()),
    }

    tracing::info!(kind = K::label(), id, "deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::repo::tests::{draft, seeded};
    use time::macros::date;

    #[tokio::test]
    async fn taken_names_are_rejected_except_for_the_holder() {
        let db = seeded().await;
        let err = validate_name::<Authors>(&db, Some("Isaac Asimov".into()), None)
            .await
            .unwrap_err();
        match err {
            AppError::Validation { details, .. } => {
                assert_eq!(details[0]["error"], "autor with this nome already exists.")
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let same = validate_name::<Authors>(&db, Some(" Isaac Asimov ".into()), Some(1)).await;
        assert_eq!(same.unwrap(), "Isaac Asimov");
        let other_table = validate_name::<Categories>(&db, Some("Isaac Asimov".into()), None);
        assert!(other_table.await.is_ok());
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let db = seeded().await;
        let err = validate_name::<Categories>(&db, Some("  ".into()), None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn conflict_lists_referencing_books() {
        let db = seeded().await;
        repo::insert_book(&db, &draft("Eu, Robô", date!(1950 - 12 - 02)))
            .await
            .unwrap();
        let row = repo::find_named(&db, AUTHORS, 1).await.unwrap();

        let err = still_referenced::<Authors>(&row, &Links::new("http://testserver", "/", None));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        match err {
            AppError::Conflict {
                details, message, ..
            } => {
                assert_eq!(details[0]["livro"], "http://testserver/livros/1/");
                assert_eq!(
                    message,
                    "Cannot delete autor 'Isaac Asimov': 1 livro(s) still reference it."
                );
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }
}
