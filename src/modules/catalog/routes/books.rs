use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use estante_db::{parse_ordering, Database, Id, PageRequest};
use estante_http::{AppError, Payload};

use crate::modules::catalog::models::{Book, BookDraft, BookFilter, BookPayload, BookView};
use crate::modules::catalog::repo::{self, BookQuery, NamedTable, AUTHORS, CATEGORIES};
use crate::state::AppState;
use crate::utils::{self, FieldErrors, Links, Paginated};

pub const ORDERING_FIELDS: &[&str] = &["titulo", "autor", "categoria", "publicado_em"];

pub fn view(book: &Book, links: &Links) -> BookView {
    BookView {
        url: links.book(book.id),
        author: book.author.clone(),
        title: book.title.clone(),
        category: book.category.clone(),
        published_on: book.published_on.to_string(),
    }
}

/// Id of the row called `name`, or the field error to report.
async fn resolve_name(
    db: &Database,
    kind: NamedTable,
    name: &str,
) -> Result<Result<Id, String>, AppError> {
    Ok(repo::named_id(db, kind, name)
        .await?
        .ok_or_else(|| format!("Object with nome={} does not exist.", name)))
}

/// Validate a payload against `base` (the stored row for partial updates).
async fn resolve(
    db: &Database,
    payload: BookPayload,
    base: Option<&Book>,
) -> Result<BookDraft, AppError> {
    let mut errors = FieldErrors::default();

    let title = errors
        .field("titulo", payload.title, base.map(|book| book.title.clone()))
        .and_then(|title| errors.non_blank("titulo", title));

    let author_id = match payload.author {
        Some(name) => errors.check("autor", resolve_name(db, AUTHORS, &name).await?),
        None => errors.field("autor", None, base.map(|book| book.author_id)),
    };

    let category_id = match payload.category {
        Some(name) => errors.check("categoria", resolve_name(db, CATEGORIES, &name).await?),
        None => errors.field("categoria", None, base.map(|book| book.category_id)),
    };

    let published_on = match payload.published_on {
        Some(raw) => errors.check("publicado_em", utils::parse_date(&raw)),
        None => errors.field("publicado_em", None, base.map(|book| book.published_on)),
    };

    match (title, author_id, category_id, published_on) {
        (Some(title), Some(author_id), Some(category_id), Some(published_on))
            if errors.is_empty() =>
        {
            Ok(BookDraft {
                title,
                author_id,
                category_id,
                published_on,
            })
        }
        _ => Err(errors.into_error()),
    }
}

/// Turn query parameters into list criteria. Blank parameters are ignored.
fn criteria(filter: BookFilter) -> Result<BookQuery, AppError> {
    let present = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
    let mut errors = FieldErrors::default();
    let mut date = |field: &str, raw: Option<String>| {
        present(raw).and_then(|raw| errors.check(field, utils::parse_date(&raw)))
    };

    let published_on = date("publicado_em", filter.published_on);
    let published_after = date("publicado_em_min", filter.published_after);
    let published_before = date("publicado_em_max", filter.published_before);
    if !errors.is_empty() {
        return Err(errors.into_error());
    }

    Ok(BookQuery {
        author: present(filter.author),
        category: present(filter.category),
        published_on,
        published_after,
        published_before,
        search: present(filter.search),
        ordering: parse_ordering(filter.ordering.as_deref(), ORDERING_FIELDS),
    })
}

pub async fn list(
    State(state): State<AppState>,
    links: Links,
    Query(filter): Query<BookFilter>,
) -> Result<Json<Paginated<BookView>>, AppError> {
    let raw_page = filter.page.clone();
    let query = criteria(filter)?;
    let page = PageRequest::parse(raw_page.as_deref(), state.page_size)?;

    let page = repo::list_books(&state.db, &query, page)
        .await?
        .map(|book| view(&book, &links));
    Ok(Json(Paginated::new(page, &links)))
}

pub async fn create(
    State(state): State<AppState>,
    links: Links,
    Payload(payload): Payload<BookPayload>,
) -> Result<(StatusCode, Json<BookView>), AppError> {
    let draft = resolve(&state.db, payload, None).await?;
    let id = repo::insert_book(&state.db, &draft).await?;
    let book = repo::find_book(&state.db, id).await?;

    tracing::info!(book_id = book.id, title = %book.title, "book created");
    Ok((StatusCode::CREATED, Json(view(&book, &links))))
}

pub async fn retrieve(
    State(state): State<AppState>,
    links: Links,
    Path(id): Path<String>,
) -> Result<Json<BookView>, AppError> {
    let book = repo::find_book(&state.db, utils::lookup_id(&id)?).await?;
    Ok(Json(view(&book, &links)))
}

async fn save(
    state: &AppState,
    links: &Links,
    id: Id,
    payload: BookPayload,
    partial: bool,
) -> Result<Json<BookView>, AppError> {
    let existing = repo::find_book(&state.db, id).await?;
    let draft = resolve(&state.db, payload, partial.then_some(&existing)).await?;
    repo::update_book(&state.db, id, &draft).await?;
    let book = repo::find_book(&state.db, id).await?;

    tracing::info!(book_id = id, partial, "book updated");
    Ok(Json(view(&book, links)))
}

pub async fn replace(
    State(state): State<AppState>,
    links: Links,
    Path(id): Path<String>,
    Payload(payload): Payload<BookPayload>,
) -> Result<Json<BookView>, AppError> {
    save(&state, &links, utils::lookup_id(&id)?, payload, false).await
}

pub async fn update(
    State(state): State<AppState>,
    links: Links,
    Path(id): Path<String>,
    Payload(payload): Payload<BookPayload>,
) -> Result<Json<BookView>, AppError> {
    save(&state, &links, utils::lookup_id(&id)?, payload, true).await
}

pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = utils::lookup_id(&id)?;
    repo::delete_book(&state.db, id).await?;

    tracing::info!(book_id = id, "book deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::repo::tests::{draft, seeded};
    use time::macros::date;

    fn payload() -> BookPayload {
        BookPayload {
            title: Some("Eu, Robô".into()),
            author: Some("Isaac Asimov".into()),
            category: Some("Ficção Científica".into()),
            published_on: Some("1950-12-02".into()),
        }
    }

    fn stored() -> Book {
        Book {
            id: 9,
            title: "Eu, Robô".into(),
            author_id: 1,
            author: "Isaac Asimov".into(),
            category_id: 1,
            category: "Ficção Científica".into(),
            published_on: date!(1950 - 12 - 02),
        }
    }

    #[tokio::test]
    async fn resolves_names_into_ids() {
        let db = seeded().await;
        let resolved = resolve(&db, payload(), None).await.unwrap();
        assert_eq!(resolved, draft("Eu, Robô", date!(1950 - 12 - 02)));
    }

    #[tokio::test]
    async fn unknown_names_fail_validation() {
        let db = seeded().await;
        let mut payload = payload();
        payload.author = Some("Arthur C. Clarke".into());
        match resolve(&db, payload, None).await.unwrap_err() {
            AppError::Validation { details, .. } => {
                assert_eq!(details[0]["field"], "autor");
                assert_eq!(
                    details[0]["error"],
                    "Object with nome=Arthur C. Clarke does not exist."
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn partial_update_keeps_stored_fields() {
        let db = seeded().await;
        let base = stored();
        let patch = BookPayload {
            title: Some("I, Robot".into()),
            ..BookPayload::default()
        };

        let resolved = resolve(&db, patch, Some(&base)).await.unwrap();
        assert_eq!(resolved.title, "I, Robot");
        assert_eq!(resolved.published_on, base.published_on);
    }

    #[tokio::test]
    async fn missing_fields_are_required_on_create() {
        let db = seeded().await;
        match resolve(&db, BookPayload::default(), None).await.unwrap_err() {
            AppError::Validation { details, .. } => assert_eq!(details.len(), 4),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn criteria_validate_every_date() {
        let filter = BookFilter {
            published_on: Some("ontem".into()),
            published_after: Some("1951-01-01".into()),
            published_before: Some("31/12/1955".into()),
            ..BookFilter::default()
        };
        match criteria(filter).unwrap_err() {
            AppError::Validation { details, .. } => assert_eq!(details.len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn blank_filters_are_ignored() {
        let filter = BookFilter {
            author: Some(String::new()),
            published_on: Some(" ".into()),
            search: Some("fun".into()),
            ordering: Some("-publicado_em,isbn".into()),
            ..BookFilter::default()
        };
        let query = criteria(filter).unwrap();
        assert!(query.author.is_none() && query.published_on.is_none());
        assert_eq!(query.search.as_deref(), Some("fun"));
        assert_eq!(query.ordering.len(), 1);
    }
}
