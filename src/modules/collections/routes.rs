//! Collection endpoints.
//!
//! Every request runs the same pipeline: authenticate the caller, apply the
//! view-level policy, count the request against the `colecao` throttle scope,
//! then load the owner and apply the object-level policy. Write bodies are
//! only parsed once that pipeline has admitted the request.

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use estante_authz::{check_object, check_view, Action};
use estante_db::{Database, Id, PageRequest};
use estante_http::{AppError, Payload};
use estante_throttle::Admission;

use super::models::{
    Collection, CollectionDraft, CollectionFilter, CollectionPayload, CollectionView,
};
use super::{repo, SCOPE};
use crate::auth::{enforce, Caller};
use crate::modules::catalog::repo as catalog;
use crate::state::AppState;
use crate::utils::{self, FieldErrors, Links, Paginated};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/colecao/", get(list).post(create))
        .route(
            "/colecao/{id}/",
            get(retrieve).put(replace).patch(update).delete(destroy),
        )
        .with_state(state)
}

/// View-level policy followed by the throttle.
async fn admit(state: &AppState, caller: &Caller, action: Action) -> Result<(), AppError> {
    enforce(check_view(caller.user_id().as_ref(), action))?;

    match state
        .throttle
        .check(SCOPE, &caller.throttle_ident())
        .await
        .map_err(|err| AppError::Internal(err.into()))?
    {
        Admission::Admitted { .. } => Ok(()),
        Admission::Rejected { retry_after } => Err(AppError::too_many_requests(retry_after)),
    }
}

/// Look up the owner of `id` and apply the object-level policy.
async fn owned(db: &Database, caller: &Caller, action: Action, id: Id) -> Result<Id, AppError> {
    let owner_id = repo::owner_of(db, id).await?;
    enforce(check_object(caller.user_id().as_ref(), action, &owner_id))?;
    Ok(owner_id)
}

fn view(collection: Collection, links: &Links) -> CollectionView {
    CollectionView {
        url: links.collection(collection.id),
        id: collection.id,
        name: collection.name,
        description: collection.description,
        books: collection.book_ids.0,
        owner: collection.owner,
    }
}

/// Every id must name an existing book. Duplicates collapse, order is kept.
async fn book_ids(
    db: &Database,
    ids: Vec<Id>,
    errors: &mut FieldErrors,
) -> Result<Option<Vec<Id>>, AppError> {
    let existing = catalog::existing_books(db, &ids).await?;
    let mut valid = Vec::with_capacity(ids.len());
    let mut ok = true;
    for id in ids {
        if !existing.contains(&id) {
            errors.add("livros", format!("Invalid pk \"{}\" - object does not exist.", id));
            ok = false;
        } else if !valid.contains(&id) {
            valid.push(id);
        }
    }
    Ok(ok.then_some(valid))
}

/// Validate a payload against `base` (the stored row for updates).
///
/// `nome` falls back to the stored value only for partial updates; the
/// optional fields fall back whenever a stored row exists.
async fn resolve(
    db: &Database,
    payload: CollectionPayload,
    base: Option<&Collection>,
    partial: bool,
) -> Result<CollectionDraft, AppError> {
    let mut errors = FieldErrors::default();

    let fallback_name = base.filter(|_| partial).map(|c| c.name.clone());
    let name = errors
        .field("nome", payload.name, fallback_name)
        .and_then(|name| errors.non_blank("nome", name));

    let description = payload
        .description
        .or_else(|| base.map(|c| c.description.clone()))
        .unwrap_or_default();

    let books = match payload.books {
        Some(ids) => book_ids(db, ids, &mut errors).await?,
        None => Some(base.map(|c| c.book_ids.0.clone()).unwrap_or_default()),
    };

    match (name, books) {
        (Some(name), Some(book_ids)) if errors.is_empty() => Ok(CollectionDraft {
            name,
            description,
            book_ids,
        }),
        _ => Err(errors.into_error()),
    }
}

pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    links: Links,
    Query(filter): Query<CollectionFilter>,
) -> Result<Json<Paginated<CollectionView>>, AppError> {
    admit(&state, &caller, Action::List).await?;
    let page = PageRequest::parse(filter.page.as_deref(), state.page_size)?;

    let page = repo::list(&state.db, filter.name.as_deref(), page)
        .await?
        .map(|c| view(c, &links));
    Ok(Json(Paginated::new(page, &links)))
}

pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    links: Links,
    request: Request,
) -> Result<(StatusCode, Json<CollectionView>), AppError> {
    admit(&state, &caller, Action::Create).await?;
    let owner_id = caller
        .user_id()
        .ok_or_else(|| AppError::unauthorized("Authentication credentials were not provided."))?;

    let payload = Payload::<CollectionPayload>::parse(request).await?;
    let draft = resolve(&state.db, payload, None, false).await?;
    let id = repo::insert(&state.db, owner_id, &draft).await?;
    let collection = repo::find(&state.db, id).await?;

    tracing::info!(collection_id = id, owner_id, "collection created");
    Ok((StatusCode::CREATED, Json(view(collection, &links))))
}

pub async fn retrieve(
    State(state): State<AppState>,
    caller: Caller,
    links: Links,
    Path(id): Path<String>,
) -> Result<Json<CollectionView>, AppError> {
    admit(&state, &caller, Action::Retrieve).await?;
    let id = utils::lookup_id(&id)?;
    owned(&state.db, &caller, Action::Retrieve, id).await?;
    let collection = repo::find(&state.db, id).await?;
    Ok(Json(view(collection, &links)))
}

async fn save(
    state: &AppState,
    caller: &Caller,
    links: &Links,
    raw_id: &str,
    request: Request,
    partial: bool,
) -> Result<Json<CollectionView>, AppError> {
    admit(state, caller, Action::Update).await?;
    let id = utils::lookup_id(raw_id)?;
    let owner_id = owned(&state.db, caller, Action::Update, id).await?;

    let payload = Payload::<CollectionPayload>::parse(request).await?;
    let existing = repo::find(&state.db, id).await?;
    let draft = resolve(&state.db, payload, Some(&existing), partial).await?;
    repo::update(&state.db, id, owner_id, &draft).await?;
    let collection = repo::find(&state.db, id).await?;

    tracing::info!(collection_id = id, partial, "collection updated");
    Ok(Json(view(collection, links)))
}

pub async fn replace(
    State(state): State<AppState>,
    caller: Caller,
    links: Links,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<CollectionView>, AppError> {
    save(&state, &caller, &links, &id, request, false).await
}

pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    links: Links,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<CollectionView>, AppError> {
    save(&state, &caller, &links, &id, request, true).await
}

pub async fn destroy(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    admit(&state, &caller, Action::Delete).await?;
    let id = utils::lookup_id(&id)?;
    let owner_id = owned(&state.db, &caller, Action::Delete, id).await?;
    repo::delete(&state.db, id, owner_id).await?;

    tracing::info!(collection_id = id, "collection deleted");
    Ok(StatusCode::NO_CONTENT)
}
