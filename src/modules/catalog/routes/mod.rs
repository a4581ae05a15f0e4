pub mod books;
pub mod named;

use axum::{routing::get, Router};

use crate::state::AppState;
use named::{Authors, Categories};

/// Book, author and category endpoints.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/livros/", get(books::list).post(books::create))
        .route(
            "/livros/{id}/",
            get(books::retrieve)
                .put(books::replace)
                .patch(books::update)
                .delete(books::destroy),
        )
        .route(
            "/autor/",
            get(named::list::<Authors>).post(named::create::<Authors>),
        )
        .route(
            "/autor/{id}/",
            get(named::retrieve::<Authors>)
                .put(named::replace::<Authors>)
                .patch(named::update::<Authors>)
                .delete(named::destroy::<Authors>),
        )
        .route(
            "/categoria/",
            get(named::list::<Categories>).post(named::create::<Categories>),
        )
        .route(
            "/categoria/{id}/",
            get(named::retrieve::<Categories>)
                .put(named::replace::<Categories>)
                .patch(named::update::<Categories>)
                .delete(named::destroy::<Categories>),
        )
        .with_state(state)
}
