mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

fn book(title: &str, published_on: &str) -> serde_json::Value {
    json!({
        "titulo": title,
        "autor": "Isaac Asimov",
        "categoria": "Ficção Científica",
        "publicado_em": published_on
    })
}

#[tokio::test]
async fn api_root_lists_resources() {
    let app = TestApp::new().await;
    let root = app.get("/", None).await;
    assert_eq!(root.status, StatusCode::OK);
    assert_eq!(root.body["livros"], "http://testserver/livros/");
    assert_eq!(root.body["autores"], "http://testserver/autor/");
    assert_eq!(root.body["categorias"], "http://testserver/categoria/");
    assert_eq!(root.body["colecao"], "http://testserver/colecao/");
}

#[tokio::test]
async fn books_reference_authors_and_categories_by_name() {
    let app = TestApp::new().await;
    let books = app.seed_books(&["Eu, Robô"]).await;
    assert_eq!(books[0]["autor"], "Isaac Asimov");
    assert_eq!(books[0]["categoria"], "Ficção Científica");
    assert_eq!(books[0]["publicado_em"], "1950-12-02");
    assert_eq!(books[0]["url"], "http://testserver/livros/1/");

    let author = app.get("/autor/1/", None).await;
    assert_eq!(author.body["nome"], "Isaac Asimov");
    assert_eq!(author.body["livros"], json!(["http://testserver/livros/1/"]));

    let unknown = app
        .post(
            "/livros/",
            None,
            json!({
                "titulo": "2001",
                "autor": "Arthur C. Clarke",
                "categoria": "Ficção Científica",
                "publicado_em": "1968-07-01"
            }),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(unknown.body["error"]["details"][0]["field"], "autor");
    assert_eq!(
        unknown.body["error"]["details"][0]["error"],
        "Object with nome=Arthur C. Clarke does not exist."
    );
}

#[tokio::test]
async fn missing_fields_are_reported_together() {
    let app = TestApp::new().await;
    let response = app.post("/livros/", None, json!({})).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["error"]["details"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn invalid_dates_are_rejected() {
    let app = TestApp::new().await;
    app.seed_books(&[]).await;
    let response = app.post("/livros/", None, book("Fundação", "01/05/1951")).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["error"]["details"][0]["field"], "publicado_em");
}

#[tokio::test]
async fn author_names_are_unique() {
    let app = TestApp::new().await;
    app.post("/autor/", None, json!({ "nome": "Isaac Asimov" })).await;
    let duplicate = app.post("/autor/", None, json!({ "nome": "Isaac Asimov" })).await;
    assert_eq!(duplicate.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        duplicate.body["error"]["details"][0]["error"],
        "autor with this nome already exists."
    );
}

#[tokio::test]
async fn referenced_authors_cannot_be_deleted() {
    let app = TestApp::new().await;
    app.seed_books(&["Eu, Robô"]).await;

    let blocked = app.request(Method::DELETE, "/autor/1/", None, None).await;
    assert_eq!(blocked.status, StatusCode::CONFLICT);

    app.request(Method::DELETE, "/livros/1/", None, None).await;
    let deleted = app.request(Method::DELETE, "/autor/1/", None, None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get("/autor/1/", None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn books_filter_search_and_order() {
    let app = TestApp::new().await;
    app.seed_books(&[]).await;
    app.post("/livros/", None, book("Eu, Robô", "1950-12-02")).await;
    app.post("/livros/", None, book("Fundação", "1951-05-01")).await;
    app.post("/livros/", None, book("O Fim da Eternidade", "1955-01-01")).await;

    let search = app.get("/livros/?search=fun", None).await;
    assert_eq!(search.body["count"], 1);
    assert_eq!(search.body["results"][0]["titulo"], "Fundação");

    let range = app
        .get("/livros/?publicado_em_min=1951-01-01&publicado_em_max=1955-12-31", None)
        .await;
    assert_eq!(range.body["count"], 2);

    let by_author = app.get("/livros/?autor=Isaac%20Asimov", None).await;
    assert_eq!(by_author.body["count"], 3);

    let ordered = app.get("/livros/?ordering=-publicado_em", None).await;
    assert_eq!(ordered.body["results"][0]["titulo"], "O Fim da Eternidade");

    let bad_date = app.get("/livros/?publicado_em=ontem", None).await;
    assert_eq!(bad_date.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn lists_are_paginated() {
    let app = TestApp::new().await;
    for n in 0..12 {
        app.post("/categoria/", None, json!({ "nome": format!("Categoria {:02}", n) }))
            .await;
    }

    let first = app.get("/categoria/", None).await;
    assert_eq!(first.body["count"], 12);
    assert_eq!(first.body["results"].as_array().unwrap().len(), 10);
    assert_eq!(first.body["next"], "http://testserver/categoria/?page=2");
    assert!(first.body["previous"].is_null());

    let second = app.get("/categoria/?page=2", None).await;
    assert_eq!(second.body["results"].as_array().unwrap().len(), 2);
    assert_eq!(second.body["previous"], "http://testserver/categoria/");

    let beyond = app.get("/categoria/?page=3", None).await;
    assert_eq!(beyond.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn partial_book_update_keeps_other_fields() {
    let app = TestApp::new().await;
    app.seed_books(&["Eu, Robô"]).await;

    let patch = app
        .request(
            Method::PATCH,
            "/livros/1/",
            None,
            Some(json!({ "titulo": "I, Robot" })),
        )
        .await;
    assert_eq!(patch.status, StatusCode::OK);
    assert_eq!(patch.body["titulo"], "I, Robot");
    assert_eq!(patch.body["publicado_em"], "1950-12-02");

    let put = app
        .request(Method::PUT, "/livros/1/", None, Some(json!({ "titulo": "I, Robot" })))
        .await;
    assert_eq!(put.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn non_object_payload_is_a_validation_error() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/autor/",
            None,
            Some(json!("Isaac Asimov")),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn openapi_document_covers_every_module() {
    let app = TestApp::new().await;
    let doc = app.get("/docs/openapi.json", None).await;
    assert_eq!(doc.status, StatusCode::OK);
    for path in ["/", "/livros/", "/autor/{id}/", "/colecao/", "/api-token-auth/", "/healthz"] {
        assert!(doc.body["paths"].get(path).is_some(), "missing {}", path);
    }
}
