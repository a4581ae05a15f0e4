#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use estante_app::AppState;
use estante_kernel::settings::{DatabaseSettings, Settings};
use serde_json::Value;
use tower::ServiceExt;

pub const OWNER: (&str, &str) = ("user01", "user01P4ssw0D");
pub const OTHER: (&str, &str) = ("user02", "user02P4ssw0D");

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub owner_token: String,
    pub other_token: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(Settings::default()).await
    }

    /// Every app gets its own private in-memory database.
    pub async fn with_settings(mut settings: Settings) -> Self {
        settings.database = DatabaseSettings::in_memory();
        let state = AppState::from_settings(&settings).await.unwrap();
        let router = estante_app::router(&state, &settings).await.unwrap();
        let (_, owner_token) = state.create_user(OWNER.0, OWNER.1).await.unwrap();
        let (_, other_token) = state.create_user(OTHER.0, OTHER.1).await.unwrap();

        Self {
            router,
            state,
            owner_token,
            other_token,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        send(&self.router, method, uri, token, body).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    /// Seed one author, one category and the given book titles through the API.
    pub async fn seed_books(&self, titles: &[&str]) -> Vec<Value> {
        self.post("/autor/", None, serde_json::json!({ "nome": "Isaac Asimov" })).await;
        self.post(
            "/categoria/",
            None,
            serde_json::json!({ "nome": "Ficção Científica" }),
        )
        .await;

        let mut books = Vec::new();
        for title in titles {
            let response = self
                .post(
                    "/livros/",
                    None,
                    serde_json::json!({
                        "titulo": title,
                        "autor": "Isaac Asimov",
                        "categoria": "Ficção Científica",
                        "publicado_em": "1950-12-02"
                    }),
                )
                .await;
            assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
            books.push(response.body);
        }
        books
    }

    /// Create a collection as `token`, returning its id.
    pub async fn collection(&self, token: &str, name: &str) -> u64 {
        let response = self
            .post("/colecao/", Some(token), serde_json::json!({ "nome": name }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["id"].as_u64().unwrap()
    }
}

/// Drive one request through `router`. A JSON body gets its content type.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "testserver");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Token {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    TestResponse { status, headers, body }
}
