pub mod models;
pub mod repo;
pub mod routes;

use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use estante_kernel::{InitCtx, Migration, Module};
use serde_json::json;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::state::AppState;

/// Throttle scope shared by every collection endpoint.
pub const SCOPE: &str = "colecao";

/// Collections and their ordered book memberships.
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_init",
        up: r#"
            CREATE TABLE colecao (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                nome            TEXT NOT NULL CHECK (nome <> ''),
                descricao       TEXT NOT NULL DEFAULT '',
                colecionador_id INTEGER NOT NULL REFERENCES usuario (id) ON DELETE CASCADE
            );
            CREATE INDEX colecao_nome ON colecao (nome);
            CREATE TABLE colecao_livros (
                colecao_id INTEGER NOT NULL REFERENCES colecao (id) ON DELETE CASCADE,
                livro_id   INTEGER NOT NULL REFERENCES livro (id) ON DELETE CASCADE,
                posicao    INTEGER NOT NULL,
                PRIMARY KEY (colecao_id, livro_id)
            );
            CREATE INDEX colecao_livros_livro ON colecao_livros (livro_id);
        "#,
    }]
}

/// User-owned collections of books.
pub struct CollectionsModule {
    state: AppState,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl CollectionsModule {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            sweeper: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Module for CollectionsModule {
    fn name(&self) -> &'static str {
        "collections"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let rate = self.state.throttle.require(SCOPE)?;
        tracing::info!(
            module = self.name(),
            scope = SCOPE,
            %rate,
            "collections module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": { "application/json": {
                    "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                }}
            })
        };
        let colecao = json!({ "content": { "application/json": {
            "schema": { "$ref": "#/components/schemas/Colecao" }
        }}});
        let input = json!({ "content": { "application/json": {
            "schema": { "$ref": "#/components/schemas/ColecaoInput" }
        }}});
        let secured = json!([{ "token": [] }]);
        let owner_only = |ok: serde_json::Value| {
            json!({
                "200": ok,
                "401": error("Not authenticated"),
                "403": error("Not the owner"),
                "404": error("Not found"),
                "422": error("Validation error"),
                "429": error("Throttled")
            })
        };

        Some(json!({
            "paths": {
                "/colecao/": {
                    "get": {
                        "summary": "List collections", "tags": ["colecao"],
                        "parameters": [
                            {
                                "name": "nome", "in": "query", "required": false,
                                "schema": { "type": "string" }
                            },
                            {
                                "name": "page", "in": "query", "required": false,
                                "schema": { "type": "integer" }
                            }
                        ],
                        "responses": {
                            "200": { "description": "Paginated list" },
                            "401": error("Invalid token"),
                            "429": error("Throttled")
                        }
                    },
                    "post": {
                        "summary": "Create a collection owned by the caller", "tags": ["colecao"],
                        "security": secured,
                        "requestBody": input,
                        "responses": {
                            "201": colecao,
                            "401": error("Not authenticated"),
                            "422": error("Validation error"),
                            "429": error("Throttled")
                        }
                    }
                },
                "/colecao/{id}/": {
                    "get": {
                        "summary": "Retrieve a collection", "tags": ["colecao"],
                        "security": secured,
                        "responses": {
                            "200": colecao,
                            "401": error("Not authenticated"),
                            "404": error("Not found"),
                            "429": error("Throttled")
                        }
                    },
                    "put": {
                        "summary": "Replace a collection (owner only)", "tags": ["colecao"],
                        "security": secured,
                        "requestBody": input,
                        "responses": owner_only(colecao.clone()),
                    },
                    "patch": {
                        "summary": "Update a collection (owner only)", "tags": ["colecao"],
                        "security": secured,
                        "requestBody": input,
                        "responses": owner_only(colecao.clone()),
                    },
                    "delete": {
                        "summary": "Delete a collection (owner only)", "tags": ["colecao"],
                        "security": secured,
                        "responses": {
                            "204": { "description": "Deleted" },
                            "401": error("Not authenticated"),
                            "403": error("Not the owner"),
                            "404": error("Not found"),
                            "429": error("Throttled")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Colecao": {
                        "type": "object",
                        "properties": {
                            "url": { "type": "string", "format": "uri" },
                            "id": { "type": "integer" },
                            "nome": { "type": "string" },
                            "descricao": { "type": "string" },
                            "livros": { "type": "array", "items": { "type": "integer" } },
                            "colecionador": { "type": "string", "readOnly": true }
                        },
                        "required": ["url", "id", "nome", "descricao", "livros", "colecionador"]
                    },
                    "ColecaoInput": {
                        "type": "object",
                        "properties": {
                            "nome": { "type": "string" },
                            "descricao": { "type": "string" },
                            "livros": { "type": "array", "items": { "type": "integer" } }
                        },
                        "required": ["nome"]
                    }
                }
            }
        }))
    }

    async fn start(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let every = Duration::from_secs(ctx.settings.throttle.sweep_interval_secs.max(1));
        let throttle = self.state.throttle.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match throttle.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "expired throttle counters purged"),
                    Err(err) => tracing::warn!(error = %err, "throttle sweep failed"),
                }
            }
        });

        if let Some(previous) = self.sweeper.lock().await.replace(handle) {
            previous.abort();
        }
        tracing::info!(
            module = self.name(),
            interval_secs = every.as_secs(),
            "collections module started"
        );
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        if let Some(handle) = self.sweeper.lock().await.take() {
            handle.abort();
        }
        tracing::info!(module = self.name(), "collections module stopped");
        Ok(())
    }
}

/// Create a new instance of the collections module
pub fn create_module(state: AppState) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(CollectionsModule::new(state))
}
