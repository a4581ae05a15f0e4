pub mod models;
pub mod repo;
pub mod routes;

use async_trait::async_trait;
use axum::Router;
use estante_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use crate::state::AppState;

/// Authors, categories and the books referencing both by id.
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_init",
        up: r#"
            CREATE TABLE categoria (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                nome TEXT NOT NULL UNIQUE CHECK (nome <> '')
            );
            CREATE TABLE autor (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                nome TEXT NOT NULL UNIQUE CHECK (nome <> '')
            );
            CREATE TABLE livro (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                titulo       TEXT NOT NULL CHECK (titulo <> ''),
                autor_id     INTEGER NOT NULL REFERENCES autor (id) ON DELETE RESTRICT,
                categoria_id INTEGER NOT NULL REFERENCES categoria (id) ON DELETE RESTRICT,
                publicado_em TEXT NOT NULL
            );
            CREATE INDEX livro_autor ON livro (autor_id);
            CREATE INDEX livro_categoria ON livro (categoria_id);
            CREATE INDEX livro_titulo ON livro (titulo);
        "#,
    }]
}

/// Books, authors and categories. Open to every caller.
pub struct CatalogModule {
    state: AppState,
}

impl CatalogModule {
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for CatalogModule {
    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            page_size = self.state.page_size,
            "catalog module initialized"
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
        let page = |name: &str| {
            json!({
                "name": name, "in": "query", "required": false,
                "schema": { "type": "string" }
            })
        };
        let error = |description: &str| {
            json!({
                "description": description,
                "content": { "application/json": {
                    "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                }}
            })
        };
        let body = |schema: &str| {
            json!({ "content": { "application/json": {
                "schema": { "$ref": format!("#/components/schemas/{}", schema) }
            }}})
        };
        let detail = |tag: &str, schema: &str| {
            json!({
                "get": {
                    "summary": format!("Retrieve {}", tag), "tags": [tag],
                    "responses": { "200": body(schema), "404": error("Not found") }
                },
                "put": {
                    "summary": format!("Replace {}", tag), "tags": [tag],
                    "requestBody": body(&format!("{}Input", schema)),
                    "responses": {
                        "200": body(schema),
                        "404": error("Not found"),
                        "422": error("Validation error")
                    }
                },
                "patch": {
                    "summary": format!("Update {}", tag), "tags": [tag],
                    "requestBody": body(&format!("{}Input", schema)),
                    "responses": {
                        "200": body(schema),
                        "404": error("Not found"),
                        "422": error("Validation error")
                    }
                },
                "delete": {
                    "summary": format!("Delete {}", tag), "tags": [tag],
                    "responses": {
                        "204": { "description": "Deleted" },
                        "404": error("Not found"),
                        "409": error("Still referenced by books")
                    }
                }
            })
        };
        let collection = |tag: &str, schema: &str, params: Vec<serde_json::Value>| {
            json!({
                "get": {
                    "summary": format!("List {}", tag), "tags": [tag],
                    "parameters": params,
                    "responses": {
                        "200": { "description": "Paginated list" },
                        "404": error("Invalid page")
                    }
                },
                "post": {
                    "summary": format!("Create {}", tag), "tags": [tag],
                    "requestBody": body(&format!("{}Input", schema)),
                    "responses": { "201": body(schema), "422": error("Validation error") }
                }
            })
        };

        let named_params = || vec![page("search"), page("ordering"), page("page")];
        let named_schema = json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "format": "uri" },
                "nome": { "type": "string" },
                "livros": { "type": "array", "items": { "type": "string", "format": "uri" } }
            },
            "required": ["url", "nome", "livros"]
        });
        let named_input = json!({
            "type": "object",
            "properties": { "nome": { "type": "string" } },
            "required": ["nome"]
        });

        Some(json!({
            "paths": {
                "/livros/": collection("livros", "Livro", vec![
                    page("autor"), page("categoria"), page("publicado_em"),
                    page("publicado_em_min"), page("publicado_em_max"),
                    page("search"), page("ordering"), page("page"),
                ]),
                "/livros/{id}/": detail("livros", "Livro"),
                "/autor/": collection("autor", "Autor", named_params()),
                "/autor/{id}/": detail("autor", "Autor"),
                "/categoria/": collection("categoria", "Categoria", named_params()),
                "/categoria/{id}/": detail("categoria", "Categoria"),
            },
            "components": {
                "schemas": {
                    "Livro": {
                        "type": "object",
                        "properties": {
                            "url": { "type": "string", "format": "uri" },
                            "autor": { "type": "string", "description": "Author name" },
                            "titulo": { "type": "string" },
                            "categoria": { "type": "string", "description": "Category name" },
                            "publicado_em": { "type": "string", "format": "date" }
                        },
                        "required": ["url", "autor", "titulo", "categoria", "publicado_em"]
                    },
                    "LivroInput": {
                        "type": "object",
                        "properties": {
                            "autor": { "type": "string" },
                            "titulo": { "type": "string" },
                            "categoria": { "type": "string" },
                            "publicado_em": { "type": "string", "format": "date" }
                        },
                        "required": ["autor", "titulo", "categoria", "publicado_em"]
                    },
                    "Autor": named_schema.clone(),
                    "AutorInput": named_input.clone(),
                    "Categoria": named_schema,
                    "CategoriaInput": named_input,
                }
            }
        }))
    }
}

/// Create a new instance of the catalog module
pub fn create_module(state: AppState) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(CatalogModule::new(state))
}
