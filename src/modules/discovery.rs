//! API root listing the top-level resources.

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use estante_kernel::Module;
use serde_json::{json, Value};

use crate::utils::Links;

pub struct DiscoveryModule;

#[async_trait]
impl Module for DiscoveryModule {
    fn name(&self) -> &'static str {
        "discovery"
    }

    fn routes(&self) -> Router {
        Router::new().route("/", get(api_root))
    }

    fn openapi(&self) -> Option<Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "Links to every resource collection",
                        "tags": ["discovery"],
                        "responses": { "200": { "description": "Resource URLs" } }
                    }
                }
            }
        }))
    }
}

async fn api_root(links: Links) -> Json<Value> {
    Json(json!({
        "livros": links.absolute("/livros/"),
        "autores": links.absolute("/autor/"),
        "categorias": links.absolute("/categoria/"),
        "colecao": links.absolute("/colecao/"),
    }))
}

pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(DiscoveryModule)
}
