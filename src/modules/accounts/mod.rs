//! Identities and token issuance.

pub mod models;
pub mod password;
pub mod repo;

use anyhow::bail;
use async_trait::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use estante_db::Database;
use estante_http::{AppError, Payload};
use estante_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use crate::state::AppState;
use crate::utils::FieldErrors;
use models::{TokenRequest, TokenResponse, User};

pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_init",
        up: r#"
            CREATE TABLE usuario (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE CHECK (trim(username) <> ''),
                password_hash TEXT NOT NULL
            );
            CREATE TABLE token (
                chave TEXT PRIMARY KEY,
                usuario_id INTEGER NOT NULL UNIQUE
                    REFERENCES usuario (id) ON DELETE CASCADE,
                criado_em TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            );
        "#,
    }]
}

/// Create an identity and its token. Usernames are unique and not blank.
pub async fn provision(
    db: &Database,
    username: &str,
    password: &str,
) -> anyhow::Result<(User, String)> {
    if username.trim().is_empty() {
        bail!("username may not be blank");
    }
    if repo::user_by_username(db, username).await?.is_some() {
        bail!("user '{}' already exists", username);
    }

    let hash = password::hash_password(password.to_string()).await?;
    let (user, token) = match repo::insert_user(db, username, &hash).await {
        Err(err) if err.is_unique_violation() => bail!("user '{}' already exists", username),
        created => created?,
    };

    tracing::info!(user_id = user.id, username, "identity created");
    Ok((user, token))
}

/// Token for `username` when `password` matches.
pub async fn authenticate(
    db: &Database,
    username: &str,
    password: &str,
) -> anyhow::Result<Option<String>> {
    let Some(user) = repo::user_by_username(db, username).await? else {
        return Ok(None);
    };
    if !password::verify_password(password.to_string(), user.password_hash).await? {
        return Ok(None);
    }
    Ok(repo::token_for(db, user.id).await?)
}

pub struct AccountsModule {
    state: AppState,
}

impl AccountsModule {
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for AccountsModule {
    fn name(&self) -> &'static str {
        "accounts"
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    /// Provision the configured users. Existing usernames are left alone.
    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let mut seeded = 0;
        for seed in &ctx.settings.auth.users {
            if repo::user_by_username(&self.state.db, &seed.username)
                .await?
                .is_some()
            {
                continue;
            }
            self.state.create_user(&seed.username, &seed.password).await?;
            seeded += 1;
        }

        tracing::info!(module = self.name(), seeded, "accounts module initialized");
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/api-token-auth/", post(obtain_token))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/api-token-auth/": {
                    "post": {
                        "summary": "Exchange credentials for an API token",
                        "tags": ["accounts"],
                        "requestBody": { "content": { "application/json": {
                            "schema": { "$ref": "#/components/schemas/TokenRequest" }
                        }}},
                        "responses": {
                            "200": {
                                "description": "Token for the user",
                                "content": { "application/json": {
                                    "schema": { "$ref": "#/components/schemas/TokenResponse" }
                                }}
                            },
                            "422": {
                                "description": "Missing fields or bad credentials",
                                "content": { "application/json": {
                                    "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                }}
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "TokenRequest": {
                        "type": "object",
                        "properties": {
                            "username": { "type": "string" },
                            "password": { "type": "string", "format": "password" }
                        },
                        "required": ["username", "password"]
                    },
                    "TokenResponse": {
                        "type": "object",
                        "properties": { "token": { "type": "string" } },
                        "required": ["token"]
                    }
                }
            }
        }))
    }
}

async fn obtain_token(
    State(state): State<AppState>,
    Payload(request): Payload<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let mut errors = FieldErrors::default();
    let username = errors.field("username", request.username, None);
    let password = errors.field("password", request.password, None);
    let (Some(username), Some(password)) = (username, password) else {
        return Err(errors.into_error());
    };

    let token = authenticate(&state.db, &username, &password)
        .await
        .map_err(AppError::Internal)?;
    match token {
        Some(token) => Ok(Json(TokenResponse { token })),
        None => {
            tracing::info!(%username, "token request with bad credentials");
            Err(AppError::invalid_field(
                "non_field_errors",
                "Unable to log in with provided credentials.",
            ))
        }
    }
}

/// Create a new instance of the accounts module
pub fn create_module(state: AppState) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(AccountsModule::new(state))
}
