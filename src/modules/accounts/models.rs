use estante_db::Id;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Acting identity. Owns collections and authenticates with a token.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub id: Id,
    pub username: String,
    /// Argon2id hash in PHC string format; carries its own salt.
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub token: String,
}
