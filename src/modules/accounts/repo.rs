//! Queries for users and their tokens.

use estante_db::{Database, DbError, Id};
use uuid::Uuid;

use super::models::User;

/// Insert a user with a fresh token, returning both.
pub async fn insert_user(
    db: &Database,
    username: &str,
    password_hash: &str,
) -> Result<(User, String), DbError> {
    let mut tx = db.pool().begin().await?;
    let user: User = sqlx::query_as(
        "INSERT INTO usuario (username, password_hash) VALUES (?, ?) \
         RETURNING id, username, password_hash",
    )
    .bind(username)
    .bind(password_hash)
    .fetch_one(&mut *tx)
    .await?;

    let token = Uuid::new_v4().simple().to_string();
    sqlx::query("INSERT INTO token (chave, usuario_id) VALUES (?, ?)")
        .bind(&token)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok((user, token))
}

pub async fn user_by_username(db: &Database, username: &str) -> Result<Option<User>, DbError> {
    Ok(
        sqlx::query_as("SELECT id, username, password_hash FROM usuario WHERE username = ?")
            .bind(username)
            .fetch_optional(db.pool())
            .await?,
    )
}

/// Owner of token `key`.
pub async fn user_by_token(db: &Database, key: &str) -> Result<Option<User>, DbError> {
    Ok(sqlx::query_as(
        "SELECT usuario.id, usuario.username, usuario.password_hash \
         FROM token JOIN usuario ON usuario.id = token.usuario_id \
         WHERE token.chave = ?",
    )
    .bind(key)
    .fetch_optional(db.pool())
    .await?)
}

pub async fn token_for(db: &Database, user_id: Id) -> Result<Option<String>, DbError> {
    Ok(
        sqlx::query_scalar("SELECT chave FROM token WHERE usuario_id = ?")
            .bind(user_id)
            .fetch_optional(db.pool())
            .await?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tokens_identify_users() {
        let db = crate::testing::database().await;
        let (user, token) = insert_user(&db, "user01", "$argon2id$stub").await.unwrap();

        assert_eq!(user_by_token(&db, &token).await.unwrap(), Some(user.clone()));
        assert_eq!(user_by_token(&db, "nope").await.unwrap(), None);
        assert_eq!(token_for(&db, user.id).await.unwrap(), Some(token));
        assert_eq!(
            user_by_username(&db, "user01").await.unwrap().map(|u| u.id),
            Some(user.id)
        );
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let db = crate::testing::database().await;
        insert_user(&db, "user01", "$argon2id$stub").await.unwrap();
        let err = insert_user(&db, "user01", "$argon2id$other").await.unwrap_err();
        assert!(err.is_unique_violation());
    }
}
