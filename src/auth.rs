//! Token authentication for owned resources.
//!
//! Clients send `Authorization: Token <key>`. No header, or a header using a
//! different scheme, means an anonymous caller. A `Token` header that does not
//! resolve to an identity is rejected outright.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use estante_authz::Decision;
use estante_db::Id;
use estante_http::AppError;

use crate::modules::accounts::repo as accounts;
use crate::state::AppState;

pub const TOKEN_KEYWORD: &str = "Token";

/// Authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Id,
    pub username: String,
}

/// Whoever issued the request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub principal: Option<Principal>,
    /// Network identity used to throttle anonymous callers.
    pub client: String,
}

impl Caller {
    pub fn user_id(&self) -> Option<Id> {
        self.principal.as_ref().map(|principal| principal.id)
    }

    /// Throttle bucket identity: the user when authenticated, else the client.
    pub fn throttle_ident(&self) -> String {
        match &self.principal {
            Some(principal) => format!("user:{}", principal.id),
            None => self.client.clone(),
        }
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let client = client_ident(parts);

        let Some(key) = token_from_headers(&parts.headers)? else {
            return Ok(Caller {
                principal: None,
                client,
            });
        };

        let user = accounts::user_by_token(&state.db, &key)
            .await?
            .ok_or_else(|| {
                tracing::debug!(%client, "unknown token presented");
                AppError::unauthorized("Invalid token.")
            })?;

        Ok(Caller {
            principal: Some(Principal {
                id: user.id,
                username: user.username,
            }),
            client,
        })
    }
}

/// Extract the token key, `None` when no token credential is present.
fn token_from_headers(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| {
        AppError::unauthorized(
            "Invalid token header. Token string should not contain invalid characters.",
        )
    })?;

    let mut words = value.split_whitespace();
    match words.next() {
        Some(keyword) if keyword.eq_ignore_ascii_case(TOKEN_KEYWORD) => {}
        _ => return Ok(None),
    }

    match (words.next(), words.next()) {
        (None, _) => Err(AppError::unauthorized(
            "Invalid token header. No credentials provided.",
        )),
        (Some(_), Some(_)) => Err(AppError::unauthorized(
            "Invalid token header. Token string should not contain spaces.",
        )),
        (Some(key), None) => Ok(Some(key.to_string())),
    }
}

fn client_ident(parts: &Parts) -> String {
    parts
        .headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|addr| addr.trim().to_string())
        .filter(|addr| !addr.is_empty())
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Turn a policy decision into the matching HTTP error.
pub fn enforce(decision: Decision) -> Result<(), AppError> {
    match decision {
        Decision::Allow => Ok(()),
        Decision::Unauthenticated => Err(AppError::unauthorized(
            "Authentication credentials were not provided.",
        )),
        Decision::Forbidden => Err(AppError::forbidden(
            "You do not have permission to perform this action.",
        )),
    }
}
