//! Request extractors that reject with [`AppError`] instead of plain text.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::{field_error, AppError};

/// JSON request body; malformed payloads become validation errors.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Payload(value)),
            Err(rejection) => Err(rejection_to_error(rejection)),
        }
    }
}

impl<T> Payload<T>
where
    T: DeserializeOwned,
{
    /// Parse the body of a request whose handler ran its own checks first.
    ///
    /// Handlers take the raw [`Request`] as their last extractor and call this
    /// once the caller is known to be allowed, so the body shape is never
    /// reported ahead of an authorization failure.
    pub async fn parse(req: Request) -> Result<T, AppError> {
        let Payload(value) = Self::from_request(req, &()).await?;
        Ok(value)
    }
}

fn rejection_to_error(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::JsonDataError(err) => AppError::validation(
            vec![field_error("non_field_errors", &err.body_text())],
            "Invalid data.",
        ),
        JsonRejection::JsonSyntaxError(err) => AppError::bad_request(err.body_text()),
        JsonRejection::MissingJsonContentType(err) => AppError::bad_request(err.body_text()),
        other => AppError::bad_request(other.body_text()),
    }
}
