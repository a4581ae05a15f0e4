//! Request-scoped helpers shared by the resource modules.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use estante_db::{Id, Page};
use estante_http::{error::field_error, AppError};
use serde::Serialize;
use time::{macros::format_description, Date};

/// Builds absolute resource URLs from the request's host.
#[derive(Debug, Clone, Default)]
pub struct Links {
    base: String,
    path: String,
    query: Option<String>,
}

impl Links {
    pub fn new(base: impl Into<String>, path: impl Into<String>, query: Option<String>) -> Self {
        Self {
            base: base.into(),
            path: path.into(),
            query,
        }
    }

    fn from_parts(parts: &Parts) -> Self {
        Self::new(
            base_url(&parts.headers).unwrap_or_default(),
            parts.uri.path(),
            parts.uri.query().map(str::to_string),
        )
    }

    pub fn absolute(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn book(&self, id: Id) -> String {
        self.absolute(&format!("/livros/{}/", id))
    }

    pub fn author(&self, id: Id) -> String {
        self.absolute(&format!("/autor/{}/", id))
    }

    pub fn category(&self, id: Id) -> String {
        self.absolute(&format!("/categoria/{}/", id))
    }

    pub fn collection(&self, id: Id) -> String {
        self.absolute(&format!("/colecao/{}/", id))
    }

    /// The current URL pointing at page `number`; page 1 drops the parameter.
    pub fn page(&self, number: usize) -> String {
        let mut pairs: Vec<String> = self
            .query
            .as_deref()
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty() && pair.split('=').next() != Some("page"))
            .map(str::to_string)
            .collect();
        if number > 1 {
            pairs.push(format!("page={}", number));
        }

        let url = self.absolute(&self.path);
        if pairs.is_empty() {
            url
        } else {
            format!("{}?{}", url, pairs.join("&"))
        }
    }
}

impl<S> FromRequestParts<S> for Links
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

fn base_url(headers: &HeaderMap) -> Option<String> {
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    Some(format!("{}://{}", scheme, host))
}

/// List envelope: `count`, `next`, `previous`, `results`.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(page: Page<T>, links: &Links) -> Self {
        Self {
            count: page.count,
            next: page.has_next.then(|| links.page(page.number + 1)),
            previous: page.has_previous.then(|| links.page(page.number - 1)),
            results: page.results,
        }
    }
}

/// Collects field-level validation failures for one payload.
#[derive(Debug, Default)]
pub struct FieldErrors {
    details: Vec<serde_json::Value>,
}

impl FieldErrors {
    pub fn add(&mut self, field: &str, error: impl Into<String>) {
        self.details.push(field_error(field, &error.into()));
    }

    /// `given`, else `fallback`, else a "required" error.
    pub fn field<T>(&mut self, field: &str, given: Option<T>, fallback: Option<T>) -> Option<T> {
        let value = given.or(fallback);
        if value.is_none() {
            self.add(field, "This field is required.");
        }
        value
    }

    /// Trimmed text, rejecting blanks.
    pub fn non_blank(&mut self, field: &str, value: String) -> Option<String> {
        let value = value.trim().to_string();
        if value.is_empty() {
            self.add(field, "This field may not be blank.");
            return None;
        }
        Some(value)
    }

    pub fn check<T>(&mut self, field: &str, result: Result<T, String>) -> Option<T> {
        result.map_err(|error| self.add(field, error)).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    pub fn into_error(self) -> AppError {
        AppError::validation(self.details, "Invalid data.")
    }
}

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<Date, String> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).map_err(|_| {
        "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.".to_string()
    })
}

/// Parse a path id; anything that is not an id is simply not found.
pub fn lookup_id(raw: &str) -> Result<Id, AppError> {
    raw.parse().map_err(|_| AppError::not_found("Not found."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn page_links_keep_other_parameters() {
        let links = Links::new(
            "http://testserver",
            "/livros/",
            Some("search=eu&page=2&ordering=-titulo".into()),
        );
        assert_eq!(
            links.page(3),
            "http://testserver/livros/?search=eu&ordering=-titulo&page=3"
        );
        assert_eq!(
            links.page(1),
            "http://testserver/livros/?search=eu&ordering=-titulo"
        );
    }

    #[test]
    fn resource_links_without_host_are_relative() {
        let links = Links::default();
        assert_eq!(links.collection(4), "/colecao/4/");
    }

    #[test]
    fn field_errors_collect_details() {
        let mut errors = FieldErrors::default();
        assert_eq!(errors.field::<String>("titulo", None, None), None);
        assert_eq!(errors.non_blank("nome", "  ".into()), None);
        assert_eq!(
            errors.check("autor", Ok::<_, String>(3)),
            Some(3)
        );
        assert!(!errors.is_empty());
        assert_eq!(errors.into_error().status(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn parses_iso_dates_only() {
        assert_eq!(parse_date("1950-12-02"), Ok(date!(1950 - 12 - 02)));
        assert!(parse_date("02/12/1950").is_err());
    }
}
