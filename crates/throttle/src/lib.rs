//! Scoped request throttling.
//!
//! Each `(scope, identity)` pair owns an independent counter in a
//! [`CounterStore`]. A scope is configured with a [`Rate`]; once an identity
//! reaches the rate's request count inside the current window, further
//! requests are rejected until the window expires.

pub mod rate;
pub mod storage;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

pub use rate::{Rate, RateParseError};
pub use storage::{Admission, Counter, CounterStore, InMemoryCounterStore};

#[derive(Debug, Error)]
pub enum ThrottleError {
    #[error("no rate configured for throttle scope '{0}'")]
    UnknownScope(String),
    #[error("invalid rate for throttle scope '{scope}': {source}")]
    InvalidRate {
        scope: String,
        #[source]
        source: RateParseError,
    },
    #[error("counter store failure: {0}")]
    Storage(String),
}

/// Throttle applying a per-scope [`Rate`] to each caller identity.
pub struct ScopedThrottle {
    store: Arc<dyn CounterStore>,
    rates: HashMap<String, Rate>,
}

impl ScopedThrottle {
    pub fn new(store: Arc<dyn CounterStore>, rates: HashMap<String, Rate>) -> Self {
        Self { store, rates }
    }

    /// Build from textual rates such as `{"colecao": "200/hour"}`.
    pub fn from_config<'a>(
        store: Arc<dyn CounterStore>,
        rates: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Result<Self, ThrottleError> {
        let rates = rates
            .into_iter()
            .map(|(scope, rate)| {
                rate.parse::<Rate>()
                    .map(|rate| (scope.clone(), rate))
                    .map_err(|source| ThrottleError::InvalidRate {
                        scope: scope.clone(),
                        source,
                    })
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self::new(store, rates))
    }

    pub fn rate(&self, scope: &str) -> Option<Rate> {
        self.rates.get(scope).copied()
    }

    /// Fail unless `scope` has a configured rate.
    pub fn require(&self, scope: &str) -> Result<Rate, ThrottleError> {
        self.rate(scope)
            .ok_or_else(|| ThrottleError::UnknownScope(scope.to_string()))
    }

    pub fn cache_key(scope: &str, ident: &str) -> String {
        format!("throttle_{scope}_{ident}")
    }

    /// Count one request by `ident` against `scope`.
    pub async fn check(&self, scope: &str, ident: &str) -> Result<Admission, ThrottleError> {
        let rate = self.require(scope)?;
        let key = Self::cache_key(scope, ident);
        let admission = self
            .store
            .increment(&key, rate.num_requests, rate.window)
            .await?;

        if let Admission::Rejected { retry_after } = admission {
            tracing::info!(
                scope,
                ident,
                %rate,
                retry_after_secs = retry_after.as_secs(),
                "request throttled"
            );
        }

        Ok(admission)
    }

    /// Reset the counter of one identity within a scope.
    pub async fn forget(&self, scope: &str, ident: &str) -> Result<(), ThrottleError> {
        self.store.expire(&Self::cache_key(scope, ident)).await
    }

    /// Reset every counter in the underlying store.
    pub async fn reset(&self) -> Result<(), ThrottleError> {
        self.store.clear().await
    }

    pub async fn purge_expired(&self) -> Result<usize, ThrottleError> {
        self.store.purge_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle(rate: &str) -> ScopedThrottle {
        let rates = HashMap::from([("colecao".to_string(), rate.to_string())]);
        ScopedThrottle::from_config(Arc::new(InMemoryCounterStore::new()), &rates).unwrap()
    }

    #[tokio::test]
    async fn two_hundred_and_first_request_is_rejected() {
        let throttle = throttle("200/hour");

        for n in 1..=200 {
            let admission = throttle.check("colecao", "user:1").await.unwrap();
            assert!(admission.is_admitted(), "request {n} should pass");
        }
        let admission = throttle.check("colecao", "user:1").await.unwrap();
        assert!(!admission.is_admitted());
    }

    #[tokio::test]
    async fn identities_are_independent() {
        let throttle = throttle("1/hour");

        assert!(throttle.check("colecao", "user:1").await.unwrap().is_admitted());
        assert!(!throttle.check("colecao", "user:1").await.unwrap().is_admitted());
        assert!(throttle.check("colecao", "user:2").await.unwrap().is_admitted());
    }

    #[tokio::test]
    async fn scopes_are_independent() {
        let rates = HashMap::from([
            ("colecao".to_string(), "1/hour".to_string()),
            ("livros".to_string(), "1/hour".to_string()),
        ]);
        let throttle =
            ScopedThrottle::from_config(Arc::new(InMemoryCounterStore::new()), &rates).unwrap();

        assert!(throttle.check("colecao", "user:1").await.unwrap().is_admitted());
        assert!(throttle.check("livros", "user:1").await.unwrap().is_admitted());
    }

    #[tokio::test]
    async fn reset_and_forget_restore_quota() {
        let throttle = throttle("1/hour");

        throttle.check("colecao", "user:1").await.unwrap();
        throttle.forget("colecao", "user:1").await.unwrap();
        assert!(throttle.check("colecao", "user:1").await.unwrap().is_admitted());

        throttle.reset().await.unwrap();
        assert!(throttle.check("colecao", "user:1").await.unwrap().is_admitted());
    }

    #[tokio::test]
    async fn unknown_scope_is_an_error() {
        let throttle = throttle("1/hour");
        assert!(matches!(
            throttle.check("autor", "user:1").await,
            Err(ThrottleError::UnknownScope(_))
        ));
    }

    #[test]
    fn invalid_rate_names_the_scope() {
        let rates = HashMap::from([("colecao".to_string(), "lots".to_string())]);
        let err = ScopedThrottle::from_config(Arc::new(InMemoryCounterStore::new()), &rates)
            .err()
            .unwrap();
        assert!(err.to_string().contains("colecao"));
    }
}
