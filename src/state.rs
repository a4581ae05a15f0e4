use std::sync::Arc;

use anyhow::Context;
use estante_db::Database;
use estante_kernel::settings::Settings;
use estante_throttle::{InMemoryCounterStore, ScopedThrottle};

use crate::modules::accounts::{self, models::User};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub throttle: Arc<ScopedThrottle>,
    pub page_size: usize,
}

impl AppState {
    pub fn new(db: Database, throttle: ScopedThrottle, page_size: usize) -> Self {
        Self {
            db,
            throttle: Arc::new(throttle),
            page_size,
        }
    }

    /// Open the configured database with an in-memory counter store and the
    /// configured rates. Migrations are not applied here.
    pub async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let throttle = ScopedThrottle::from_config(
            Arc::new(InMemoryCounterStore::new()),
            &settings.throttle.rates,
        )
        .context("invalid throttle configuration")?;

        let db = Database::connect(&settings.database)
            .await
            .context("failed to open the database")?;

        Ok(Self::new(db, throttle, settings.api.page_size))
    }

    /// Provision an identity, returning it with its token.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
    ) -> anyhow::Result<(User, String)> {
        accounts::provision(&self.db, username, password).await
    }
}
