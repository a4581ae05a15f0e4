//! Estante application library
//!
//! Wires the catalog, collections and accounts modules into one HTTP service.

pub mod auth;
pub mod modules;
pub mod state;
pub mod utils;

#[cfg(test)]
mod testing;

use anyhow::Context;
use axum::Router;
use estante_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub use state::AppState;

/// Registry holding every application module, bound to `state`.
pub fn registry(state: &AppState) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, state);
    registry
}

/// Apply pending migrations, then initialize every module.
pub async fn prepare(state: &AppState, settings: &Settings) -> anyhow::Result<ModuleRegistry> {
    let registry = registry(state);
    state
        .db
        .migrate(&registry.collect_migrations())
        .await
        .context("database migration failed")?;
    registry
        .init_modules(&InitCtx { settings })
        .await
        .context("module initialization failed")?;
    Ok(registry)
}

/// Prepare the modules and build the full router, without serving it.
pub async fn router(state: &AppState, settings: &Settings) -> anyhow::Result<Router> {
    let registry = prepare(state, settings).await?;
    Ok(estante_http::build_router(&registry, settings))
}

/// Serve until Ctrl-C, then stop every module.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let state = AppState::from_settings(&settings).await?;
    let registry = prepare(&state, &settings).await?;
    let ctx = InitCtx {
        settings: &settings,
    };
    registry.start_modules(&ctx).await?;

    let served = estante_http::start_server(&registry, &settings, shutdown_signal()).await;

    registry.stop_modules().await?;
    state.db.close().await;
    served
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
