pub mod accounts;
pub mod catalog;
pub mod collections;
pub mod discovery;

use estante_kernel::ModuleRegistry;

use crate::state::AppState;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, state: &AppState) {
    registry.register(accounts::create_module(state.clone()));
    registry.register(discovery::create_module());
    registry.register(catalog::create_module(state.clone()));
    registry.register(collections::create_module(state.clone()));
}
