use std::sync::Arc;

use sesh_sessions::RegistryHandle;

/// Shared gateway runtime state, wrapped in Arc for use across handlers.
pub struct GatewayState {
    /// Entry point to the session registry worker.
    pub registry: RegistryHandle,
    /// Server version string.
    pub version: String,
}

impl GatewayState {
    pub fn new(registry: RegistryHandle) -> Arc<Self> {
        Arc::new(Self {
            registry,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}
