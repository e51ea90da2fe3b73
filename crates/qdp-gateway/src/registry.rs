//! Explicit gateway plugin table.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::GatewayFactory;

/// Name to factory table, filled by the host at startup.
#[derive(Default)]
pub struct GatewayRegistry {
    factories: HashMap<String, Arc<dyn GatewayFactory>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under its own name, replacing any previous one.
    pub fn register(&mut self, factory: Arc<dyn GatewayFactory>) {
        let name = factory.name().to_string();
        info!(gateway = %name, "Registered gateway factory");
        self.factories.insert(name, factory);
    }

    /// Look up a factory by name.
    pub fn get(&self, name: &str) -> GatewayResult<Arc<dyn GatewayFactory>> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownGateway(name.to_string()))
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayRegistry")
            .field("factories", &self.names())
            .finish()
    }
}
