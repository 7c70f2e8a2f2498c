//! Plugin-based client registry
//!
//! Remote client implementations register a factory under a type name; the
//! daemon creates the configured client without knowing its concrete type.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use softener_core::registry::ClientRegistry;
//! use softener_core::config::{ClientConfig, Credentials};
//!
//! let registry = ClientRegistry::new();
//! softener_client_sim::register(&registry);
//!
//! let client = registry.create_client(&ClientConfig::default(), &credentials)?;
//! ```
//!
//! ## Registration
//!
//! Implementations register themselves during initialization:
//!
//! ```rust,ignore
//! // In softener-client-sim
//! pub fn register(registry: &ClientRegistry) {
//!     registry.register_client("simulated", Box::new(SimulatedClientFactory));
//! }
//! ```

use crate::config::{ClientConfig, Credentials};
use crate::error::{Error, Result};
use crate::traits::{RemoteClient, RemoteClientFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of remote client factories
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent lookups, exclusive
/// registration.
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, Box<dyn RemoteClientFactory>>>,
}

impl ClientRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client factory
    ///
    /// # Parameters
    ///
    /// - `name`: Client type name (e.g., "simulated")
    /// - `factory`: Factory object for creating client instances
    ///
    /// Registering a name twice replaces the earlier factory.
    pub fn register_client(&self, name: impl Into<String>, factory: Box<dyn RemoteClientFactory>) {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        clients.insert(name.into(), factory);
    }

    /// Create a remote client from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn RemoteClient>)`: Created client instance
    /// - `Err(Error)`: If the client type is not registered or creation fails
    pub fn create_client(
        &self,
        config: &ClientConfig,
        credentials: &Credentials,
    ) -> Result<Arc<dyn RemoteClient>> {
        let client_type = config.type_name();
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);

        let factory = clients
            .get(client_type)
            .ok_or_else(|| Error::config(format!("Unknown client type: {}", client_type)))?;

        factory.create(config, credentials)
    }

    /// List all registered client types, sorted
    pub fn list_clients(&self) -> Vec<String> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = clients.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a client type is registered
    pub fn has_client(&self, name: &str) -> bool {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockClientFactory;

    impl RemoteClientFactory for MockClientFactory {
        fn create(
            &self,
            _config: &ClientConfig,
            _credentials: &Credentials,
        ) -> Result<Arc<dyn RemoteClient>> {
            Err(Error::config("Mock client not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ClientRegistry::new();

        assert!(!registry.has_client("mock"));

        registry.register_client("mock", Box::new(MockClientFactory));

        assert!(registry.has_client("mock"));
        assert_eq!(registry.list_clients(), vec!["mock".to_string()]);
    }

    #[test]
    fn unknown_client_type_is_a_config_error() {
        let registry = ClientRegistry::new();
        let result = registry.create_client(
            &ClientConfig::default(),
            &Credentials::new("user", "secret"),
        );

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("simulated")),
            Err(other) => panic!("expected config error, got {other}"),
            Ok(_) => panic!("expected config error, got a client"),
        }
    }

    #[test]
    fn factory_errors_are_passed_through() {
        let registry = ClientRegistry::new();
        registry.register_client("simulated", Box::new(MockClientFactory));

        let result = registry.create_client(
            &ClientConfig::default(),
            &Credentials::new("user", "secret"),
        );
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Mock")));
    }
}
