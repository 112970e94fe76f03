use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{CommandAction, FragmentMeta};
use crate::service::Service;

/// Builds a service instance from its manifest metadata and `[service.options]`.
pub type ServiceFactory = Arc<
    dyn Fn(FragmentMeta, &toml::Table) -> Result<Arc<dyn Service>, String> + Send + Sync,
>;

/// Compiled-in implementations that fragment manifests refer to by name.
///
/// Manifests never carry code. A `[run] handler = "x"` entry resolves to the
/// action registered here as `x`, and `[service] kind = "y"` to the factory
/// registered as `y`.
#[derive(Clone, Default)]
pub struct FragmentCatalog {
    handlers: HashMap<String, Arc<dyn CommandAction>>,
    services: HashMap<String, ServiceFactory>,
}

impl FragmentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the built-in handlers and service kinds
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        crate::builtin::register(&mut catalog);
        catalog
    }

    pub fn register_handler(&mut self, name: impl Into<String>, action: Arc<dyn CommandAction>) {
        self.handlers.insert(name.into(), action);
    }

    pub fn register_service<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(FragmentMeta, &toml::Table) -> Result<Arc<dyn Service>, String>
            + Send
            + Sync
            + 'static,
    {
        self.services.insert(kind.into(), Arc::new(factory));
    }

    pub fn handler(&self, name: &str) -> Option<Arc<dyn CommandAction>> {
        self.handlers.get(name).cloned()
    }

    pub fn service(&self, kind: &str) -> Option<ServiceFactory> {
        self.services.get(kind).cloned()
    }

    pub fn handler_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for FragmentCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.services.keys().collect();
        kinds.sort();
        f.debug_struct("FragmentCatalog")
            .field("handlers", &self.handler_names())
            .field("services", &kinds)
            .finish()
    }
}
