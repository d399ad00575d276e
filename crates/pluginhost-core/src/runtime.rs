//! Prioritized class lookup over a plugin's namespaces.

use std::sync::Arc;

use tracing::trace;

use pluginhost_protocols::{ClassResolver, PluginError, PluginRuntime, Resolution, ServiceConstructor};

/// Ordered list of [`ClassResolver`]s tried in sequence.
#[derive(Clone, Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn ClassResolver>>,
}

impl ResolverChain {
    pub fn new(resolvers: Vec<Arc<dyn ClassResolver>>) -> Self {
        Self { resolvers }
    }

    pub fn for_runtime(runtime: &dyn PluginRuntime) -> Self {
        Self::new(runtime.class_resolvers())
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Namespaces in lookup order.
    pub fn namespaces(&self) -> Vec<String> {
        self.resolvers.iter().map(|r| r.namespace().to_string()).collect()
    }

    /// First constructor found for `class`.
    pub fn resolve_service(&self, class: &str) -> Result<ServiceConstructor, PluginError> {
        for resolver in &self.resolvers {
            match resolver.resolve_service(class) {
                Resolution::Found(ctor) => return Ok(ctor),
                Resolution::NotFound => {
                    trace!(class, namespace = resolver.namespace(), "class not in namespace");
                }
            }
        }
        Err(PluginError::ClassLoad {
            class: class.to_string(),
            searched: self.resolvers.len(),
        })
    }
}
