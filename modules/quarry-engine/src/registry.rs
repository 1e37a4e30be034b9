//! Handler registry.
//!
//! Maps handler names (e.g. "press_releases") to implementations. Populated
//! explicitly at startup; the run plan references handlers by these names,
//! so an unknown name is caught when that job runs, never via reflection.

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::JobHandler;

/// Explicit name → handler mapping, built once at startup.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under a name. Re-registering replaces the previous
    /// handler.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered handler names, sorted for stable output.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use quarry_common::JobConfig;

    use crate::traits::Payload;

    struct NoOpHandler;

    #[async_trait]
    impl JobHandler for NoOpHandler {
        async fn fetch(&self, _config: &JobConfig) -> Result<Payload> {
            Ok(Payload::Json(serde_json::json!([])))
        }

        async fn process(&self, raw: Payload, _config: &JobConfig) -> Result<Payload> {
            Ok(raw)
        }

        async fn update(&self, _processed: Payload, _config: &JobConfig) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = HandlerRegistry::new();
        registry.register("noop", Arc::new(NoOpHandler));

        assert!(registry.is_registered("noop"));
        assert!(registry.get("noop").is_some());
        assert!(!registry.is_registered("missing"));
        assert_eq!(registry.registered_names(), vec!["noop"]);
    }
}
