//! Registry from adapter family name to adapter constructor.
//!
//! Each backend names the family of adapter that speaks its protocol. The
//! registry builds adapters on demand and keeps them in a moka cache keyed by
//! backend id, so HTTP clients and response caches survive across requests.

use std::collections::HashMap;
use std::sync::Arc;

use moka::future::Cache as MokaCache;
use tracing::debug;

use crate::cache::{CacheConfig, CachedAdapter};
use crate::domain::{Backend, BackendId};

use super::adapter::MisAdapter;
use super::client::{HttpAdapter, HttpAdapterConfig};
use super::error::BackendError;

/// Family name of the built-in JSON-over-HTTP adapter.
pub const JSON_HTTP_FAMILY: &str = "json-http";

/// Builds an adapter for one backend.
pub type AdapterConstructor =
    Arc<dyn Fn(&Backend) -> Result<Arc<dyn MisAdapter>, BackendError> + Send + Sync>;

/// Adapter registry.
#[derive(Clone)]
pub struct AdapterRegistry {
    constructors: HashMap<String, AdapterConstructor>,
    adapters: MokaCache<BackendId, Arc<dyn MisAdapter>>,
    response_cache: Option<CacheConfig>,
}

impl AdapterRegistry {
    /// Create an empty registry without response caching.
    pub fn new() -> Self {
        let defaults = CacheConfig::default();
        Self {
            constructors: HashMap::new(),
            adapters: MokaCache::builder()
                .time_to_live(defaults.ttl)
                .max_capacity(defaults.max_capacity)
                .build(),
            response_cache: None,
        }
    }

    /// Create a registry with the built-in adapter families registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(JSON_HTTP_FAMILY, |backend: &Backend| {
            let adapter = HttpAdapter::new(HttpAdapterConfig::for_backend(backend))?;
            Ok(Arc::new(adapter) as Arc<dyn MisAdapter>)
        });
        registry
    }

    /// Wrap every adapter built from now on in a response cache.
    pub fn with_response_cache(mut self, config: CacheConfig) -> Self {
        self.adapters = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();
        self.response_cache = Some(config);
        self
    }

    /// Register (or replace) the constructor for a family.
    pub fn register<F>(&mut self, family: impl Into<String>, constructor: F)
    where
        F: Fn(&Backend) -> Result<Arc<dyn MisAdapter>, BackendError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(family.into(), Arc::new(constructor));
    }

    /// Returns true if a constructor exists for `family`.
    pub fn knows(&self, family: &str) -> bool {
        self.constructors.contains_key(family)
    }

    /// The adapter for `backend`, built on first use.
    pub async fn adapter_for(&self, backend: &Backend) -> Result<Arc<dyn MisAdapter>, BackendError> {
        if let Some(adapter) = self.adapters.get(&backend.id).await {
            return Ok(adapter);
        }

        let constructor = self
            .constructors
            .get(&backend.adapter)
            .ok_or_else(|| BackendError::UnknownAdapter(backend.adapter.clone()))?;

        debug!(backend = %backend.id, family = %backend.adapter, "building adapter");
        let mut adapter = constructor(backend)?;
        if let Some(config) = &self.response_cache {
            adapter = Arc::new(CachedAdapter::new(adapter, config));
        }

        self.adapters.insert(backend.id, adapter.clone()).await;
        Ok(adapter)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
