//! Caching layer for backend responses.
//!
//! Summed-up answers are cheap to reuse: sibling chains of one request often
//! send a backend the very same narrowing query, and requests arriving close
//! together repeat each other. Entries are keyed by the full serialized
//! request, so any differing field yields a distinct entry.
//!
//! Detailed itineraries are never cached.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use tracing::trace;

use crate::backend::{BackendError, Capabilities, ItineraryRequest, MisAdapter, SummedUpTrip};
use crate::domain::{DetailedTrip, Stop};

/// Cached summed-up answer.
type SummedUpEntry = Arc<Vec<SummedUpTrip>>;

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_capacity: 1000,
        }
    }
}

/// Adapter decorator with caching.
///
/// Wraps any `MisAdapter` and caches its summed-up answers, stop list and
/// capabilities.
pub struct CachedAdapter {
    inner: Arc<dyn MisAdapter>,
    summed_up: MokaCache<String, SummedUpEntry>,
    capabilities: MokaCache<(), Capabilities>,
    stops: MokaCache<(), Arc<Vec<Stop>>>,
}

impl CachedAdapter {
    /// Create a new cached adapter.
    pub fn new(inner: Arc<dyn MisAdapter>, config: &CacheConfig) -> Self {
        Self {
            inner,
            summed_up: MokaCache::builder()
                .time_to_live(config.ttl)
                .max_capacity(config.max_capacity)
                .build(),
            capabilities: MokaCache::builder().time_to_live(config.ttl).build(),
            stops: MokaCache::builder().time_to_live(config.ttl).build(),
        }
    }

    /// Cache key for a request, if it can be serialized.
    fn key(request: &ItineraryRequest) -> Option<String> {
        serde_json::to_string(request).ok()
    }
}

#[async_trait]
impl MisAdapter for CachedAdapter {
    async fn stops(&self) -> Result<Vec<Stop>, BackendError> {
        if let Some(cached) = self.stops.get(&()).await {
            return Ok(cached.as_ref().clone());
        }
        let stops = self.inner.stops().await?;
        self.stops.insert((), Arc::new(stops.clone())).await;
        Ok(stops)
    }

    async fn capabilities(&self) -> Result<Capabilities, BackendError> {
        if let Some(cached) = self.capabilities.get(&()).await {
            return Ok(cached);
        }
        let capabilities = self.inner.capabilities().await?;
        self.capabilities.insert((), capabilities.clone()).await;
        Ok(capabilities)
    }

    async fn itinerary(
        &self,
        request: &ItineraryRequest,
    ) -> Result<Option<DetailedTrip>, BackendError> {
        self.inner.itinerary(request).await
    }

    async fn summed_up_itineraries(
        &self,
        request: &ItineraryRequest,
    ) -> Result<Vec<SummedUpTrip>, BackendError> {
        let Some(key) = Self::key(request) else {
            return self.inner.summed_up_itineraries(request).await;
        };

        if let Some(cached) = self.summed_up.get(&key).await {
            trace!("summed-up cache hit");
            return Ok(cached.as_ref().clone());
        }

        // Errors are not cached
        let trips = self.inner.summed_up_itineraries(request).await?;
        self.summed_up.insert(key, Arc::new(trips.clone())).await;
        Ok(trips)
    }
}
