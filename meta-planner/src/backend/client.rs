//! HTTP adapter for backends speaking the common request shape as JSON.
//!
//! Every query is a single HTTP call against the backend's base endpoint.
//! The credential travels as HTTP Basic authentication.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::domain::{Backend, DetailedTrip, Stop};

use super::adapter::MisAdapter;
use super::error::BackendError;
use super::types::{
    Capabilities, CapabilitiesResponse, ItineraryRequest, ItineraryResponse, StopsResponse,
    SummedUpResponse, SummedUpTrip,
};

/// Default maximum concurrent requests per backend.
const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How much of an undecodable body to keep for diagnostics.
const BODY_SNIPPET_CHARS: usize = 500;

/// Configuration for the HTTP adapter.
#[derive(Debug, Clone)]
pub struct HttpAdapterConfig {
    /// Base URL of the backend's adapter endpoint
    pub base_url: String,
    /// Credential for Basic authentication
    pub api_key: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl HttpAdapterConfig {
    /// Create a config for the given endpoint and credential.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Build a config from a backend description.
    pub fn for_backend(backend: &Backend) -> Self {
        Self::new(&backend.api_url, &backend.api_key)
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// JSON-over-HTTP adapter.
///
/// Uses a semaphore to limit concurrent requests against one backend.
#[derive(Debug, Clone)]
pub struct HttpAdapter {
    http: reqwest::Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
}

impl HttpAdapter {
    /// Create a new adapter with the given configuration.
    pub fn new(config: HttpAdapterConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();

        if !config.api_key.is_empty() {
            let encoded = STANDARD.encode(format!("{}:", config.api_key));
            let value = HeaderValue::from_str(&format!("Basic {encoded}"))
                .map_err(|_| BackendError::BadRequest("invalid credential format".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send a request and decode the JSON envelope.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| BackendError::Internal("semaphore closed".to_string()))?;

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(BackendError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http(format!("status {}: {}", status.as_u16(), body)));
        }

        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| BackendError::Decode {
            message: e.to_string(),
            body: Some(body.chars().take(BODY_SNIPPET_CHARS).collect()),
        })
    }
}

#[async_trait]
impl MisAdapter for HttpAdapter {
    async fn stops(&self) -> Result<Vec<Stop>, BackendError> {
        let resp: StopsResponse = self.send(self.http.get(self.url("stops"))).await?;
        resp.status.check(resp.message)?;
        Ok(resp.stops)
    }

    async fn capabilities(&self) -> Result<Capabilities, BackendError> {
        let resp: CapabilitiesResponse =
            self.send(self.http.get(self.url("capabilities"))).await?;
        resp.status.check(resp.message)?;
        resp.capabilities.ok_or_else(|| BackendError::Decode {
            message: "OK response without capabilities".into(),
            body: None,
        })
    }

    async fn itinerary(
        &self,
        request: &ItineraryRequest,
    ) -> Result<Option<DetailedTrip>, BackendError> {
        debug!(
            base_url = %self.base_url,
            departures = request.departures.len(),
            arrivals = request.arrivals.len(),
            "detailed itinerary request"
        );
        let resp: ItineraryResponse = self
            .send(self.http.post(self.url("itinerary")).json(request))
            .await?;
        resp.status.check(resp.message)?;
        Ok(resp.detailed_trip)
    }

    async fn summed_up_itineraries(
        &self,
        request: &ItineraryRequest,
    ) -> Result<Vec<SummedUpTrip>, BackendError> {
        debug!(
            base_url = %self.base_url,
            departures = request.departures.len(),
            arrivals = request.arrivals.len(),
            joint = request.is_jointly_optimized(),
            "summed-up itineraries request"
        );
        let resp: SummedUpResponse = self
            .send(
                self.http
                    .post(self.url("summed-up-itineraries"))
                    .json(request),
            )
            .await?;
        resp.status.check(resp.message)?;
        Ok(resp.trips)
    }
}
