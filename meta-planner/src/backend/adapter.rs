//! The capability interface every backend adapter implements.

use async_trait::async_trait;

use crate::domain::{DetailedTrip, Stop};

use super::error::BackendError;
use super::types::{Capabilities, ItineraryRequest, SummedUpTrip};

/// A transport-information backend behind the common request shape.
///
/// Backends accept at most one "far" endpoint and many "near" endpoints per
/// query. Implementations translate to their native protocol; the planner
/// only ever sees this trait.
#[async_trait]
pub trait MisAdapter: Send + Sync {
    /// Every stop the backend knows.
    async fn stops(&self) -> Result<Vec<Stop>, BackendError>;

    /// What the backend can do.
    async fn capabilities(&self) -> Result<Capabilities, BackendError>;

    /// A detailed itinerary, or `None` if the backend found no trip.
    async fn itinerary(
        &self,
        request: &ItineraryRequest,
    ) -> Result<Option<DetailedTrip>, BackendError>;

    /// Coarse, time-only itineraries between the requested points.
    ///
    /// Points the backend cannot serve are simply absent from the answer.
    async fn summed_up_itineraries(
        &self,
        request: &ItineraryRequest,
    ) -> Result<Vec<SummedUpTrip>, BackendError>;
}
