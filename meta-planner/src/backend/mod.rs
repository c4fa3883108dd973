//! Backend (MIS) adapters.
//!
//! Every transport-information backend is reached through the [`MisAdapter`]
//! capability interface, in a restricted request shape:
//! - summed-up queries are one-to-many or many-to-one and return only timing
//! - detailed queries return one fully sectioned trip
//! - status codes map onto [`BackendError`]
//!
//! Adapters are looked up by family name in an [`AdapterRegistry`].

mod adapter;
mod client;
mod error;
#[cfg(test)]
pub mod mock;
mod registry;
mod types;

pub use adapter::MisAdapter;
pub use client::{HttpAdapter, HttpAdapterConfig};
pub use error::BackendError;
pub use registry::{AdapterConstructor, AdapterRegistry, JSON_HTTP_FAMILY};
pub use types::{
    Algorithm, Capabilities, CapabilitiesResponse, ItineraryRequest, ItineraryResponse,
    QueryOption, ResponseStatus, SelfDriveCondition, StopsResponse, SummedUpResponse,
    SummedUpTrip, TimeConstraint, TripPart,
};
