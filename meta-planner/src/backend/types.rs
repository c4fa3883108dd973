//! Wire types of the common adapter contract.
//!
//! Every backend, whatever its native protocol, is queried with an
//! [`ItineraryRequest`] and answers with one of the response envelopes below.
//! Envelopes carry a [`ResponseStatus`] that maps onto [`BackendError`].

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::{DetailedTrip, Location, Mode, SelfDriveMode, Stop, duration_secs};

use super::error::BackendError;

/// The single time bound of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeConstraint {
    /// Leave no earlier than this instant.
    DepartureTime(NaiveDateTime),
    /// Arrive no later than this instant.
    ArrivalTime(NaiveDateTime),
}

impl TimeConstraint {
    pub fn instant(&self) -> NaiveDateTime {
        match self {
            TimeConstraint::DepartureTime(t) | TimeConstraint::ArrivalTime(t) => *t,
        }
    }

    pub fn is_departure(&self) -> bool {
        matches!(self, TimeConstraint::DepartureTime(_))
    }
}

/// Routing criterion passed through to backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Algorithm {
    #[default]
    Classic,
    Fastest,
    MinimumInterchanges,
    ShortestWalk,
}

/// Which end of the whole trip a self-drive condition applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripPart {
    Departure,
    Arrival,
}

/// Allows a self-driven access or egress section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfDriveCondition {
    pub trip_part: TripPart,
    pub self_drive_mode: SelfDriveMode,
}

/// Extra behaviour requested from a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryOption {
    /// Optimize jointly over every departure x arrival pair and answer once
    /// per point on the multi-point side.
    DepartureArrivalOptimized,
}

/// A query in the common one-to-many / many-to-one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryRequest {
    pub departures: Vec<Location>,
    pub arrivals: Vec<Location>,
    pub time: TimeConstraint,
    #[serde(default)]
    pub algorithm: Algorithm,
    #[serde(default)]
    pub modes: Vec<Mode>,
    #[serde(default)]
    pub self_drive_conditions: Vec<SelfDriveCondition>,
    #[serde(default)]
    pub accessibility_constraint: bool,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub options: Vec<QueryOption>,
}

impl ItineraryRequest {
    /// True if the joint departure x arrival optimization was requested.
    pub fn is_jointly_optimized(&self) -> bool {
        self.options.contains(&QueryOption::DepartureArrivalOptimized)
    }
}

/// A coarse, time-only answer for one departure/arrival pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummedUpTrip {
    pub departure: Location,
    pub departure_time: NaiveDateTime,
    pub arrival: Location,
    pub arrival_time: NaiveDateTime,
    #[serde(default)]
    pub interchange_number: u32,
    #[serde(with = "duration_secs", default = "Duration::zero")]
    pub interchange_duration: Duration,
}

/// Static capabilities a backend advertises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub multi_point: bool,
    pub geographic_position: bool,
    #[serde(default)]
    pub modes: BTreeSet<Mode>,
}

/// Status code of every response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Ok,
    DateOutOfScope,
    BadRequest,
    Unauthorized,
    InternalError,
}

impl ResponseStatus {
    /// Map a status onto the adapter error taxonomy.
    pub fn check(self, message: Option<String>) -> Result<(), BackendError> {
        let message = message.unwrap_or_default();
        match self {
            ResponseStatus::Ok => Ok(()),
            ResponseStatus::DateOutOfScope => Err(BackendError::DateOutOfScope(message)),
            ResponseStatus::BadRequest => Err(BackendError::BadRequest(message)),
            ResponseStatus::Unauthorized => Err(BackendError::Unauthorized),
            ResponseStatus::InternalError => Err(BackendError::Internal(message)),
        }
    }
}

/// Envelope of a summed-up query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummedUpResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub trips: Vec<SummedUpTrip>,
}

/// Envelope of a detailed query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detailed_trip: Option<DetailedTrip>,
}

/// Envelope of a stop listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopsResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stops: Vec<Stop>,
}

/// Envelope of a capabilities query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitiesResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub message: Option<String>,
    pub capabilities: Option<Capabilities>,
}
