//! Data transfer objects for inbound client messages.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::backend::{Algorithm, SelfDriveCondition, TimeConstraint};
use crate::domain::{Coord, Location, Mode};
use crate::planner::{SearchRequest, TripQuery};

/// A client request that cannot be run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("bad request: {0}")]
    BadRequest(String),
}

fn default_language() -> String {
    "en".to_string()
}

/// Request to plan a trip.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TripRequestDto {
    /// Client-chosen id echoed on every notification
    pub request_id: String,

    pub origin: Coord,
    pub destination: Coord,

    /// Leave no earlier than this; exclusive with `arrival_time`
    pub departure_time: Option<NaiveDateTime>,

    /// Arrive no later than this; exclusive with `departure_time`
    pub arrival_time: Option<NaiveDateTime>,

    /// Maximum number of chains to search
    pub max_trips: Option<usize>,

    #[serde(default)]
    pub algorithm: Algorithm,

    #[serde(default)]
    pub modes: Vec<Mode>,

    #[serde(default)]
    pub self_drive_conditions: Vec<SelfDriveCondition>,

    #[serde(default)]
    pub accessibility_constraint: bool,

    #[serde(default = "default_language")]
    pub language: String,
}

impl TripRequestDto {
    /// Validate into a runnable search.
    pub fn into_search(self) -> Result<SearchRequest, RequestError> {
        if self.request_id.trim().is_empty() {
            return Err(RequestError::BadRequest("request_id must not be empty".into()));
        }

        let time = match (self.departure_time, self.arrival_time) {
            (Some(t), None) => TimeConstraint::DepartureTime(t),
            (None, Some(t)) => TimeConstraint::ArrivalTime(t),
            (Some(_), Some(_)) => {
                return Err(RequestError::BadRequest(
                    "give either departure_time or arrival_time, not both".into(),
                ));
            }
            (None, None) => {
                return Err(RequestError::BadRequest(
                    "one of departure_time or arrival_time is required".into(),
                ));
            }
        };

        if self.max_trips == Some(0) {
            return Err(RequestError::BadRequest("max_trips must be at least 1".into()));
        }

        let origin = checked(self.origin, "origin")?;
        let destination = checked(self.destination, "destination")?;

        Ok(SearchRequest {
            request_id: self.request_id,
            query: TripQuery {
                origin: Location::Coord(origin),
                destination: Location::Coord(destination),
                time,
                algorithm: self.algorithm,
                modes: self.modes,
                self_drive_conditions: self.self_drive_conditions,
                accessibility_constraint: self.accessibility_constraint,
                language: self.language,
            },
            max_trips: self.max_trips,
        })
    }
}

fn checked(coord: Coord, field: &str) -> Result<Coord, RequestError> {
    Coord::new(coord.lat, coord.lon).map_err(|e| RequestError::BadRequest(format!("{field}: {e}")))
}

/// A message received on the trip socket.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    TripRequest(TripRequestDto),
    Cancel { request_id: String },
}

/// Error body for HTTP responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
