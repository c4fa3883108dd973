//! Query endpoints: backend stops or raw coordinates.

use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use super::{DomainError, StopCode};

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    /// Create a coordinate, rejecting out-of-range or non-finite values.
    pub fn new(lat: f64, lon: f64) -> Result<Self, DomainError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(DomainError::InvalidCoordinate("latitude out of range"));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(DomainError::InvalidCoordinate("longitude out of range"));
        }
        Ok(Self { lat, lon })
    }

    /// Great-circle distance in metres.
    pub fn distance_m(&self, other: &Coord) -> f64 {
        Haversine.distance(self.to_point(), other.to_point())
    }

    fn to_point(self) -> Point {
        Point::new(self.lon, self.lat)
    }
}

/// One end of a backend query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// A stop known to the queried backend.
    Stop(StopCode),
    /// A raw position.
    Coord(Coord),
}

impl Location {
    /// Returns the stop code if this is a stop.
    pub fn as_stop(&self) -> Option<&StopCode> {
        match self {
            Location::Stop(code) => Some(code),
            Location::Coord(_) => None,
        }
    }

    /// Returns the position if this is a raw coordinate.
    pub fn as_coord(&self) -> Option<&Coord> {
        match self {
            Location::Coord(coord) => Some(coord),
            Location::Stop(_) => None,
        }
    }
}

impl From<StopCode> for Location {
    fn from(code: StopCode) -> Self {
        Location::Stop(code)
    }
}

impl From<Coord> for Location {
    fn from(coord: Coord) -> Self {
        Location::Coord(coord)
    }
}

/// A stop as published by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub code: StopCode,
    #[serde(default)]
    pub name: String,
    pub position: Coord,
}

/// Collapse a list of locations to its distinct members, keeping first-seen
/// order.
pub fn distinct_locations<'a>(locations: impl IntoIterator<Item = &'a Location>) -> Vec<Location> {
    let mut out: Vec<Location> = Vec::new();
    for loc in locations {
        if !out.contains(loc) {
            out.push(loc.clone());
        }
    }
    out
}
