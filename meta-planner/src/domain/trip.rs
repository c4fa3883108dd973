//! Trip types.
//!
//! A `DetailedTrip` is one backend's fully sectioned answer. A `ComposedTrip`
//! strings one detailed trip per backend of a chain into a single itinerary.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{DomainError, Location, Mode};

/// Serialize a `chrono::Duration` as whole seconds.
pub mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(d)?;
        Ok(Duration::seconds(secs))
    }
}

/// How a self-driven section is travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelfDriveMode {
    Walk,
    Bike,
    Car,
}

/// A turn-by-turn instruction inside a self-driven section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub instruction: String,
    pub distance_m: u32,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

/// What kind of travel a section is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SectionKind {
    /// A ride on a public transport line.
    PublicTransport { line: String, mode: Mode },
    /// Walking, cycling or driving.
    SelfDrive {
        mode: SelfDriveMode,
        #[serde(default)]
        steps: Vec<Step>,
    },
}

/// One timed, located piece of a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub departure: Location,
    pub departure_time: NaiveDateTime,
    pub arrival: Location,
    pub arrival_time: NaiveDateTime,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    #[serde(default)]
    pub distance_m: u32,
    pub kind: SectionKind,
}

/// A fully detailed one-to-one answer from a single backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedTrip {
    pub departure: Location,
    pub departure_time: NaiveDateTime,
    pub arrival: Location,
    pub arrival_time: NaiveDateTime,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    #[serde(default)]
    pub interchange_number: u32,
    #[serde(with = "duration_secs", default = "Duration::zero")]
    pub interchange_duration: Duration,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// A detailed trip tagged with the provider that computed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialTrip {
    pub provider: String,
    #[serde(flatten)]
    pub trip: DetailedTrip,
}

impl PartialTrip {
    pub fn new(provider: impl Into<String>, trip: DetailedTrip) -> Self {
        Self {
            provider: provider.into(),
            trip,
        }
    }
}

/// A complete trip across one or more backends.
///
/// # Invariants
///
/// - At least one partial trip
/// - `duration` is the sum of the partial durations
/// - `interchange_number` is the sum of the partial interchange numbers
/// - `sections` is the concatenation of the partial sections, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedTrip {
    pub departure: Location,
    pub departure_time: NaiveDateTime,
    pub arrival: Location,
    pub arrival_time: NaiveDateTime,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub interchange_number: u32,
    pub partial_trips: Vec<PartialTrip>,
    pub sections: Vec<Section>,
}

impl ComposedTrip {
    /// Compose partial trips given in travel order.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::EmptyTrip`] if `partials` is empty.
    pub fn compose(partials: Vec<PartialTrip>) -> Result<Self, DomainError> {
        let (first, last) = match (partials.first(), partials.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(DomainError::EmptyTrip),
        };

        let departure = first.trip.departure.clone();
        let departure_time = first.trip.departure_time;
        let arrival = last.trip.arrival.clone();
        let arrival_time = last.trip.arrival_time;

        let duration = partials
            .iter()
            .fold(Duration::zero(), |acc, p| acc + p.trip.duration);
        let interchange_number = partials.iter().map(|p| p.trip.interchange_number).sum();
        let sections = partials
            .iter()
            .flat_map(|p| p.trip.sections.iter().cloned())
            .collect();

        Ok(Self {
            departure,
            departure_time,
            arrival,
            arrival_time,
            duration,
            interchange_number,
            partial_trips: partials,
            sections,
        })
    }

    /// Provider names in travel order.
    pub fn providers(&self) -> Vec<&str> {
        self.partial_trips
            .iter()
            .map(|p| p.provider.as_str())
            .collect()
    }
}
