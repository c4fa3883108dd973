//! Domain types for the trip composer.
//!
//! This module contains the core model shared by every layer: backend
//! identities, query locations and the trip shapes backends return and the
//! planner composes. Types validate their invariants at construction time.

mod backend;
mod error;
mod location;
mod trip;

pub use backend::{Backend, BackendId, Mode, StopCode};
pub use error::DomainError;
pub use location::{Coord, Location, Stop, distinct_locations};
pub use trip::{
    ComposedTrip, DetailedTrip, PartialTrip, Section, SectionKind, SelfDriveMode, Step,
    duration_secs,
};
