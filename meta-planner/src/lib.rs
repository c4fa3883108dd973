//! Trip planner composing itineraries across several transport-information
//! backends.
//!
//! A trip that no single backend covers is answered by chaining backends
//! that meet at walkable transfer stops, querying each one for its own leg
//! and stitching the legs into one composed trip.

pub mod backend;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod domain;
pub mod planner;
pub mod web;
