//! Trip planner across chains of backends.
//!
//! This module turns a trip request into a stream of notifications:
//! candidate chains are found on the connectivity graph, each chain is split
//! into legs, and one worker per chain narrows and then materializes a
//! composed trip with summed-up and detailed backend queries.

mod assembler;
mod chunker;
mod config;
mod error;
mod notification;
mod orchestrator;
mod query;


pub use assembler::Assembler;
pub use chunker::{ChunkedChain, Leg, Onward, TraceStop, chunk};
pub use config::PlannerConfig;
pub use error::AssemblyError;
pub use notification::{Existence, Full, Notification, Status};
pub use orchestrator::{Cancel, Orchestrator, SearchRequest, Termination};
pub use query::TripQuery;
