//! Items of the outbound notification stream.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::{BackendId, ComposedTrip, duration_secs};

/// Outcome reported in an Ack or Error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    BadRequest,
    ServerError,
}

/// Early, detail-free proof that a chain can carry the trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Existence {
    pub request_id: String,
    pub chain: Vec<BackendId>,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// Provider names in travel order.
    pub providers: Vec<String>,
}

/// The fully detailed trip found on a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Full {
    pub request_id: String,
    pub chain: Vec<BackendId>,
    pub trip: ComposedTrip,
}

/// One item on the stream sent back for a trip request.
///
/// A request's stream is `Ack`, `StartingSearch`, any number of interleaved
/// `Existence`/`Full`, then exactly one of `EndingSearch` or
/// `CancellationAck`. A request rejected up front gets a single `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Ack {
        status: Status,
        request_id: String,
    },
    StartingSearch {
        request_id: String,
        chain_count: usize,
    },
    Existence(Existence),
    Full(Full),
    EndingSearch {
        request_id: String,
        chain_count: usize,
        existence_count: usize,
        full_count: usize,
        elapsed_ms: u64,
    },
    CancellationAck {
        request_id: String,
    },
    Error {
        request_id: Option<String>,
        status: Status,
        message: String,
    },
}

impl Notification {
    /// True for the items that close a request's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Notification::EndingSearch { .. }
                | Notification::CancellationAck { .. }
                | Notification::Error { .. }
        )
    }
}
