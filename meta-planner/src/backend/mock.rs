//! Scripted in-memory adapter for testing without live backends.
//!
//! A `MockAdapter` knows a fixed set of point-to-point connections, each with
//! a constant travel duration, and answers every query from them. Clones share
//! the call log, so a test can hand one clone to the planner and inspect the
//! requests through another.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;

use crate::domain::{DetailedTrip, Location, Mode, Section, SectionKind, Stop, StopCode};

use super::adapter::MisAdapter;
use super::error::BackendError;
use super::types::{Capabilities, ItineraryRequest, SummedUpTrip, TimeConstraint};

/// Which query direction a scripted connection answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Availability {
    Both,
    DepartureOnly,
    ArrivalOnly,
}

#[derive(Debug, Clone)]
struct Connection {
    from: Location,
    to: Location,
    duration: Duration,
    interchanges: u32,
    availability: Availability,
}

impl Connection {
    fn answers(&self, request: &ItineraryRequest) -> bool {
        let direction_ok = match self.availability {
            Availability::Both => true,
            Availability::DepartureOnly => request.time.is_departure(),
            Availability::ArrivalOnly => !request.time.is_departure(),
        };
        direction_ok && request.departures.contains(&self.from) && request.arrivals.contains(&self.to)
    }

    fn summed_up(&self, time: TimeConstraint) -> SummedUpTrip {
        let (departure_time, arrival_time) = match time {
            TimeConstraint::DepartureTime(t) => (t, t + self.duration),
            TimeConstraint::ArrivalTime(t) => (t - self.duration, t),
        };
        SummedUpTrip {
            departure: self.from.clone(),
            departure_time,
            arrival: self.to.clone(),
            arrival_time,
            interchange_number: self.interchanges,
            interchange_duration: Duration::zero(),
        }
    }
}

/// Kind of call recorded by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    SummedUp,
    Itinerary,
}

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub request: ItineraryRequest,
}

/// Mock adapter answering from scripted connections.
#[derive(Clone)]
pub struct MockAdapter {
    line: String,
    connections: Vec<Connection>,
    failure: Option<BackendError>,
    latency: Option<std::time::Duration>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockAdapter {
    /// Create a mock whose rides are labelled with `line`.
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            connections: Vec::new(),
            failure: None,
            latency: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a connection answered in both query directions.
    pub fn connection(self, from: Location, to: Location, minutes: i64) -> Self {
        self.push(from, to, minutes, 0, Availability::Both)
    }

    /// Add a connection with interchanges inside the backend.
    pub fn connection_with_changes(
        self,
        from: Location,
        to: Location,
        minutes: i64,
        interchanges: u32,
    ) -> Self {
        self.push(from, to, minutes, interchanges, Availability::Both)
    }

    /// Add a connection only answered for departure-time queries.
    pub fn departure_only(self, from: Location, to: Location, minutes: i64) -> Self {
        self.push(from, to, minutes, 0, Availability::DepartureOnly)
    }

    /// Add a connection only answered for arrival-time queries.
    pub fn arrival_only(self, from: Location, to: Location, minutes: i64) -> Self {
        self.push(from, to, minutes, 0, Availability::ArrivalOnly)
    }

    /// Fail every query with `error`.
    pub fn failing(mut self, error: BackendError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Delay every answer.
    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn push(
        mut self,
        from: Location,
        to: Location,
        minutes: i64,
        interchanges: u32,
        availability: Availability,
    ) -> Self {
        self.connections.push(Connection {
            from,
            to,
            duration: Duration::minutes(minutes),
            interchanges,
            availability,
        });
        self
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls of one kind received so far.
    pub fn count(&self, kind: CallKind) -> usize {
        self.calls().iter().filter(|c| c.kind == kind).count()
    }

    async fn enter(&self, kind: CallKind, request: &ItineraryRequest) -> Result<(), BackendError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                kind,
                request: request.clone(),
            });
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MisAdapter for MockAdapter {
    async fn stops(&self) -> Result<Vec<Stop>, BackendError> {
        Ok(Vec::new())
    }

    async fn capabilities(&self) -> Result<Capabilities, BackendError> {
        Ok(Capabilities {
            multi_point: true,
            geographic_position: true,
            modes: [Mode::Bus].into_iter().collect(),
        })
    }

    async fn itinerary(
        &self,
        request: &ItineraryRequest,
    ) -> Result<Option<DetailedTrip>, BackendError> {
        self.enter(CallKind::Itinerary, request).await?;

        let candidates = self
            .connections
            .iter()
            .filter(|c| c.answers(request))
            .map(|c| (c, c.summed_up(request.time)));

        let best = match request.time {
            TimeConstraint::DepartureTime(_) => candidates.min_by_key(|(_, t)| t.arrival_time),
            TimeConstraint::ArrivalTime(_) => candidates.max_by_key(|(_, t)| t.departure_time),
        };

        Ok(best.map(|(conn, t)| {
            let duration = t.arrival_time - t.departure_time;
            DetailedTrip {
                departure: t.departure.clone(),
                departure_time: t.departure_time,
                arrival: t.arrival.clone(),
                arrival_time: t.arrival_time,
                duration,
                interchange_number: conn.interchanges,
                interchange_duration: Duration::zero(),
                sections: vec![Section {
                    departure: t.departure,
                    departure_time: t.departure_time,
                    arrival: t.arrival,
                    arrival_time: t.arrival_time,
                    duration,
                    distance_m: 0,
                    kind: SectionKind::PublicTransport {
                        line: self.line.clone(),
                        mode: Mode::Bus,
                    },
                }],
            }
        }))
    }

    async fn summed_up_itineraries(
        &self,
        request: &ItineraryRequest,
    ) -> Result<Vec<SummedUpTrip>, BackendError> {
        self.enter(CallKind::SummedUp, request).await?;

        Ok(self
            .connections
            .iter()
            .filter(|c| c.answers(request))
            .map(|c| c.summed_up(request.time))
            .collect())
    }
}

/// Shorthand for a stop location.
pub(crate) fn stop(code: &str) -> Location {
    Location::Stop(StopCode::parse(code).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Algorithm;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn request(from: &[&str], to: &[&str], time: TimeConstraint) -> ItineraryRequest {
        ItineraryRequest {
            departures: from.iter().map(|s| stop(s)).collect(),
            arrivals: to.iter().map(|s| stop(s)).collect(),
            time,
            algorithm: Algorithm::Classic,
            modes: vec![],
            self_drive_conditions: vec![],
            accessibility_constraint: false,
            language: "en".into(),
            options: vec![],
        }
    }

    #[tokio::test]
    async fn summed_up_answers_each_pair() {
        let mock = MockAdapter::new("M")
            .connection(stop("A"), stop("X"), 10)
            .connection(stop("A"), stop("Y"), 20)
            .connection(stop("B"), stop("X"), 5);

        let trips = mock
            .summed_up_itineraries(&request(
                &["A"],
                &["X", "Y"],
                TimeConstraint::DepartureTime(at(10, 0)),
            ))
            .await
            .unwrap();

        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].arrival_time, at(10, 10));
        assert_eq!(trips[1].arrival_time, at(10, 20));
        assert_eq!(mock.count(CallKind::SummedUp), 1);
    }

    #[tokio::test]
    async fn itinerary_picks_latest_departure_when_arriving_by() {
        let mock = MockAdapter::new("M")
            .connection(stop("A"), stop("Z"), 30)
            .connection(stop("B"), stop("Z"), 10);

        let trip = mock
            .itinerary(&request(
                &["A", "B"],
                &["Z"],
                TimeConstraint::ArrivalTime(at(12, 0)),
            ))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(trip.departure, stop("B"));
        assert_eq!(trip.departure_time, at(11, 50));
        assert_eq!(trip.sections.len(), 1);
    }

    #[tokio::test]
    async fn departure_only_connections_ignore_arrival_queries() {
        let mock = MockAdapter::new("M").departure_only(stop("A"), stop("Z"), 30);

        let trips = mock
            .summed_up_itineraries(&request(
                &["A"],
                &["Z"],
                TimeConstraint::ArrivalTime(at(12, 0)),
            ))
            .await
            .unwrap();
        assert!(trips.is_empty());
    }

    #[tokio::test]
    async fn failing_mock_records_then_errors() {
        let mock = MockAdapter::new("M").failing(BackendError::Unauthorized);
        let shared = mock.clone();

        let result = mock
            .itinerary(&request(&["A"], &["Z"], TimeConstraint::DepartureTime(at(9, 0))))
            .await;

        assert_eq!(result, Err(BackendError::Unauthorized));
        assert_eq!(shared.count(CallKind::Itinerary), 1);
    }
}
