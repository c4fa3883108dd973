//! Four-phase assembly of one chain into a composed trip.
//!
//! Summed-up queries are cheap and time-only; detailed queries are issued
//! once per leg at the very end. For a depart-at request:
//!
//! 1. Forward narrowing: every leg but the last learns the earliest time each
//!    of its arrival candidates can be reached. Unreachable candidates are
//!    dropped, and so are departure candidates left leading nowhere.
//! 2. Joint optimization: the last leg is queried once over every surviving
//!    departure against the destination. This pins the best arrival time and
//!    an `Existence` notification is sent. Dropped departures are pruned back
//!    through the earlier legs.
//! 3. Backward narrowing: from the second-to-last leg back to the second,
//!    each departure candidate learns the latest time it can be left. Every
//!    point must be answered. This is a consistency check on the backends:
//!    the latest departure times are recorded on the trace but
//!    materialization anchors on detailed arrival times only.
//! 4. Detailed materialization: walking forward, each leg is queried in
//!    detail from the single best stop reached so far, and a `Full`
//!    notification carries the composed trip.
//!
//! Arrive-by requests run the exact temporal mirror: backward first, the
//! joint query on the first leg, and materialization from the destination.

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use tokio::sync::mpsc;
use tracing::debug;

use crate::backend::{AdapterRegistry, MisAdapter, QueryOption, SummedUpTrip, TimeConstraint};
use crate::connectivity::{Chain, ConnectivityStore, TransferResolver};
use crate::domain::{Backend, BackendId, ComposedTrip, DetailedTrip, Location, PartialTrip};

use super::chunker::{ChunkedChain, TraceStop, chunk};
use super::error::AssemblyError;
use super::notification::{Existence, Full, Notification};
use super::query::TripQuery;

/// Departure and arrival time of one summed-up answer.
#[derive(Debug, Clone, Copy)]
struct Times {
    departure: NaiveDateTime,
    arrival: NaiveDateTime,
}

impl Times {
    fn of(trip: &SummedUpTrip) -> Self {
        Self {
            departure: trip.departure_time,
            arrival: trip.arrival_time,
        }
    }
}

/// A chain member with its adapter.
struct Provider {
    backend: Backend,
    adapter: Arc<dyn MisAdapter>,
}

/// Assembles chains for one trip request.
pub struct Assembler<'a, S: ConnectivityStore + ?Sized> {
    store: &'a S,
    registry: &'a AdapterRegistry,
    max_transfers: usize,
    query: &'a TripQuery,
    request_id: &'a str,
    sink: &'a mpsc::Sender<Notification>,
}

impl<'a, S: ConnectivityStore + ?Sized> Assembler<'a, S> {
    pub fn new(
        store: &'a S,
        registry: &'a AdapterRegistry,
        max_transfers: usize,
        query: &'a TripQuery,
        request_id: &'a str,
        sink: &'a mpsc::Sender<Notification>,
    ) -> Self {
        Self {
            store,
            registry,
            max_transfers,
            query,
            request_id,
            sink,
        }
    }

    /// Assemble `chain`, sending its notifications on the way.
    ///
    /// Chains of more than one backend send an `Existence` before their
    /// `Full`; a single-backend chain only sends `Full`.
    pub async fn assemble(&self, chain: &Chain) -> Result<ComposedTrip, AssemblyError> {
        let providers = self.providers(chain).await?;
        let resolver = TransferResolver::new(self.store, self.max_transfers);
        let mut legs = chunk(chain, &self.query.origin, &self.query.destination, &resolver)?;

        let trip = if chain.is_trivial() {
            self.direct(&providers).await?
        } else {
            match self.query.time {
                TimeConstraint::DepartureTime(start) => {
                    self.depart_at(chain, &mut legs, &providers, start).await?
                }
                TimeConstraint::ArrivalTime(end) => {
                    self.arrive_by(chain, &mut legs, &providers, end).await?
                }
            }
        };

        self.emit(Notification::Full(Full {
            request_id: self.request_id.to_string(),
            chain: chain.backends().to_vec(),
            trip: trip.clone(),
        }))
        .await;
        Ok(trip)
    }

    async fn providers(&self, chain: &Chain) -> Result<Vec<Provider>, AssemblyError> {
        let mut providers = Vec::with_capacity(chain.len());
        for &id in chain.backends() {
            let backend = self.store.backend(id)?;
            let adapter = self
                .registry
                .adapter_for(&backend)
                .await
                .map_err(AssemblyError::backend(id))?;
            providers.push(Provider { backend, adapter });
        }
        Ok(providers)
    }

    /// One detailed query on the only backend.
    async fn direct(&self, providers: &[Provider]) -> Result<ComposedTrip, AssemblyError> {
        let trip = self
            .detailed(
                providers,
                0,
                vec![self.query.origin.clone()],
                vec![self.query.destination.clone()],
                self.query.time,
            )
            .await?;
        Ok(ComposedTrip::compose(vec![PartialTrip::new(
            &providers[0].backend.name,
            trip,
        )])?)
    }

    async fn depart_at(
        &self,
        chain: &Chain,
        legs: &mut ChunkedChain,
        providers: &[Provider],
        start: NaiveDateTime,
    ) -> Result<ComposedTrip, AssemblyError> {
        let last = legs.len() - 1;
        let mut reach = vec![Vec::new(); legs.len()];

        // Phase 1
        for i in 0..last {
            let anchor = if i == 0 {
                start
            } else {
                earliest_arrival(&legs.leg(i).departures)?
            };
            let leg = legs.leg(i);
            let trips = self
                .summed_up(
                    providers,
                    i,
                    leg.departure_locations(),
                    leg.arrival_locations(),
                    TimeConstraint::DepartureTime(anchor),
                    vec![],
                )
                .await?;

            let best: Vec<Option<NaiveDateTime>> = leg
                .arrivals
                .iter()
                .map(|s| earliest_to(&trips, &s.location).map(|t| t.arrival_time))
                .collect();
            reach[i] = reached(&trips);
            legs.retain_arrivals(i, &answered(&best));
            if legs.leg(i).arrivals.is_empty() {
                return Err(AssemblyError::no_itinerary(
                    leg_id(providers, i),
                    "no transfer stop reachable",
                ));
            }
            prune_backward(legs, &reach, i, providers)?;

            let (leg, next) = legs.pair_mut(i);
            for (k, arrival) in best.into_iter().flatten().enumerate() {
                leg.arrivals[k].arrival_time = Some(arrival);
                next.departures[k].arrival_time = Some(arrival + walk(leg.transfer_duration(k)));
            }
            debug!(chain = %chain, leg = i, kept = leg.arrivals.len(), "forward narrowing");
        }

        // Phase 2
        let anchor = earliest_arrival(&legs.leg(last).departures)?;
        let leg = legs.leg(last);
        let trips = self
            .summed_up(
                providers,
                last,
                leg.departure_locations(),
                vec![self.query.destination.clone()],
                TimeConstraint::DepartureTime(anchor),
                vec![QueryOption::DepartureArrivalOptimized],
            )
            .await?;

        let best: Vec<Option<Times>> = leg
            .departures
            .iter()
            .map(|s| earliest_from(&trips, &s.location).map(Times::of))
            .collect();
        legs.retain_departures(last, &answered(&best));
        if legs.leg(last).departures.is_empty() {
            return Err(AssemblyError::no_itinerary(
                leg_id(providers, last),
                "destination unreachable from every transfer stop",
            ));
        }
        prune_backward(legs, &reach, last - 1, providers)?;

        let times: Vec<Times> = best.into_iter().flatten().collect();
        let best_arrival = times
            .iter()
            .map(|t| t.arrival)
            .min()
            .ok_or(AssemblyError::Internal("joint query left no answer"))?;
        let (prev, leg) = legs.pair_mut(last - 1);
        for (k, t) in times.into_iter().enumerate() {
            leg.departures[k].departure_time = Some(t.departure);
            prev.arrivals[k].departure_time = Some(t.departure - walk(prev.transfer_duration(k)));
        }
        for stop in &mut leg.arrivals {
            stop.arrival_time = Some(best_arrival);
        }
        debug!(chain = %chain, arrival = %best_arrival, "joint optimization");
        self.existence(chain, providers, start, best_arrival).await;

        // Phase 3
        for i in (1..last).rev() {
            let leg = legs.leg(i);
            let anchor = latest_departure(&leg.arrivals)?;
            let points = leg.departure_locations();
            let trips = self
                .summed_up(
                    providers,
                    i,
                    points.clone(),
                    leg.arrival_locations(),
                    TimeConstraint::ArrivalTime(anchor),
                    vec![],
                )
                .await?;

            let received = points
                .iter()
                .filter(|p| trips.iter().any(|t| &t.departure == *p))
                .count();
            if received < points.len() {
                return Err(AssemblyError::IncompleteReply {
                    backend: leg_id(providers, i),
                    expected: points.len(),
                    received,
                });
            }

            let latest: Vec<NaiveDateTime> = leg
                .departures
                .iter()
                .map(|s| latest_from(&trips, &s.location).map(|t| t.departure_time))
                .collect::<Option<_>>()
                .ok_or(AssemblyError::Internal("answered point without a trip"))?;

            let (prev, leg) = legs.pair_mut(i - 1);
            for (k, departure) in latest.into_iter().enumerate() {
                leg.departures[k].departure_time = Some(departure);
                prev.arrivals[k].departure_time = Some(departure - walk(prev.transfer_duration(k)));
            }
            debug!(chain = %chain, leg = i, "backward narrowing");
        }

        // Phase 4
        let mut partials = Vec::with_capacity(legs.len());
        let mut anchor = (self.query.origin.clone(), start);
        for i in 0..=last {
            let leg = legs.leg(i);
            let far = if leg.is_last() {
                vec![self.query.destination.clone()]
            } else {
                leg.arrival_locations()
            };
            let trip = self
                .detailed(
                    providers,
                    i,
                    vec![anchor.0.clone()],
                    far,
                    TimeConstraint::DepartureTime(anchor.1),
                )
                .await?;

            if let Some(onward) = &leg.onward {
                let mut candidates: Vec<(usize, NaiveDateTime)> = leg
                    .arrivals
                    .iter()
                    .zip(&onward.durations)
                    .enumerate()
                    .filter(|(_, (s, _))| s.location == trip.arrival)
                    .map(|(k, (_, d))| (k, trip.arrival_time + *d))
                    .collect();
                candidates.sort_by_key(|&(_, t)| t);
                let (k, time) = candidates.first().copied().ok_or_else(|| {
                    AssemblyError::no_itinerary(
                        leg_id(providers, i),
                        "detailed trip ends away from every transfer stop",
                    )
                })?;
                anchor = (onward.linked[k].clone(), time);
            }
            partials.push(PartialTrip::new(&providers[i].backend.name, trip));
        }

        Ok(ComposedTrip::compose(partials)?)
    }

    async fn arrive_by(
        &self,
        chain: &Chain,
        legs: &mut ChunkedChain,
        providers: &[Provider],
        end: NaiveDateTime,
    ) -> Result<ComposedTrip, AssemblyError> {
        let last = legs.len() - 1;
        let mut reach = vec![Vec::new(); legs.len()];

        // Phase 1
        for i in (1..=last).rev() {
            let anchor = if i == last {
                end
            } else {
                latest_departure(&legs.leg(i).arrivals)?
            };
            let leg = legs.leg(i);
            let trips = self
                .summed_up(
                    providers,
                    i,
                    leg.departure_locations(),
                    leg.arrival_locations(),
                    TimeConstraint::ArrivalTime(anchor),
                    vec![],
                )
                .await?;

            let best: Vec<Option<NaiveDateTime>> = leg
                .departures
                .iter()
                .map(|s| latest_from(&trips, &s.location).map(|t| t.departure_time))
                .collect();
            reach[i] = reached(&trips);
            legs.retain_departures(i, &answered(&best));
            if legs.leg(i).departures.is_empty() {
                return Err(AssemblyError::no_itinerary(
                    leg_id(providers, i),
                    "no transfer stop can make it in time",
                ));
            }
            prune_forward(legs, &reach, i, providers)?;

            let (prev, leg) = legs.pair_mut(i - 1);
            for (k, departure) in best.into_iter().flatten().enumerate() {
                leg.departures[k].departure_time = Some(departure);
                prev.arrivals[k].departure_time = Some(departure - walk(prev.transfer_duration(k)));
            }
            debug!(chain = %chain, leg = i, kept = leg.departures.len(), "backward narrowing");
        }

        // Phase 2
        let anchor = latest_departure(&legs.leg(0).arrivals)?;
        let leg = legs.leg(0);
        let trips = self
            .summed_up(
                providers,
                0,
                vec![self.query.origin.clone()],
                leg.arrival_locations(),
                TimeConstraint::ArrivalTime(anchor),
                vec![QueryOption::DepartureArrivalOptimized],
            )
            .await?;

        let best: Vec<Option<Times>> = leg
            .arrivals
            .iter()
            .map(|s| latest_to(&trips, &s.location).map(Times::of))
            .collect();
        legs.retain_arrivals(0, &answered(&best));
        if legs.leg(0).arrivals.is_empty() {
            return Err(AssemblyError::no_itinerary(
                leg_id(providers, 0),
                "no transfer stop reachable from the origin",
            ));
        }
        prune_forward(legs, &reach, 1, providers)?;

        let times: Vec<Times> = best.into_iter().flatten().collect();
        let best_departure = times
            .iter()
            .map(|t| t.departure)
            .max()
            .ok_or(AssemblyError::Internal("joint query left no answer"))?;
        let (leg, next) = legs.pair_mut(0);
        for (k, t) in times.into_iter().enumerate() {
            leg.arrivals[k].arrival_time = Some(t.arrival);
            next.departures[k].arrival_time = Some(t.arrival + walk(leg.transfer_duration(k)));
        }
        for stop in &mut leg.departures {
            stop.departure_time = Some(best_departure);
        }
        debug!(chain = %chain, departure = %best_departure, "joint optimization");
        self.existence(chain, providers, best_departure, end).await;

        // Phase 3
        for i in 1..last {
            let leg = legs.leg(i);
            let anchor = earliest_arrival(&leg.departures)?;
            let points = leg.arrival_locations();
            let trips = self
                .summed_up(
                    providers,
                    i,
                    leg.departure_locations(),
                    points.clone(),
                    TimeConstraint::DepartureTime(anchor),
                    vec![],
                )
                .await?;

            let received = points
                .iter()
                .filter(|p| trips.iter().any(|t| &t.arrival == *p))
                .count();
            if received < points.len() {
                return Err(AssemblyError::IncompleteReply {
                    backend: leg_id(providers, i),
                    expected: points.len(),
                    received,
                });
            }

            let earliest: Vec<NaiveDateTime> = leg
                .arrivals
                .iter()
                .map(|s| earliest_to(&trips, &s.location).map(|t| t.arrival_time))
                .collect::<Option<_>>()
                .ok_or(AssemblyError::Internal("answered point without a trip"))?;

            let (leg, next) = legs.pair_mut(i);
            for (k, arrival) in earliest.into_iter().enumerate() {
                leg.arrivals[k].arrival_time = Some(arrival);
                next.departures[k].arrival_time = Some(arrival + walk(leg.transfer_duration(k)));
            }
            debug!(chain = %chain, leg = i, "forward narrowing");
        }

        // Phase 4
        let mut partials = Vec::with_capacity(legs.len());
        let mut anchor = (self.query.destination.clone(), end);
        for i in (0..=last).rev() {
            let leg = legs.leg(i);
            let far = if i == 0 {
                vec![self.query.origin.clone()]
            } else {
                leg.departure_locations()
            };
            let trip = self
                .detailed(
                    providers,
                    i,
                    far,
                    vec![anchor.0.clone()],
                    TimeConstraint::ArrivalTime(anchor.1),
                )
                .await?;

            if i > 0 {
                let prev = legs.leg(i - 1);
                let onward = prev
                    .onward
                    .as_ref()
                    .ok_or(AssemblyError::Internal("inner leg without transfers"))?;
                let mut candidates: Vec<(usize, NaiveDateTime)> = onward
                    .linked
                    .iter()
                    .zip(&onward.durations)
                    .enumerate()
                    .filter(|(_, (linked, _))| **linked == trip.departure)
                    .map(|(k, (_, d))| (k, trip.departure_time - *d))
                    .collect();
                candidates.sort_by_key(|&(_, t)| Reverse(t));
                let (k, time) = candidates.first().copied().ok_or_else(|| {
                    AssemblyError::no_itinerary(
                        leg_id(providers, i),
                        "detailed trip starts away from every transfer stop",
                    )
                })?;
                anchor = (prev.arrivals[k].location.clone(), time);
            }
            partials.push(PartialTrip::new(&providers[i].backend.name, trip));
        }
        partials.reverse();

        Ok(ComposedTrip::compose(partials)?)
    }

    async fn summed_up(
        &self,
        providers: &[Provider],
        i: usize,
        departures: Vec<Location>,
        arrivals: Vec<Location>,
        time: TimeConstraint,
        options: Vec<QueryOption>,
    ) -> Result<Vec<SummedUpTrip>, AssemblyError> {
        let provider = &providers[i];
        let request = self
            .query
            .leg_request(i, providers.len(), departures, arrivals, time, options);
        provider
            .adapter
            .summed_up_itineraries(&request)
            .await
            .map_err(AssemblyError::backend(provider.backend.id))
    }

    async fn detailed(
        &self,
        providers: &[Provider],
        i: usize,
        departures: Vec<Location>,
        arrivals: Vec<Location>,
        time: TimeConstraint,
    ) -> Result<DetailedTrip, AssemblyError> {
        let provider = &providers[i];
        let request = self
            .query
            .leg_request(i, providers.len(), departures, arrivals, time, vec![]);
        provider
            .adapter
            .itinerary(&request)
            .await
            .map_err(AssemblyError::backend(provider.backend.id))?
            .ok_or_else(|| {
                AssemblyError::no_itinerary(provider.backend.id, "detailed query found no trip")
            })
    }

    async fn existence(
        &self,
        chain: &Chain,
        providers: &[Provider],
        departure_time: NaiveDateTime,
        arrival_time: NaiveDateTime,
    ) {
        self.emit(Notification::Existence(Existence {
            request_id: self.request_id.to_string(),
            chain: chain.backends().to_vec(),
            departure_time,
            arrival_time,
            duration: arrival_time - departure_time,
            providers: providers.iter().map(|p| p.backend.name.clone()).collect(),
        }))
        .await;
    }

    async fn emit(&self, notification: Notification) {
        if self.sink.send(notification).await.is_err() {
            debug!(request_id = %self.request_id, "notification queue closed");
        }
    }
}

fn leg_id(providers: &[Provider], i: usize) -> BackendId {
    providers[i].backend.id
}

fn walk(duration: Option<Duration>) -> Duration {
    duration.unwrap_or_else(Duration::zero)
}

fn answered<T>(answers: &[Option<T>]) -> Vec<bool> {
    answers.iter().map(Option::is_some).collect()
}

/// Departure and arrival pairs a summed-up reply connects.
fn reached(trips: &[SummedUpTrip]) -> Vec<(Location, Location)> {
    trips
        .iter()
        .map(|t| (t.departure.clone(), t.arrival.clone()))
        .collect()
}

fn connects(reach: &[(Location, Location)], from: &Location, to: &Location) -> bool {
    reach.iter().any(|(f, t)| f == from && t == to)
}

/// Drop departures of legs `from` down to the second that no longer reach a
/// surviving arrival, together with the previous leg's matching arrivals.
fn prune_backward(
    legs: &mut ChunkedChain,
    reach: &[Vec<(Location, Location)>],
    from: usize,
    providers: &[Provider],
) -> Result<(), AssemblyError> {
    for j in (1..=from).rev() {
        let leg = legs.leg(j);
        let keep: Vec<bool> = leg
            .departures
            .iter()
            .map(|d| {
                leg.arrivals
                    .iter()
                    .any(|a| connects(&reach[j], &d.location, &a.location))
            })
            .collect();
        legs.retain_departures(j, &keep);
        if legs.leg(j).departures.is_empty() {
            return Err(AssemblyError::no_itinerary(
                leg_id(providers, j),
                "every transfer stop leads to a dead end",
            ));
        }
    }
    Ok(())
}

/// Drop arrivals of legs `from` up to the second-to-last that no surviving
/// departure reaches, together with the next leg's matching departures.
fn prune_forward(
    legs: &mut ChunkedChain,
    reach: &[Vec<(Location, Location)>],
    from: usize,
    providers: &[Provider],
) -> Result<(), AssemblyError> {
    for j in from..legs.len() - 1 {
        let leg = legs.leg(j);
        let keep: Vec<bool> = leg
            .arrivals
            .iter()
            .map(|a| {
                leg.departures
                    .iter()
                    .any(|d| connects(&reach[j], &d.location, &a.location))
            })
            .collect();
        legs.retain_arrivals(j, &keep);
        if legs.leg(j).arrivals.is_empty() {
            return Err(AssemblyError::no_itinerary(
                leg_id(providers, j),
                "no transfer stop is reached from a live departure",
            ));
        }
    }
    Ok(())
}

fn earliest_arrival(stops: &[TraceStop]) -> Result<NaiveDateTime, AssemblyError> {
    stops
        .iter()
        .filter_map(|s| s.arrival_time)
        .min()
        .ok_or(AssemblyError::Internal("no candidate carries an arrival time"))
}

fn latest_departure(stops: &[TraceStop]) -> Result<NaiveDateTime, AssemblyError> {
    stops
        .iter()
        .filter_map(|s| s.departure_time)
        .max()
        .ok_or(AssemblyError::Internal("no candidate carries a departure time"))
}

/// Earliest-arriving trip reaching `to`.
fn earliest_to<'t>(trips: &'t [SummedUpTrip], to: &Location) -> Option<&'t SummedUpTrip> {
    trips
        .iter()
        .filter(|t| &t.arrival == to)
        .min_by_key(|t| t.arrival_time)
}

/// Earliest-arriving trip leaving `from`.
fn earliest_from<'t>(trips: &'t [SummedUpTrip], from: &Location) -> Option<&'t SummedUpTrip> {
    trips
        .iter()
        .filter(|t| &t.departure == from)
        .min_by_key(|t| t.arrival_time)
}

/// Latest-leaving trip from `from`.
fn latest_from<'t>(trips: &'t [SummedUpTrip], from: &Location) -> Option<&'t SummedUpTrip> {
    trips
        .iter()
        .filter(|t| &t.departure == from)
        .max_by_key(|t| t.departure_time)
}

/// Latest-leaving trip reaching `to`.
fn latest_to<'t>(trips: &'t [SummedUpTrip], to: &Location) -> Option<&'t SummedUpTrip> {
    trips
        .iter()
        .filter(|t| &t.arrival == to)
        .max_by_key(|t| t.departure_time)
}
