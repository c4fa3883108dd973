//! Splits a chain into one leg per backend.
//!
//! A backend answers queries with one "far" endpoint and many "near" ones, so
//! each leg is bounded by the transfer stops shared with its neighbours:
//!
//! ```text
//! origin ──[leg 0: A]── T(A,B) ──[leg 1: B]── T(B,C) ──[leg 2: C]── destination
//! ```
//!
//! For every leg but the last, `arrivals[k]` is linked by transfer `k` to
//! `onward.linked[k]`, which is also the next leg's `departures[k]`. The
//! lists stay index-aligned through every narrowing step.

use chrono::{Duration, NaiveDateTime};

use crate::connectivity::{Chain, ConnectivityStore, Transfer, TransferResolver};
use crate::domain::{BackendId, Location, distinct_locations};

use super::error::AssemblyError;

/// A candidate stop annotated with times derived during assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceStop {
    pub location: Location,
    /// Earliest time the traveller can be here.
    pub arrival_time: Option<NaiveDateTime>,
    /// Latest time the traveller may leave from here.
    pub departure_time: Option<NaiveDateTime>,
}

impl TraceStop {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            arrival_time: None,
            departure_time: None,
        }
    }
}

/// Transfers from a leg's arrival candidates onto the next backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Onward {
    pub linked: Vec<Location>,
    pub durations: Vec<Duration>,
}

/// One backend's share of a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub backend: BackendId,
    pub departures: Vec<TraceStop>,
    pub arrivals: Vec<TraceStop>,
    /// Absent on the last leg.
    pub onward: Option<Onward>,
}

impl Leg {
    pub fn is_last(&self) -> bool {
        self.onward.is_none()
    }

    /// Distinct departure locations, for querying.
    pub fn departure_locations(&self) -> Vec<Location> {
        distinct_locations(self.departures.iter().map(|s| &s.location))
    }

    /// Distinct arrival locations, for querying.
    pub fn arrival_locations(&self) -> Vec<Location> {
        distinct_locations(self.arrivals.iter().map(|s| &s.location))
    }

    /// Walking time from arrival candidate `k` to its linked stop.
    pub fn transfer_duration(&self, k: usize) -> Option<Duration> {
        self.onward.as_ref().and_then(|o| o.durations.get(k).copied())
    }
}

/// The legs of one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkedChain {
    legs: Vec<Leg>,
}

impl ChunkedChain {
    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    pub fn leg(&self, i: usize) -> &Leg {
        &self.legs[i]
    }

    pub fn leg_mut(&mut self, i: usize) -> &mut Leg {
        &mut self.legs[i]
    }

    /// Two adjacent legs, mutably.
    pub fn pair_mut(&mut self, i: usize) -> (&mut Leg, &mut Leg) {
        let (head, tail) = self.legs.split_at_mut(i + 1);
        (&mut head[i], &mut tail[0])
    }

    /// Keep only the arrival candidates of leg `i` flagged in `keep`, along
    /// with their transfers and the next leg's matching departures.
    pub fn retain_arrivals(&mut self, i: usize, keep: &[bool]) {
        let leg = &mut self.legs[i];
        retain_flagged(&mut leg.arrivals, keep);
        if let Some(onward) = leg.onward.as_mut() {
            retain_flagged(&mut onward.linked, keep);
            retain_flagged(&mut onward.durations, keep);
            if let Some(next) = self.legs.get_mut(i + 1) {
                retain_flagged(&mut next.departures, keep);
            }
        }
    }

    /// Keep only the departure candidates of leg `i` flagged in `keep`,
    /// along with the previous leg's matching arrivals and transfers.
    pub fn retain_departures(&mut self, i: usize, keep: &[bool]) {
        retain_flagged(&mut self.legs[i].departures, keep);
        if i > 0 {
            let prev = &mut self.legs[i - 1];
            retain_flagged(&mut prev.arrivals, keep);
            if let Some(onward) = prev.onward.as_mut() {
                retain_flagged(&mut onward.linked, keep);
                retain_flagged(&mut onward.durations, keep);
            }
        }
    }
}

fn retain_flagged<T>(items: &mut Vec<T>, keep: &[bool]) {
    let mut flags = keep.iter();
    items.retain(|_| flags.next().copied().unwrap_or(false));
}

/// Split `chain` into legs between the literal `origin` and `destination`.
///
/// Each adjacent backend pair is resolved once. A pair without any active
/// transfer makes the chain infeasible.
pub fn chunk<S: ConnectivityStore + ?Sized>(
    chain: &Chain,
    origin: &Location,
    destination: &Location,
    resolver: &TransferResolver<'_, S>,
) -> Result<ChunkedChain, AssemblyError> {
    let backends = chain.backends();

    let mut transfers: Vec<Vec<Transfer>> = Vec::with_capacity(backends.len().saturating_sub(1));
    for pair in backends.windows(2) {
        let resolved = resolver.resolve(pair[0], pair[1])?;
        if resolved.is_empty() {
            return Err(AssemblyError::no_itinerary(
                pair[0],
                "no active transfer to the next backend",
            ));
        }
        transfers.push(resolved);
    }

    let legs = backends
        .iter()
        .enumerate()
        .map(|(i, &backend)| {
            let departures = match i.checked_sub(1).and_then(|p| transfers.get(p)) {
                Some(inbound) => inbound
                    .iter()
                    .map(|t| TraceStop::new(t.to_location()))
                    .collect(),
                None => vec![TraceStop::new(origin.clone())],
            };

            let (arrivals, onward) = match transfers.get(i) {
                Some(outbound) => (
                    outbound
                        .iter()
                        .map(|t| TraceStop::new(t.from_location()))
                        .collect(),
                    Some(Onward {
                        linked: outbound.iter().map(Transfer::to_location).collect(),
                        durations: outbound.iter().map(|t| t.duration).collect(),
                    }),
                ),
                None => (vec![TraceStop::new(destination.clone())], None),
            };

            Leg {
                backend,
                departures,
                arrivals,
                onward,
            }
        })
        .collect();

    Ok(ChunkedChain { legs })
}
