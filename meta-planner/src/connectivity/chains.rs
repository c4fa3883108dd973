//! Candidate backend chains between two points.
//!
//! A chain is an ordered, repeat-free list of backends: the first serves the
//! origin, the last serves the destination, and each adjacent pair shares at
//! least one transfer link. Chains come out in discovery order; no ranking
//! is attempted.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{BackendId, Coord, Mode};

use super::store::{ConnectivityError, ConnectivityStore};

/// Default maximum number of backends in a chain.
pub const DEFAULT_MAX_CHAIN_LENGTH: usize = 3;

/// Errors from chain finding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainError {
    #[error("maximum chain length must be at least 1")]
    ZeroLength,

    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),
}

/// An ordered, duplicate-free list of backends.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chain(Vec<BackendId>);

impl Chain {
    /// Build a chain, rejecting empty or repeating lists.
    pub fn new(backends: Vec<BackendId>) -> Option<Self> {
        if backends.is_empty() {
            return None;
        }
        let distinct: BTreeSet<_> = backends.iter().collect();
        (distinct.len() == backends.len()).then_some(Self(backends))
    }

    pub fn backends(&self) -> &[BackendId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: chains hold at least one backend.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if origin and destination are served by one backend.
    pub fn is_trivial(&self) -> bool {
        self.0.len() == 1
    }

    /// Backends strictly between the first and the last.
    pub fn interior(&self) -> &[BackendId] {
        if self.0.len() > 2 {
            &self.0[1..self.0.len() - 1]
        } else {
            &[]
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        write!(f, "[{}]", ids.join(" > "))
    }
}

/// What the chain finder needs from a trip request.
#[derive(Debug, Clone)]
pub struct ChainQuery {
    pub origin: Coord,
    pub destination: Coord,
    pub date: NaiveDate,
    /// Empty or containing [`Mode::All`] means unrestricted.
    pub modes: Vec<Mode>,
}

/// Enumerates candidate chains over a connectivity store.
pub struct ChainFinder<'a, S: ConnectivityStore + ?Sized> {
    store: &'a S,
    max_length: usize,
}

impl<'a, S: ConnectivityStore + ?Sized> ChainFinder<'a, S> {
    pub fn new(store: &'a S, max_length: usize) -> Self {
        Self { store, max_length }
    }

    /// Find every chain from a backend near the origin to a backend near the
    /// destination.
    pub fn find(&self, query: &ChainQuery) -> Result<Vec<Chain>, ChainError> {
        if self.max_length == 0 {
            return Err(ChainError::ZeroLength);
        }

        let departures = self.endpoint_backends(&query.origin, query)?;
        let arrivals = self.endpoint_backends(&query.destination, query)?;
        debug!(
            departures = departures.len(),
            arrivals = arrivals.len(),
            "endpoint backends"
        );

        let mut chains = Vec::new();
        for backends in self.enumerate(&departures, &arrivals, self.max_length)? {
            if !self.interior_supports_multi_point(&backends)? {
                continue;
            }
            if let Some(chain) = Chain::new(backends) {
                chains.push(chain);
            }
        }

        debug!(count = chains.len(), "chains found");
        Ok(chains)
    }

    /// Backends near `point`, narrowed by the mode filter.
    fn endpoint_backends(
        &self,
        point: &Coord,
        query: &ChainQuery,
    ) -> Result<BTreeSet<BackendId>, ConnectivityError> {
        let nearby = self.store.nearby_backends(point, query.date)?;
        if Mode::is_unrestricted(&query.modes) {
            return Ok(nearby);
        }

        let mut kept = BTreeSet::new();
        for id in nearby {
            let modes = self.store.backend_modes(id)?;
            if query.modes.iter().any(|m| modes.contains(m)) {
                kept.insert(id);
            }
        }
        Ok(kept)
    }

    /// Every repeat-free path of at most `remaining` backends from the
    /// frontier to the arrival set. A backend already in the arrival set ends
    /// its path.
    fn enumerate(
        &self,
        frontier: &BTreeSet<BackendId>,
        arrivals: &BTreeSet<BackendId>,
        remaining: usize,
    ) -> Result<Vec<Vec<BackendId>>, ConnectivityError> {
        let mut out = Vec::new();
        if remaining == 0 {
            return Ok(out);
        }

        for &b in frontier {
            if arrivals.contains(&b) {
                out.push(vec![b]);
                continue;
            }
            if remaining == 1 {
                continue;
            }

            let next = self.store.connected_backends(b)?;
            for sub in self.enumerate(&next, arrivals, remaining - 1)? {
                if sub.contains(&b) {
                    continue;
                }
                let mut chain = Vec::with_capacity(sub.len() + 1);
                chain.push(b);
                chain.extend(sub);
                out.push(chain);
            }
        }
        Ok(out)
    }

    fn interior_supports_multi_point(&self, backends: &[BackendId]) -> Result<bool, ConnectivityError> {
        if backends.len() <= 2 {
            return Ok(true);
        }
        for &id in &backends[1..backends.len() - 1] {
            if !self.store.supports_multi_point(id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
