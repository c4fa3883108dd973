//! Transfer points between two backends.
//!
//! A transfer is a walkable link from a stop of one backend to a stop of
//! another. Links are stored directionless; the resolver orients each one so
//! that `from` always belongs to the first backend asked about.

use chrono::Duration;

use crate::domain::{BackendId, Location, StopCode};

use super::store::{ConnectivityError, ConnectivityStore};

/// Default cap on transfers considered per backend pair.
pub const DEFAULT_MAX_TRANSFERS: usize = 10;

/// An oriented transfer between two backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Link id in the store.
    pub id: u64,
    /// Walking time from `from` to `to`.
    pub duration: Duration,
    /// Stop on the first backend's side.
    pub from: StopCode,
    /// Stop on the second backend's side.
    pub to: StopCode,
}

impl Transfer {
    /// The first backend's side as a query location.
    pub fn from_location(&self) -> Location {
        Location::Stop(self.from.clone())
    }

    /// The second backend's side as a query location.
    pub fn to_location(&self) -> Location {
        Location::Stop(self.to.clone())
    }
}

/// Resolves oriented transfers between backend pairs.
pub struct TransferResolver<'a, S: ConnectivityStore + ?Sized> {
    store: &'a S,
    max_transfers: usize,
}

impl<'a, S: ConnectivityStore + ?Sized> TransferResolver<'a, S> {
    /// Create a resolver returning at most `max_transfers` links per pair.
    pub fn new(store: &'a S, max_transfers: usize) -> Self {
        Self {
            store,
            max_transfers,
        }
    }

    /// Active transfers from `m1` to `m2`, in ascending link-id order.
    ///
    /// Each result has `from` on `m1` and `to` on `m2`, whichever way round
    /// the link is stored.
    pub fn resolve(&self, m1: BackendId, m2: BackendId) -> Result<Vec<Transfer>, ConnectivityError> {
        let links = self.store.active_transfers(m1, m2, self.max_transfers)?;

        Ok(links
            .into_iter()
            .map(|link| {
                let (from, to) = if link.stop1.backend == m1 {
                    (link.stop1.code, link.stop2.code)
                } else {
                    (link.stop2.code, link.stop1.code)
                };
                Transfer {
                    id: link.id,
                    duration: link.duration,
                    from,
                    to,
                }
            })
            .collect())
    }
}
