//! Connectivity store: which backends exist, where their stops are, and which
//! pedestrian transfers link them.
//!
//! The store is populated by an external batch job; the planner only reads
//! it. [`InMemoryConnectivity`] holds a whole snapshot in memory and can be
//! loaded from the JSON file the batch job writes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{Backend, BackendId, Coord, Mode, Stop, StopCode, duration_secs};

/// Errors from the connectivity store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectivityError {
    /// No backend with this id
    #[error("unknown backend {0}")]
    UnknownBackend(BackendId),

    /// A transfer link failed validation
    #[error("invalid transfer {id}: {reason}")]
    InvalidTransfer { id: u64, reason: &'static str },

    /// Snapshot file could not be read
    #[error("failed to read snapshot: {0}")]
    Io(String),

    /// Snapshot file could not be parsed
    #[error("failed to parse snapshot: {0}")]
    Parse(String),
}

/// A stop qualified by the backend that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StopRef {
    pub backend: BackendId,
    pub code: StopCode,
}

/// A pedestrian link between stops of two different backends.
///
/// Links are stored directionless; `stop1`/`stop2` carry no meaning beyond
/// storage order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferLink {
    pub id: u64,
    pub stop1: StopRef,
    pub stop2: StopRef,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl TransferLink {
    /// True if the link joins `a` and `b`, in either storage order.
    pub fn joins(&self, a: BackendId, b: BackendId) -> bool {
        (self.stop1.backend == a && self.stop2.backend == b)
            || (self.stop1.backend == b && self.stop2.backend == a)
    }

    /// The backend on the other side of `id`, if the link touches it.
    pub fn other_side(&self, id: BackendId) -> Option<BackendId> {
        if self.stop1.backend == id {
            Some(self.stop2.backend)
        } else if self.stop2.backend == id {
            Some(self.stop1.backend)
        } else {
            None
        }
    }
}

/// A stop together with its owning backend, as held in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStop {
    pub backend: BackendId,
    #[serde(flatten)]
    pub stop: Stop,
}

/// Serialized form of a whole store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub backends: Vec<Backend>,
    #[serde(default)]
    pub stops: Vec<BackendStop>,
    #[serde(default)]
    pub transfers: Vec<TransferLink>,
}

/// Read-only queries the planner issues against the connectivity graph.
///
/// All methods are synchronous: implementations are local lookups, never
/// network calls.
pub trait ConnectivityStore: Send + Sync {
    /// Backends valid on `date` with a stop within the store's radius of
    /// `point`.
    fn nearby_backends(
        &self,
        point: &Coord,
        date: NaiveDate,
    ) -> Result<BTreeSet<BackendId>, ConnectivityError>;

    /// Backends sharing at least one active transfer with `id`.
    fn connected_backends(&self, id: BackendId) -> Result<BTreeSet<BackendId>, ConnectivityError>;

    /// Up to `limit` active links between `a` and `b`, by ascending link id.
    fn active_transfers(
        &self,
        a: BackendId,
        b: BackendId,
        limit: usize,
    ) -> Result<Vec<TransferLink>, ConnectivityError>;

    /// Modes the backend declares.
    fn backend_modes(&self, id: BackendId) -> Result<BTreeSet<Mode>, ConnectivityError>;

    /// True if the backend accepts one-to-many / many-to-one queries.
    fn supports_multi_point(&self, id: BackendId) -> Result<bool, ConnectivityError>;

    /// Full description of a backend.
    fn backend(&self, id: BackendId) -> Result<Backend, ConnectivityError>;
}

/// Default proximity radius in metres.
pub const DEFAULT_RADIUS_M: f64 = 1000.0;

/// In-memory connectivity store.
#[derive(Debug, Clone)]
pub struct InMemoryConnectivity {
    backends: BTreeMap<BackendId, Backend>,
    stops: Vec<BackendStop>,
    /// Keyed by link id, so iteration is in ascending id order.
    transfers: BTreeMap<u64, TransferLink>,
    radius_m: f64,
}

impl InMemoryConnectivity {
    /// Create an empty store.
    pub fn new(radius_m: f64) -> Self {
        Self {
            backends: BTreeMap::new(),
            stops: Vec::new(),
            transfers: BTreeMap::new(),
            radius_m,
        }
    }

    /// Build a store from a snapshot, validating every transfer.
    pub fn from_snapshot(snapshot: Snapshot, radius_m: f64) -> Result<Self, ConnectivityError> {
        let mut store = Self::new(radius_m);
        for backend in snapshot.backends {
            store.add_backend(backend);
        }
        for stop in snapshot.stops {
            store.add_stop(stop)?;
        }
        for link in snapshot.transfers {
            store.add_transfer(link)?;
        }
        Ok(store)
    }

    /// Load a JSON snapshot from disk.
    pub fn load(path: impl AsRef<Path>, radius_m: f64) -> Result<Self, ConnectivityError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConnectivityError::Io(format!("{}: {e}", path.display())))?;
        let snapshot: Snapshot =
            serde_json::from_str(&json).map_err(|e| ConnectivityError::Parse(e.to_string()))?;
        Self::from_snapshot(snapshot, radius_m)
    }

    /// Add or replace a backend.
    pub fn add_backend(&mut self, backend: Backend) {
        self.backends.insert(backend.id, backend);
    }

    /// Add a stop of a known backend.
    pub fn add_stop(&mut self, stop: BackendStop) -> Result<(), ConnectivityError> {
        if !self.backends.contains_key(&stop.backend) {
            return Err(ConnectivityError::UnknownBackend(stop.backend));
        }
        self.stops.push(stop);
        Ok(())
    }

    /// Add or replace a transfer link between two known backends.
    pub fn add_transfer(&mut self, link: TransferLink) -> Result<(), ConnectivityError> {
        for side in [&link.stop1, &link.stop2] {
            if !self.backends.contains_key(&side.backend) {
                return Err(ConnectivityError::UnknownBackend(side.backend));
            }
        }
        if link.stop1.backend == link.stop2.backend {
            return Err(ConnectivityError::InvalidTransfer {
                id: link.id,
                reason: "both stops belong to the same backend",
            });
        }
        if link.duration < Duration::zero() {
            return Err(ConnectivityError::InvalidTransfer {
                id: link.id,
                reason: "negative walking duration",
            });
        }
        self.transfers.insert(link.id, link);
        Ok(())
    }

    /// Number of backends held.
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Number of transfer links held, active or not.
    pub fn transfer_count(&self) -> usize {
        self.transfers.len()
    }

    fn get(&self, id: BackendId) -> Result<&Backend, ConnectivityError> {
        self.backends
            .get(&id)
            .ok_or(ConnectivityError::UnknownBackend(id))
    }
}

impl ConnectivityStore for InMemoryConnectivity {
    fn nearby_backends(
        &self,
        point: &Coord,
        date: NaiveDate,
    ) -> Result<BTreeSet<BackendId>, ConnectivityError> {
        Ok(self
            .stops
            .iter()
            .filter(|s| s.stop.position.distance_m(point) <= self.radius_m)
            .map(|s| s.backend)
            .filter(|id| self.backends.get(id).is_some_and(|b| b.is_valid_on(date)))
            .collect())
    }

    fn connected_backends(&self, id: BackendId) -> Result<BTreeSet<BackendId>, ConnectivityError> {
        self.get(id)?;
        Ok(self
            .transfers
            .values()
            .filter(|l| l.active)
            .filter_map(|l| l.other_side(id))
            .collect())
    }

    fn active_transfers(
        &self,
        a: BackendId,
        b: BackendId,
        limit: usize,
    ) -> Result<Vec<TransferLink>, ConnectivityError> {
        self.get(a)?;
        self.get(b)?;
        Ok(self
            .transfers
            .values()
            .filter(|l| l.active && l.joins(a, b))
            .take(limit)
            .cloned()
            .collect())
    }

    fn backend_modes(&self, id: BackendId) -> Result<BTreeSet<Mode>, ConnectivityError> {
        Ok(self.get(id)?.modes.clone())
    }

    fn supports_multi_point(&self, id: BackendId) -> Result<bool, ConnectivityError> {
        Ok(self.get(id)?.multi_point)
    }

    fn backend(&self, id: BackendId) -> Result<Backend, ConnectivityError> {
        self.get(id).cloned()
    }
}

/// Builder for creating connectivity stores.
///
/// Provides a fluent API for fixtures. Invalid stops and transfers are
/// skipped.
#[derive(Debug)]
pub struct ConnectivityBuilder {
    inner: InMemoryConnectivity,
}

impl ConnectivityBuilder {
    /// Create a new builder with the default radius.
    pub fn new() -> Self {
        Self {
            inner: InMemoryConnectivity::new(DEFAULT_RADIUS_M),
        }
    }

    /// Add a backend valid from 2000 through 2099.
    pub fn backend(mut self, id: u32, multi_point: bool, modes: &[Mode]) -> Self {
        let (start_date, end_date) = match (
            NaiveDate::from_ymd_opt(2000, 1, 1),
            NaiveDate::from_ymd_opt(2099, 12, 31),
        ) {
            (Some(s), Some(e)) => (s, e),
            _ => return self,
        };
        self.inner.add_backend(Backend {
            id: BackendId(id),
            name: format!("mis-{id}"),
            adapter: crate::backend::JSON_HTTP_FAMILY.to_string(),
            api_url: format!("http://mis-{id}.invalid"),
            api_key: String::new(),
            multi_point,
            geographic_position: true,
            modes: modes.iter().copied().collect(),
            start_date,
            end_date,
        });
        self
    }

    /// Add a stop at a position.
    pub fn stop(mut self, backend: u32, code: &str, lat: f64, lon: f64) -> Self {
        if let (Ok(code), Ok(position)) = (StopCode::parse(code), Coord::new(lat, lon)) {
            let _ = self.inner.add_stop(BackendStop {
                backend: BackendId(backend),
                stop: Stop {
                    name: code.as_str().to_string(),
                    code,
                    position,
                },
            });
        }
        self
    }

    /// Add an active transfer between two stops.
    pub fn transfer(self, id: u64, from: (u32, &str), to: (u32, &str), minutes: i64) -> Self {
        self.link(id, from, to, minutes, true)
    }

    /// Add an inactive transfer between two stops.
    pub fn inactive_transfer(self, id: u64, from: (u32, &str), to: (u32, &str), minutes: i64) -> Self {
        self.link(id, from, to, minutes, false)
    }

    fn link(mut self, id: u64, from: (u32, &str), to: (u32, &str), minutes: i64, active: bool) -> Self {
        if let (Ok(c1), Ok(c2)) = (StopCode::parse(from.1), StopCode::parse(to.1)) {
            let _ = self.inner.add_transfer(TransferLink {
                id,
                stop1: StopRef {
                    backend: BackendId(from.0),
                    code: c1,
                },
                stop2: StopRef {
                    backend: BackendId(to.0),
                    code: c2,
                },
                duration: Duration::minutes(minutes),
                active,
            });
        }
        self
    }

    /// Build the store.
    pub fn build(self) -> InMemoryConnectivity {
        self.inner
    }
}

impl Default for ConnectivityBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn store() -> InMemoryConnectivity {
        ConnectivityBuilder::new()
            .backend(1, true, &[Mode::Bus])
            .backend(2, false, &[Mode::Rail])
            .backend(3, true, &[Mode::Tram])
            .stop(1, "A1", 48.8566, 2.3522)
            .stop(2, "B1", 48.8570, 2.3530)
            .stop(3, "C1", 45.7640, 4.8357)
            .transfer(10, (1, "A1"), (2, "B1"), 4)
            .transfer(11, (2, "B2"), (1, "A2"), 6)
            .inactive_transfer(12, (1, "A3"), (3, "C1"), 2)
            .build()
    }

    #[test]
    fn nearby_uses_radius_and_validity() {
        let s = store();
        let paris = Coord::new(48.8566, 2.3522).unwrap();
        let near = s.nearby_backends(&paris, date()).unwrap();
        assert_eq!(near, [BackendId(1), BackendId(2)].into_iter().collect());

        let too_late = NaiveDate::from_ymd_opt(2100, 1, 1).unwrap();
        assert!(s.nearby_backends(&paris, too_late).unwrap().is_empty());
    }

    #[test]
    fn connected_ignores_inactive_links() {
        let s = store();
        let c = s.connected_backends(BackendId(1)).unwrap();
        assert_eq!(c, [BackendId(2)].into_iter().collect());
        assert!(s.connected_backends(BackendId(3)).unwrap().is_empty());
    }

    #[test]
    fn active_transfers_are_ordered_and_capped() {
        let s = store();
        let links = s.active_transfers(BackendId(2), BackendId(1), 10).unwrap();
        assert_eq!(links.iter().map(|l| l.id).collect::<Vec<_>>(), vec![10, 11]);

        let capped = s.active_transfers(BackendId(1), BackendId(2), 1).unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, 10);
    }

    #[test]
    fn unknown_backend_errors() {
        let s = store();
        assert_eq!(
            s.supports_multi_point(BackendId(9)),
            Err(ConnectivityError::UnknownBackend(BackendId(9)))
        );
        assert!(s.active_transfers(BackendId(1), BackendId(9), 10).is_err());
    }

    #[test]
    fn rejects_same_backend_transfer() {
        let mut s = store();
        let link = TransferLink {
            id: 99,
            stop1: StopRef {
                backend: BackendId(1),
                code: StopCode::parse("A1").unwrap(),
            },
            stop2: StopRef {
                backend: BackendId(1),
                code: StopCode::parse("A2").unwrap(),
            },
            duration: Duration::minutes(1),
            active: true,
        };
        assert!(matches!(
            s.add_transfer(link),
            Err(ConnectivityError::InvalidTransfer { id: 99, .. })
        ));
    }

    #[test]
    fn load_snapshot_from_file() {
        let json = r#"{
            "backends": [
                {"id": 1, "name": "Bus", "api_url": "http://bus", "multi_point": true,
                 "modes": ["BUS"], "start_date": "2024-01-01", "end_date": "2024-12-31"},
                {"id": 2, "name": "Rail", "adapter": "json-http", "api_url": "http://rail",
                 "multi_point": false, "modes": ["RAIL"],
                 "start_date": "2024-01-01", "end_date": "2024-12-31"}
            ],
            "stops": [
                {"backend": 1, "code": "A1", "name": "Alpha", "position": {"lat": 1.0, "lon": 1.0}}
            ],
            "transfers": [
                {"id": 5, "stop1": {"backend": 1, "code": "A1"},
                 "stop2": {"backend": 2, "code": "B1"}, "duration": 240}
            ]
        }"#;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let s = InMemoryConnectivity::load(file.path(), DEFAULT_RADIUS_M).unwrap();
        assert_eq!(s.backend_count(), 2);
        assert_eq!(s.transfer_count(), 1);
        assert_eq!(s.backend(BackendId(1)).unwrap().adapter, "json-http");

        let links = s.active_transfers(BackendId(1), BackendId(2), 10).unwrap();
        assert_eq!(links[0].duration, Duration::minutes(4));
        assert!(links[0].active);
    }

    #[test]
    fn load_reports_missing_file() {
        let result = InMemoryConnectivity::load("/definitely/not/here.json", DEFAULT_RADIUS_M);
        assert!(matches!(result, Err(ConnectivityError::Io(_))));
    }

    #[test]
    fn load_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let result = InMemoryConnectivity::load(file.path(), DEFAULT_RADIUS_M);
        assert!(matches!(result, Err(ConnectivityError::Parse(_))));
    }
}
