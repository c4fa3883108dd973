//! Per-request fan-out over candidate chains.
//!
//! One request runs as:
//!
//! ```text
//! find chains ─► Ack ─► StartingSearch ─► workers (one per chain) ──► queue ──► drain ─► client
//!                                                 supervisor: join all ╳ cancel watcher
//! ```
//!
//! Workers share nothing but the sending half of one bounded queue. The drain
//! loop is its single consumer. The supervisor reports whichever comes first,
//! every worker joining or a matching cancellation, and the drain loop then
//! writes exactly one terminal item: `EndingSearch` or `CancellationAck`.
//! Dropping a running `run` future aborts the supervisor and every worker.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::backend::AdapterRegistry;
use crate::connectivity::{Chain, ChainError, ChainFinder, ChainQuery, ConnectivityStore};

use super::assembler::Assembler;
use super::config::PlannerConfig;
use super::notification::{Notification, Status};
use super::query::TripQuery;

/// A cancellation message, broadcast to every running request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancel {
    pub request_id: String,
}

/// One validated request ready to run.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub request_id: String,
    pub query: TripQuery,
    /// Chains to search; the configured default when absent.
    pub max_trips: Option<usize>,
}

/// How a request's stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every worker finished; `EndingSearch` was sent.
    Completed,
    /// A matching cancellation arrived first; `CancellationAck` was sent.
    Cancelled,
    /// Chains could not be computed; a single `Error` was sent.
    Rejected,
}

/// Runs trip requests against the connectivity store and the backends.
pub struct Orchestrator {
    store: Arc<dyn ConnectivityStore>,
    registry: Arc<AdapterRegistry>,
    config: PlannerConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ConnectivityStore>,
        registry: Arc<AdapterRegistry>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Candidate chains for a query, in discovery order.
    pub fn find_chains(&self, query: &TripQuery) -> Result<Vec<Chain>, ChainError> {
        let (origin, destination) = match (query.origin.as_coord(), query.destination.as_coord()) {
            (Some(o), Some(d)) => (*o, *d),
            _ => return Ok(Vec::new()),
        };
        let chain_query = ChainQuery {
            origin,
            destination,
            date: query.time.instant().date(),
            modes: query.modes.clone(),
        };
        ChainFinder::new(self.store.as_ref(), self.config.max_chain_length).find(&chain_query)
    }

    /// Run one request to its terminal notification.
    pub async fn run(
        &self,
        request: SearchRequest,
        mut cancel: broadcast::Receiver<Cancel>,
        out: mpsc::Sender<Notification>,
    ) -> Termination {
        let started = Instant::now();
        let request_id = request.request_id.clone();

        let chains = match self.find_chains(&request.query) {
            Ok(chains) => chains,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "chain search failed");
                forward(
                    &out,
                    Notification::Error {
                        request_id: Some(request_id),
                        status: Status::ServerError,
                        message: e.to_string(),
                    },
                )
                .await;
                return Termination::Rejected;
            }
        };

        let max_trips = self.config.trips_for(request.max_trips);
        let chains: Vec<Chain> = chains.into_iter().take(max_trips).collect();
        let chain_count = chains.len();
        info!(request_id = %request_id, chains = chain_count, "starting search");

        forward(
            &out,
            Notification::Ack {
                status: Status::Ok,
                request_id: request_id.clone(),
            },
        )
        .await;
        forward(
            &out,
            Notification::StartingSearch {
                request_id: request_id.clone(),
                chain_count,
            },
        )
        .await;

        let (queue_tx, mut queue_rx) = mpsc::channel(self.config.queue_capacity());
        let query = Arc::new(request.query);
        let mut workers = JoinSet::new();
        for chain in chains {
            workers.spawn(worker(
                self.store.clone(),
                self.registry.clone(),
                self.config.max_transfers,
                query.clone(),
                request_id.clone(),
                chain,
                queue_tx.clone(),
            ));
        }
        drop(queue_tx);

        let (done_tx, mut done_rx) = oneshot::channel();
        let hard_cancel = self.config.hard_cancel;
        let watched_id = request_id.clone();
        let _supervisor = AbortOnDrop(tokio::spawn(async move {
            let termination = tokio::select! {
                _ = join_all(&mut workers) => Termination::Completed,
                _ = cancelled(&mut cancel, &watched_id) => Termination::Cancelled,
            };
            if termination == Termination::Cancelled {
                if hard_cancel {
                    workers.abort_all();
                } else {
                    workers.detach_all();
                }
            }
            let _ = done_tx.send(termination);
        }));

        let mut existence_count = 0;
        let mut full_count = 0;
        let mut count = |n: &Notification| match n {
            Notification::Existence(_) => existence_count += 1,
            Notification::Full(_) => full_count += 1,
            _ => {}
        };

        let termination = loop {
            tokio::select! {
                biased;
                Some(n) = queue_rx.recv() => {
                    count(&n);
                    forward(&out, n).await;
                }
                t = &mut done_rx => break t.unwrap_or(Termination::Completed),
            }
        };

        match termination {
            Termination::Cancelled => {
                info!(request_id = %request_id, "search cancelled");
                forward(&out, Notification::CancellationAck { request_id }).await;
            }
            _ => {
                // Every worker has joined, so the queue is closed once drained.
                while let Some(n) = queue_rx.recv().await {
                    count(&n);
                    forward(&out, n).await;
                }
                let elapsed_ms = started.elapsed().as_millis() as u64;
                info!(
                    request_id = %request_id,
                    existence = existence_count,
                    full = full_count,
                    elapsed_ms,
                    "search complete"
                );
                forward(
                    &out,
                    Notification::EndingSearch {
                        request_id,
                        chain_count,
                        existence_count,
                        full_count,
                        elapsed_ms,
                    },
                )
                .await;
            }
        }
        termination
    }
}

/// Aborts a task when dropped.
///
/// A `run` dropped mid-search takes its supervisor down, and the
/// supervisor's `JoinSet` aborts every worker with it.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Assemble one chain, logging rather than propagating any failure.
async fn worker(
    store: Arc<dyn ConnectivityStore>,
    registry: Arc<AdapterRegistry>,
    max_transfers: usize,
    query: Arc<TripQuery>,
    request_id: String,
    chain: Chain,
    queue: mpsc::Sender<Notification>,
) {
    let assembler = Assembler::new(
        store.as_ref(),
        registry.as_ref(),
        max_transfers,
        query.as_ref(),
        &request_id,
        &queue,
    );
    match assembler.assemble(&chain).await {
        Ok(trip) => debug!(
            request_id = %request_id,
            chain = %chain,
            arrival = %trip.arrival_time,
            "chain assembled"
        ),
        Err(e) => warn!(request_id = %request_id, chain = %chain, error = %e, "chain failed"),
    }
}

async fn join_all(workers: &mut JoinSet<()>) {
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                warn!(error = %e, "worker panicked");
            }
        }
    }
}

/// Resolves once a cancellation for `request_id` arrives; never if the
/// channel closes first.
async fn cancelled(cancel: &mut broadcast::Receiver<Cancel>, request_id: &str) {
    loop {
        match cancel.recv().await {
            Ok(c) if c.request_id == request_id => return,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}

async fn forward(out: &mpsc::Sender<Notification>, notification: Notification) {
    if out.send(notification).await.is_err() {
        debug!("client stream closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockAdapter;
    use crate::backend::{Algorithm, JSON_HTTP_FAMILY, MisAdapter, TimeConstraint};
    use crate::connectivity::ConnectivityBuilder;
    use crate::domain::{Backend, BackendId, Coord, Location, Mode};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    const ORIGIN: (f64, f64) = (48.85, 2.35);
    const DESTINATION: (f64, f64) = (45.76, 4.83);

    fn origin() -> Location {
        Location::Coord(Coord::new(ORIGIN.0, ORIGIN.1).unwrap())
    }

    fn destination() -> Location {
        Location::Coord(Coord::new(DESTINATION.0, DESTINATION.1).unwrap())
    }

    /// Backends 1, 2 and 3 each serve both endpoints directly.
    fn store() -> Arc<dyn ConnectivityStore> {
        let mut builder = ConnectivityBuilder::new();
        for id in 1..=3 {
            builder = builder
                .backend(id, true, &[Mode::Bus])
                .stop(id, &format!("O{id}"), ORIGIN.0, ORIGIN.1)
                .stop(id, &format!("D{id}"), DESTINATION.0, DESTINATION.1);
        }
        Arc::new(builder.build())
    }

    fn registry(mocks: HashMap<BackendId, MockAdapter>) -> Arc<AdapterRegistry> {
        let mut registry = AdapterRegistry::new();
        registry.register(JSON_HTTP_FAMILY, move |backend: &Backend| {
            mocks
                .get(&backend.id)
                .cloned()
                .map(|m| Arc::new(m) as Arc<dyn MisAdapter>)
                .ok_or_else(|| crate::backend::BackendError::UnknownAdapter(backend.name.clone()))
        });
        Arc::new(registry)
    }

    fn direct(latency_ms: u64) -> MockAdapter {
        MockAdapter::new("direct")
            .connection(origin(), destination(), 120)
            .with_latency(std::time::Duration::from_millis(latency_ms))
    }

    fn mocks(latency_ms: u64) -> HashMap<BackendId, MockAdapter> {
        (1..=3).map(|id| (BackendId(id), direct(latency_ms))).collect()
    }

    fn request(id: &str, max_trips: Option<usize>) -> SearchRequest {
        SearchRequest {
            request_id: id.into(),
            query: TripQuery {
                origin: origin(),
                destination: destination(),
                time: TimeConstraint::DepartureTime(
                    NaiveDate::from_ymd_opt(2024, 3, 15)
                        .unwrap()
                        .and_hms_opt(8, 0, 0)
                        .unwrap(),
                ),
                algorithm: Algorithm::Classic,
                modes: vec![],
                self_drive_conditions: vec![],
                accessibility_constraint: false,
                language: "en".into(),
            },
            max_trips,
        }
    }

    async fn collect(mut rx: mpsc::Receiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Some(n) = rx.recv().await {
            out.push(n);
        }
        out
    }

    #[tokio::test]
    async fn completed_search_ends_with_ending_search() {
        let orchestrator = Orchestrator::new(store(), registry(mocks(0)), PlannerConfig::default());
        let (_cancel_tx, cancel_rx) = broadcast::channel(4);
        let (tx, rx) = mpsc::channel(32);

        let termination = orchestrator.run(request("r1", None), cancel_rx, tx).await;
        let sent = collect(rx).await;

        assert_eq!(termination, Termination::Completed);
        assert!(matches!(&sent[0], Notification::Ack { status: Status::Ok, request_id } if request_id == "r1"));
        assert!(matches!(sent[1], Notification::StartingSearch { chain_count: 3, .. }));
        assert_eq!(
            sent.iter().filter(|n| matches!(n, Notification::Full(_))).count(),
            3
        );
        match sent.last().unwrap() {
            Notification::EndingSearch {
                chain_count,
                existence_count,
                full_count,
                ..
            } => {
                assert_eq!(*chain_count, 3);
                assert_eq!(*existence_count, 0);
                assert_eq!(*full_count, 3);
            }
            other => panic!("expected EndingSearch last, got {other:?}"),
        }
        assert_eq!(sent.iter().filter(|n| n.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn max_trips_caps_workers() {
        let mocks = mocks(0);
        let probes: Vec<MockAdapter> = (1..=3).map(|id| mocks[&BackendId(id)].clone()).collect();
        let orchestrator = Orchestrator::new(store(), registry(mocks), PlannerConfig::default());
        let (_cancel_tx, cancel_rx) = broadcast::channel(4);
        let (tx, rx) = mpsc::channel(32);

        orchestrator.run(request("r1", Some(1)), cancel_rx, tx).await;
        let sent = collect(rx).await;

        assert!(matches!(sent[1], Notification::StartingSearch { chain_count: 1, .. }));
        let queried: usize = probes.iter().map(|m| m.calls().len()).sum();
        assert_eq!(queried, 1);
        assert_eq!(probes[0].calls().len(), 1);
        assert!(matches!(
            sent.last(),
            Some(Notification::EndingSearch { full_count: 1, .. })
        ));
    }

    #[tokio::test]
    async fn cancellation_is_the_terminal_item() {
        let orchestrator = Arc::new(Orchestrator::new(
            store(),
            registry(mocks(5_000)),
            PlannerConfig::default(),
        ));
        let (cancel_tx, cancel_rx) = broadcast::channel(4);
        let (tx, mut rx) = mpsc::channel(32);

        let running = orchestrator.clone();
        let handle = tokio::spawn(async move { running.run(request("r1", None), cancel_rx, tx).await });

        // Wait until the search is under way.
        loop {
            match rx.recv().await {
                Some(Notification::StartingSearch { .. }) => break,
                Some(_) => continue,
                None => panic!("stream closed before search started"),
            }
        }
        cancel_tx.send(Cancel { request_id: "other".into() }).unwrap();
        cancel_tx.send(Cancel { request_id: "r1".into() }).unwrap();

        assert_eq!(handle.await.unwrap(), Termination::Cancelled);
        let rest = collect(rx).await;
        assert_eq!(
            rest.last(),
            Some(&Notification::CancellationAck {
                request_id: "r1".into()
            })
        );
        assert!(!rest.iter().any(|n| matches!(n, Notification::EndingSearch { .. })));
    }

    #[tokio::test]
    async fn hard_cancel_aborts_workers() {
        let config = PlannerConfig::default().with_hard_cancel(true);
        let orchestrator = Arc::new(Orchestrator::new(store(), registry(mocks(5_000)), config));
        let (cancel_tx, cancel_rx) = broadcast::channel(4);
        let (tx, rx) = mpsc::channel(32);

        let running = orchestrator.clone();
        let handle = tokio::spawn(async move { running.run(request("r1", None), cancel_rx, tx).await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel_tx.send(Cancel { request_id: "r1".into() }).unwrap();

        assert_eq!(handle.await.unwrap(), Termination::Cancelled);
        let sent = collect(rx).await;
        assert!(matches!(sent.last(), Some(Notification::CancellationAck { .. })));
    }

    #[tokio::test]
    async fn dropping_a_run_stops_its_workers() {
        // Bus 1 near the origin, metro 2 near the destination, one transfer.
        let store = ConnectivityBuilder::new()
            .backend(1, true, &[Mode::Bus])
            .backend(2, true, &[Mode::Metro])
            .stop(1, "O1", ORIGIN.0, ORIGIN.1)
            .stop(2, "D2", DESTINATION.0, DESTINATION.1)
            .transfer(1, (1, "A"), (2, "B"), 5)
            .build();
        let latency = std::time::Duration::from_millis(200);
        let bus = MockAdapter::new("bus")
            .connection(origin(), crate::backend::mock::stop("A"), 20)
            .with_latency(latency);
        let metro = MockAdapter::new("metro")
            .connection(crate::backend::mock::stop("B"), destination(), 30)
            .with_latency(latency);
        let mocks = HashMap::from([(BackendId(1), bus.clone()), (BackendId(2), metro.clone())]);
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(store),
            registry(mocks),
            PlannerConfig::default(),
        ));
        let (_cancel_tx, cancel_rx) = broadcast::channel(4);
        let (tx, mut rx) = mpsc::channel(32);

        let running = orchestrator.clone();
        let handle = tokio::spawn(async move { running.run(request("r1", None), cancel_rx, tx).await });
        loop {
            match rx.recv().await {
                Some(Notification::StartingSearch { chain_count, .. }) => {
                    assert_eq!(chain_count, 1);
                    break;
                }
                Some(_) => continue,
                None => panic!("stream closed before search started"),
            }
        }
        // Let the bus query get under way.
        tokio::time::sleep(latency / 4).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        // The bus answer would have led to a metro query by now.
        tokio::time::sleep(latency * 3).await;
        assert_eq!(bus.calls().len(), 1);
        assert!(metro.calls().is_empty());
    }

    #[tokio::test]
    async fn chain_search_failure_sends_single_error() {
        let config = PlannerConfig {
            max_chain_length: 0,
            ..PlannerConfig::default()
        };
        let orchestrator = Orchestrator::new(store(), registry(mocks(0)), config);
        let (_cancel_tx, cancel_rx) = broadcast::channel(4);
        let (tx, rx) = mpsc::channel(32);

        let termination = orchestrator.run(request("r1", None), cancel_rx, tx).await;
        let sent = collect(rx).await;

        assert_eq!(termination, Termination::Rejected);
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            Notification::Error { status: Status::ServerError, request_id: Some(id), .. } if id == "r1"
        ));
    }

    #[tokio::test]
    async fn failed_chains_are_silent() {
        let mut mocks = mocks(0);
        mocks.insert(
            BackendId(2),
            MockAdapter::new("down").failing(crate::backend::BackendError::Unauthorized),
        );
        let orchestrator = Orchestrator::new(store(), registry(mocks), PlannerConfig::default());
        let (_cancel_tx, cancel_rx) = broadcast::channel(4);
        let (tx, rx) = mpsc::channel(32);

        let termination = orchestrator.run(request("r1", None), cancel_rx, tx).await;
        let sent = collect(rx).await;

        assert_eq!(termination, Termination::Completed);
        assert!(matches!(
            sent.last(),
            Some(Notification::EndingSearch { chain_count: 3, full_count: 2, .. })
        ));
    }
}
