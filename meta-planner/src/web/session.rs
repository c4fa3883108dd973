//! One client connection: inbound messages in, notifications out.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::planner::{Cancel, Notification, Orchestrator, SearchRequest, Status, Termination};

use super::dto::Inbound;

const CANCEL_CAPACITY: usize = 16;

/// Runs every search a client starts on one shared outbound stream.
///
/// Dropping the session aborts searches that are still running.
pub struct Session {
    orchestrator: Arc<Orchestrator>,
    cancels: broadcast::Sender<Cancel>,
    out: mpsc::Sender<Notification>,
    searches: JoinSet<Termination>,
}

impl Session {
    pub fn new(orchestrator: Arc<Orchestrator>, out: mpsc::Sender<Notification>) -> Self {
        let (cancels, _) = broadcast::channel(CANCEL_CAPACITY);
        Self {
            orchestrator,
            cancels,
            out,
            searches: JoinSet::new(),
        }
    }

    /// Number of searches not yet reaped.
    pub fn running(&self) -> usize {
        self.searches.len()
    }

    /// Handle one inbound text frame.
    pub async fn handle(&mut self, text: &str) {
        self.reap();

        let inbound = match serde_json::from_str::<Inbound>(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                debug!(error = %e, "malformed message");
                self.reject(None, format!("malformed message: {e}")).await;
                return;
            }
        };

        match inbound {
            Inbound::Cancel { request_id } => {
                info!(request_id = %request_id, "cancel requested");
                // No receivers just means nothing is running.
                let _ = self.cancels.send(Cancel { request_id });
            }
            Inbound::TripRequest(dto) => {
                let request_id = dto.request_id.clone();
                match dto.into_search() {
                    Ok(search) => self.start(search),
                    Err(e) => {
                        warn!(request_id = %request_id, error = %e, "rejected trip request");
                        let id = (!request_id.is_empty()).then_some(request_id);
                        self.reject(id, e.to_string()).await;
                    }
                }
            }
        }
    }

    /// Start a validated search in the background.
    pub fn start(&mut self, search: SearchRequest) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let cancel = self.cancels.subscribe();
        let out = self.out.clone();
        self.searches
            .spawn(async move { orchestrator.run(search, cancel, out).await });
    }

    /// Wait for every running search and close the outbound stream.
    pub async fn finish(mut self) -> Vec<Termination> {
        let mut ended = Vec::with_capacity(self.searches.len());
        while let Some(joined) = self.searches.join_next().await {
            match joined {
                Ok(termination) => ended.push(termination),
                Err(e) => warn!(error = %e, "search task failed"),
            }
        }
        ended
    }

    fn reap(&mut self) {
        while let Some(joined) = self.searches.try_join_next() {
            if let Err(e) = joined {
                warn!(error = %e, "search task failed");
            }
        }
    }

    async fn reject(&self, request_id: Option<String>, message: String) {
        let error = Notification::Error {
            request_id,
            status: Status::BadRequest,
            message,
        };
        if self.out.send(error).await.is_err() {
            debug!("client stream closed");
        }
    }
}
