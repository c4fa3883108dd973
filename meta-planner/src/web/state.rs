//! Application state for the web layer.

use std::sync::Arc;

use crate::backend::AdapterRegistry;
use crate::connectivity::ConnectivityStore;
use crate::planner::{Orchestrator, PlannerConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Request runner shared by every connection
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(
        store: Arc<dyn ConnectivityStore>,
        registry: AdapterRegistry,
        config: PlannerConfig,
    ) -> Self {
        Self {
            orchestrator: Arc::new(Orchestrator::new(store, Arc::new(registry), config)),
        }
    }
}
