//! Planner configuration.

use crate::connectivity::{DEFAULT_MAX_CHAIN_LENGTH, DEFAULT_MAX_TRANSFERS, DEFAULT_RADIUS_M};

/// Configuration parameters for trip planning.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Maximum number of backends in a chain.
    pub max_chain_length: usize,

    /// Maximum transfer links considered between two adjacent backends.
    pub max_transfers: usize,

    /// Chains searched when a request does not say.
    pub default_max_trips: usize,

    /// Capacity of the per-request notification queue.
    pub queue_capacity: usize,

    /// Abort in-flight workers on cancellation instead of letting them run
    /// to completion.
    pub hard_cancel: bool,

    /// Radius (metres) within which a backend stop counts as near an
    /// endpoint.
    pub nearby_radius_m: f64,
}

impl PlannerConfig {
    /// Create a new configuration with the given limits.
    pub fn new(max_chain_length: usize, max_transfers: usize, default_max_trips: usize) -> Self {
        Self {
            max_chain_length,
            max_transfers,
            default_max_trips,
            ..Self::default()
        }
    }

    /// Set the notification queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Enable or disable hard cancellation.
    pub fn with_hard_cancel(mut self, hard_cancel: bool) -> Self {
        self.hard_cancel = hard_cancel;
        self
    }

    /// Set the proximity radius.
    pub fn with_nearby_radius(mut self, radius_m: f64) -> Self {
        self.nearby_radius_m = radius_m;
        self
    }

    /// Number of chains to search for a request asking for `requested`.
    pub fn trips_for(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_max_trips)
    }

    /// Queue capacity, never zero.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
            max_transfers: DEFAULT_MAX_TRANSFERS,
            default_max_trips: 10,
            queue_capacity: 64,
            hard_cancel: false,
            nearby_radius_m: DEFAULT_RADIUS_M,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlannerConfig::default();

        assert_eq!(config.max_chain_length, 3);
        assert_eq!(config.max_transfers, 10);
        assert_eq!(config.default_max_trips, 10);
        assert_eq!(config.queue_capacity, 64);
        assert!(!config.hard_cancel);
        assert_eq!(config.nearby_radius_m, 1000.0);
    }

    #[test]
    fn custom_config() {
        let config = PlannerConfig::new(4, 5, 2)
            .with_queue_capacity(0)
            .with_hard_cancel(true)
            .with_nearby_radius(250.0);

        assert_eq!(config.max_chain_length, 4);
        assert_eq!(config.max_transfers, 5);
        assert_eq!(config.default_max_trips, 2);
        assert_eq!(config.queue_capacity(), 1);
        assert!(config.hard_cancel);
        assert_eq!(config.nearby_radius_m, 250.0);
    }

    #[test]
    fn trips_for_request() {
        let config = PlannerConfig::default();
        assert_eq!(config.trips_for(None), 10);
        assert_eq!(config.trips_for(Some(1)), 1);
    }
}
