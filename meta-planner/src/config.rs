//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::cache::CacheConfig;
use crate::planner::PlannerConfig;

const DEFAULT_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 3000);
const DEFAULT_CONNECTIVITY_PATH: &str = "connectivity.json";

/// Everything `main` needs to start the server.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen address
    pub addr: SocketAddr,

    /// Connectivity snapshot to load at startup
    pub connectivity_path: PathBuf,

    pub planner: PlannerConfig,

    pub cache: CacheConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(DEFAULT_ADDR),
            connectivity_path: PathBuf::from(DEFAULT_CONNECTIVITY_PATH),
            planner: PlannerConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read `PLANNER_*` variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = parsed(&lookup, "PLANNER_ADDR") {
            config.addr = addr;
        }
        if let Some(path) = lookup("PLANNER_CONNECTIVITY_PATH") {
            config.connectivity_path = PathBuf::from(path);
        }
        if let Some(length) = parsed(&lookup, "PLANNER_MAX_CHAIN_LENGTH") {
            config.planner.max_chain_length = length;
        }
        if let Some(transfers) = parsed(&lookup, "PLANNER_MAX_TRANSFERS") {
            config.planner.max_transfers = transfers;
        }
        if let Some(hard) = parsed(&lookup, "PLANNER_HARD_CANCEL") {
            config.planner = config.planner.with_hard_cancel(hard);
        }
        let radius: Option<f64> = parsed(&lookup, "PLANNER_NEARBY_RADIUS_M");
        if let Some(radius) = radius {
            if radius.is_finite() && radius >= 0.0 {
                config.planner = config.planner.with_nearby_radius(radius);
            } else {
                warn!(radius, "ignoring PLANNER_NEARBY_RADIUS_M");
            }
        }

        config
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "ignoring unparsable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = from(&[]);
        assert_eq!(config.addr, SocketAddr::from(([127, 0, 0, 1], 3000)));
        assert_eq!(config.connectivity_path, PathBuf::from("connectivity.json"));
        assert_eq!(config.planner.max_chain_length, 3);
        assert!(!config.planner.hard_cancel);
    }

    #[test]
    fn reads_every_setting() {
        let config = from(&[
            ("PLANNER_ADDR", "0.0.0.0:8080"),
            ("PLANNER_CONNECTIVITY_PATH", "/data/graph.json"),
            ("PLANNER_MAX_CHAIN_LENGTH", "2"),
            ("PLANNER_MAX_TRANSFERS", "4"),
            ("PLANNER_HARD_CANCEL", "true"),
            ("PLANNER_NEARBY_RADIUS_M", "750.5"),
        ]);

        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.connectivity_path, PathBuf::from("/data/graph.json"));
        assert_eq!(config.planner.max_chain_length, 2);
        assert_eq!(config.planner.max_transfers, 4);
        assert!(config.planner.hard_cancel);
        assert_eq!(config.planner.nearby_radius_m, 750.5);
    }

    #[test]
    fn unparsable_values_keep_defaults() {
        let config = from(&[
            ("PLANNER_ADDR", "nowhere"),
            ("PLANNER_MAX_TRANSFERS", "lots"),
            ("PLANNER_NEARBY_RADIUS_M", "-5"),
        ]);

        assert_eq!(config.addr.port(), 3000);
        assert_eq!(config.planner.max_transfers, 10);
        assert_eq!(config.planner.nearby_radius_m, 1000.0);
    }
}
