//! Backend (MIS) identity and metadata.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::DomainError;

/// Identifier of a transport-information backend.
///
/// Ordering is numeric, which is also the order the chain finder walks
/// candidate sets in.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(pub u32);

impl fmt::Debug for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BackendId({})", self.0)
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A backend-native stop identifier.
///
/// Codes are opaque to the planner; the only guarantee is that they are
/// non-empty and carry no surrounding whitespace.
///
/// # Examples
///
/// ```
/// use meta_planner::domain::StopCode;
///
/// let code = StopCode::parse("STIF:StopPoint:Q:41322:").unwrap();
/// assert_eq!(code.as_str(), "STIF:StopPoint:Q:41322:");
///
/// assert!(StopCode::parse("").is_err());
/// assert!(StopCode::parse(" A1").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StopCode(String);

impl StopCode {
    /// Parse a stop code, rejecting blank or padded input.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        if s.is_empty() {
            return Err(DomainError::InvalidStopCode("must not be empty"));
        }
        if s.trim() != s {
            return Err(DomainError::InvalidStopCode(
                "must not have surrounding whitespace",
            ));
        }
        Ok(StopCode(s.to_string()))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StopCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StopCode> for String {
    fn from(code: StopCode) -> Self {
        code.0
    }
}

impl fmt::Debug for StopCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StopCode({})", self.0)
    }
}

impl fmt::Display for StopCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport modes a backend can declare and a request can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    /// No restriction. Only meaningful in a filter.
    All,
    Bus,
    Tram,
    Metro,
    Rail,
    Ferry,
    Coach,
    Bike,
    Car,
    Walk,
}

impl Mode {
    /// True if a filter places no restriction on backends.
    ///
    /// An empty filter and any filter containing [`Mode::All`] are
    /// unrestricted.
    pub fn is_unrestricted(filter: &[Mode]) -> bool {
        filter.is_empty() || filter.contains(&Mode::All)
    }
}

fn default_adapter() -> String {
    "json-http".to_string()
}

/// Static description of a backend, as held by the connectivity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backend {
    pub id: BackendId,

    /// Human-readable provider name, reported in notifications.
    pub name: String,

    /// Adapter family used to talk to this backend.
    #[serde(default = "default_adapter")]
    pub adapter: String,

    /// Base endpoint of the adapter.
    pub api_url: String,

    /// Credential sent with every request.
    #[serde(default)]
    pub api_key: String,

    /// Accepts one-to-many / many-to-one queries.
    pub multi_point: bool,

    /// Accepts raw coordinates as query endpoints.
    #[serde(default)]
    pub geographic_position: bool,

    pub modes: BTreeSet<Mode>,

    /// First day of validity (inclusive).
    pub start_date: NaiveDate,

    /// Last day of validity (inclusive).
    pub end_date: NaiveDate,
}

impl Backend {
    /// True if the validity window covers `date`.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// True if the backend declares at least one mode of `filter`.
    ///
    /// Unrestricted filters accept every backend.
    pub fn serves_any(&self, filter: &[Mode]) -> bool {
        Mode::is_unrestricted(filter) || filter.iter().any(|m| self.modes.contains(m))
    }
}
