//! Errors raised while assembling one chain.

use crate::backend::BackendError;
use crate::connectivity::ConnectivityError;
use crate::domain::{BackendId, DomainError};

/// Error from trip assembly.
///
/// Every variant is scoped to a single chain: the worker logs it and stops,
/// sibling chains are unaffected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssemblyError {
    /// A leg's candidate set emptied, or a detailed query found nothing
    #[error("no itinerary on backend {backend}: {reason}")]
    NoItinerary {
        backend: BackendId,
        reason: &'static str,
    },

    /// A query that must answer every point answered fewer
    #[error("incomplete reply from backend {backend}: {received} of {expected} points answered")]
    IncompleteReply {
        backend: BackendId,
        expected: usize,
        received: usize,
    },

    /// The backend reported an error
    #[error("backend {backend}: {source}")]
    Backend {
        backend: BackendId,
        #[source]
        source: BackendError,
    },

    /// Connectivity lookup failed
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    /// A composed trip could not be built
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A derived time was read before any phase set it
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl AssemblyError {
    pub(crate) fn no_itinerary(backend: BackendId, reason: &'static str) -> Self {
        AssemblyError::NoItinerary { backend, reason }
    }

    /// Attach the backend id to an adapter error.
    pub(crate) fn backend(backend: BackendId) -> impl FnOnce(BackendError) -> Self {
        move |source| AssemblyError::Backend { backend, source }
    }
}
