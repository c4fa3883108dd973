//! Backend connectivity: where backends are, how they link, and which chains
//! of them can carry a trip.

mod chains;
mod store;
mod transfers;

pub use chains::{Chain, ChainError, ChainFinder, ChainQuery, DEFAULT_MAX_CHAIN_LENGTH};
pub use store::{
    BackendStop, ConnectivityBuilder, ConnectivityError, ConnectivityStore, DEFAULT_RADIUS_M,
    InMemoryConnectivity, Snapshot, StopRef, TransferLink,
};
pub use transfers::{DEFAULT_MAX_TRANSFERS, Transfer, TransferResolver};
