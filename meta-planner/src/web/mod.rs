//! Web layer for the trip planner.
//!
//! Trip requests arrive either on a WebSocket, where notifications stream
//! back as they are produced and searches can be cancelled, or as a single
//! POST that answers with the whole notification list.

mod dto;
mod routes;
mod session;
mod state;

pub use dto::{ErrorResponse, Inbound, RequestError, TripRequestDto};
pub use routes::{AppError, create_router};
pub use session::Session;
pub use state::AppState;
