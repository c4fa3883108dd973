//! HTTP route handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::planner::{Notification, Orchestrator};

use super::dto::{ErrorResponse, RequestError, TripRequestDto};
use super::session::Session;
use super::state::AppState;

/// Outbound notifications buffered per connection.
const OUTBOUND_CAPACITY: usize = 256;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/trips", post(plan_trip))
        .route("/trips/ws", get(trips_socket))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Upgrade to the streaming trip socket.
async fn trips_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state.orchestrator))
}

async fn serve_socket(socket: WebSocket, orchestrator: Arc<Orchestrator>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Notification>(OUTBOUND_CAPACITY);
    info!("trip socket opened");

    let writer = tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            let text = match serde_json::to_string(&notification) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "failed to encode notification");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                debug!("socket closed while writing");
                break;
            }
        }
    });

    let mut session = Session::new(orchestrator, tx);
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => session.handle(&text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "socket read failed");
                break;
            }
        }
    }

    // Aborts searches still running for this client.
    drop(session);
    if let Err(e) = writer.await {
        warn!(error = %e, "socket writer failed");
    }
    info!("trip socket closed");
}

/// Run one trip request to completion and return every notification.
async fn plan_trip(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Vec<Notification>>, AppError> {
    let dto: TripRequestDto = serde_json::from_slice(&body).map_err(|e| AppError::BadRequest {
        message: format!("Invalid JSON: {e}"),
    })?;
    let search = dto.into_search()?;

    let (tx, mut rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let (_cancels, cancel_rx) = broadcast::channel(1);
    let collect = async {
        let mut notifications = Vec::new();
        while let Some(n) = rx.recv().await {
            notifications.push(n);
        }
        notifications
    };

    let (termination, notifications) =
        tokio::join!(state.orchestrator.run(search, cancel_rx, tx), collect);
    debug!(?termination, count = notifications.len(), "trip request finished");

    Ok(Json(notifications))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
}

impl From<RequestError> for AppError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::BadRequest(message) => AppError::BadRequest { message },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
        };

        warn!(%status, %message, "request failed");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
