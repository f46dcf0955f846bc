//! HTTP listener for canonical state notifications from the alarm server.
//!
//! The remote brain announces every state transition as `POST /<state>` with
//! an empty body. The handler only translates the path into an intent and
//! enqueues it; the worker thread applies it in order with everything else.

use crate::controller::Intent;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use log::{info, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::state::AlarmState;

pub fn router(tx: UnboundedSender<Intent>) -> Router {
    Router::new().route("/:state", post(notify)).with_state(tx)
}

async fn notify(
    State(tx): State<UnboundedSender<Intent>>,
    Path(state): Path<String>,
) -> StatusCode {
    let Some(state) = AlarmState::from_notification(&state) else {
        warn!("Ignoring notification for unknown state: {state}");
        return StatusCode::NOT_FOUND;
    };
    info!("Received {} notification", state.command_name());
    if tx.send(Intent::Canonical(state)).is_err() {
        // The worker is gone; nothing left to notify.
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

/// Binds and serves until the process exits.
pub async fn serve(addr: &str, tx: UnboundedSender<Intent>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening for state notifications on {addr}");
    axum::serve(listener, router(tx)).await
}
