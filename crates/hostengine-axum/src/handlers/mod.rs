//! HTTP request handlers for the Axum web server.
//!
//! Handlers are thin wrappers over the supervisor, the status reporter and
//! the proxy forwarder held in [`AxumContext`](crate::AxumContext).

pub mod engine;
pub mod health;
pub mod models;
pub mod proxy;

use std::future::Future;

use crate::error::HttpError;

/// Run a lifecycle operation as its own task.
///
/// Start/stop/swap can take many seconds; detaching keeps them off the
/// request's task and lets them finish even if the client goes away.
pub(crate) async fn run_detached<F>(operation: F) -> Result<F::Output, HttpError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|e| HttpError::Internal(format!("Engine operation aborted: {e}")))
}
