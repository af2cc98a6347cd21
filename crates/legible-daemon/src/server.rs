// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP status surface: liveness, readiness, status JSON and sync control.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use legible_core::error::{LegibleError, Result};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::status::{DaemonStatus, StatusTracker};

/// Body of the sync control endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    fn new(success: bool, message: &str) -> Self {
        Self {
            success,
            message: message.to_owned(),
            error: None,
        }
    }
}

/// Routes served by the status listener.
pub fn router(tracker: Arc<StatusTracker>) -> Router {
    Router::new()
        .route("/health", get(alive))
        .route("/ready", get(alive))
        .route("/status", get(status))
        .route("/api/sync/trigger", post(trigger_sync))
        .route("/api/sync/cancel", post(cancel_sync))
        .with_state(tracker)
}

async fn alive() -> &'static str {
    "OK\n"
}

async fn status(State(tracker): State<Arc<StatusTracker>>) -> Json<DaemonStatus> {
    Json(tracker.status())
}

/// Acknowledges only; syncs run on the schedule.
async fn trigger_sync(
    State(tracker): State<Arc<StatusTracker>>,
) -> (StatusCode, Json<ControlResponse>) {
    if tracker.is_syncing() {
        return (
            StatusCode::CONFLICT,
            Json(ControlResponse::new(false, "Sync already in progress")),
        );
    }
    (
        StatusCode::ACCEPTED,
        Json(ControlResponse::new(
            true,
            "Manual sync trigger not yet implemented - syncs run on schedule only",
        )),
    )
}

async fn cancel_sync(
    State(tracker): State<Arc<StatusTracker>>,
) -> (StatusCode, Json<ControlResponse>) {
    if !tracker.is_syncing() {
        return (
            StatusCode::CONFLICT,
            Json(ControlResponse::new(false, "No sync in progress to cancel")),
        );
    }
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(ControlResponse::new(false, "Sync cancellation not yet implemented")),
    )
}

// ---------------------------------------------------------------------------
// Listener lifecycle
// ---------------------------------------------------------------------------

/// A bound, running status listener.
pub struct StatusServer {
    local_addr: SocketAddr,
    shutdown_signal: Arc<Notify>,
    task_handle: JoinHandle<()>,
}

impl StatusServer {
    /// Bind `addr` and start serving in the background.
    ///
    /// # Errors
    ///
    /// Returns [`LegibleError::Server`] if the address cannot be bound.
    pub async fn start(addr: &str, tracker: Arc<StatusTracker>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| LegibleError::Server(format!("bind {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| LegibleError::Server(format!("local address: {e}")))?;

        let shutdown_signal = Arc::new(Notify::new());
        let shutdown = Arc::clone(&shutdown_signal);
        let app = router(tracker);

        let task_handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.notified().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "status server failed");
            }
        });

        info!(addr = %local_addr, "status server listening");
        Ok(Self {
            local_addr,
            shutdown_signal,
            task_handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and give open connections `grace` to finish.
    pub async fn stop(self, grace: Duration) {
        info!(addr = %self.local_addr, "stopping status server");
        // notify_one keeps a permit if the server task has not polled yet.
        self.shutdown_signal.notify_one();

        let mut handle = self.task_handle;
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(())) => info!("status server stopped"),
            Ok(Err(e)) => warn!(error = %e, "status server task ended abnormally"),
            Err(_) => {
                warn!(grace_secs = grace.as_secs_f64(), "status server did not drain in time");
                handle.abort();
            }
        }
        debug!("status server shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    async fn call(tracker: &Arc<StatusTracker>, method: Method, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        let response = router(Arc::clone(tracker))
            .oneshot(request)
            .await
            .expect("response");
        let code = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (code, String::from_utf8(bytes.to_vec()).expect("utf-8"))
    }

    #[tokio::test]
    async fn health_and_ready_answer_ok() {
        let tracker = Arc::new(StatusTracker::new());
        for path in ["/health", "/ready"] {
            let (code, body) = call(&tracker, Method::GET, path).await;
            assert_eq!(code, StatusCode::OK);
            assert_eq!(body, "OK\n");
        }
    }

    #[tokio::test]
    async fn status_reports_the_tracker_snapshot() {
        let tracker = Arc::new(StatusTracker::new());
        tracker.sync_started(7);
        tracker.update_progress(2, "Journal", "ocr");

        let (code, body) = call(&tracker, Method::GET, "/status").await;
        assert_eq!(code, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(json["state"], "syncing");
        assert_eq!(json["current_sync"]["documents_total"], 7);
        assert_eq!(json["current_sync"]["current_document"], "Journal");
        assert!(json["last_sync_result"].is_null());
    }

    #[tokio::test]
    async fn trigger_is_acknowledged_when_idle() {
        let tracker = Arc::new(StatusTracker::new());
        let (code, body) = call(&tracker, Method::POST, "/api/sync/trigger").await;
        assert_eq!(code, StatusCode::ACCEPTED);
        let json: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(json["success"], true);
        assert!(json["message"].as_str().expect("message").contains("schedule"));
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn trigger_conflicts_with_a_running_sync() {
        let tracker = Arc::new(StatusTracker::new());
        tracker.sync_started(1);
        let (code, _) = call(&tracker, Method::POST, "/api/sync/trigger").await;
        assert_eq!(code, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn cancel_is_not_implemented() {
        let tracker = Arc::new(StatusTracker::new());
        let (idle, _) = call(&tracker, Method::POST, "/api/sync/cancel").await;
        assert_eq!(idle, StatusCode::CONFLICT);

        tracker.sync_started(1);
        let (busy, body) = call(&tracker, Method::POST, "/api/sync/cancel").await;
        assert_eq!(busy, StatusCode::NOT_IMPLEMENTED);
        let json: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn control_endpoints_reject_get() {
        let tracker = Arc::new(StatusTracker::new());
        let (code, _) = call(&tracker, Method::GET, "/api/sync/trigger").await;
        assert_eq!(code, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn serves_over_tcp_and_stops() {
        let tracker = Arc::new(StatusTracker::new());
        let server = StatusServer::start("127.0.0.1:0", tracker)
            .await
            .expect("start");

        let mut stream = tokio::net::TcpStream::connect(server.local_addr())
            .await
            .expect("connect");
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .expect("send");
        let mut reply = String::new();
        stream.read_to_string(&mut reply).await.expect("read");
        assert!(reply.starts_with("HTTP/1.1 200"));
        assert!(reply.ends_with("OK\n"));

        server.stop(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn occupied_address_is_a_setup_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = taken.local_addr().expect("addr").to_string();
        let err = StatusServer::start(&addr, Arc::new(StatusTracker::new()))
            .await
            .err()
            .expect("address in use");
        assert!(matches!(err, LegibleError::Server(_)));
        assert!(err.aborts_sync());
    }
}
