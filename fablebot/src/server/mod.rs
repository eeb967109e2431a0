//! HTTP transport adapter.
//!
//! The chat transport proper lives outside this service; this module is
//! the boundary it plugs into. Inbound messages arrive as
//! `POST /api/messages` and every reply the router produces for that
//! message is returned in the response body, in order. A `GET /healthz`
//! endpoint answers liveness probes.
//!
//! Replies still flow through the `Transport` seam: the handler hands the
//! router a per-request buffer, so the router never knows it is talking to
//! HTTP.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router as HttpRouter};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use crate::router::{InboundMessage, Router, Transport};
use crate::store::Store;

/// Inbound message payload. `event_id` is optional; one is minted when the
/// transport doesn't supply it.
#[derive(Debug, Deserialize)]
struct MessageRequest {
    event_id: Option<String>,
    author_id: String,
    #[serde(default)]
    channel: String,
    text: String,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    event_id: String,
    replies: Vec<String>,
}

/// Transport that buffers replies for one request.
#[derive(Default)]
struct ReplyBuffer {
    replies: Mutex<Vec<String>>,
}

impl Transport for ReplyBuffer {
    async fn send(&self, _channel: &str, text: &str) -> Result<()> {
        self.replies.lock().await.push(text.to_string());
        Ok(())
    }
}

struct AppState<S> {
    router: Router<S>,
}

/// Serve the webhook until interrupted, then close any live sessions so no
/// interpreter processes or temp directories are left behind.
pub async fn run<S: Store>(listener: TcpListener, router: Router<S>) -> Result<()> {
    let state = Arc::new(AppState { router });

    let app = HttpRouter::new()
        .route("/api/messages", post(post_message))
        .route("/healthz", get(healthz))
        .with_state(state.clone());

    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.router.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn healthz() -> &'static str {
    "ok"
}

async fn post_message<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(request): Json<MessageRequest>,
) -> (StatusCode, Json<MessageResponse>) {
    let message = InboundMessage {
        event_id: request
            .event_id
            .unwrap_or_else(|| Uuid::now_v7().to_string()),
        author_id: request.author_id,
        channel: request.channel,
        text: request.text,
    };

    let buffer = ReplyBuffer::default();
    // Infrastructure failures are logged here; the user-facing reply was
    // already buffered by the router.
    if let Err(err) = state.router.handle(&message, &buffer).await {
        error!(event = %message.event_id, author = %message.author_id, "message handling failed: {err:#}");
    }

    let replies = buffer.replies.into_inner();
    (
        StatusCode::OK,
        Json(MessageResponse {
            event_id: message.event_id,
            replies,
        }),
    )
}
