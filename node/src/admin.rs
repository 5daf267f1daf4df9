//! Administrative surface: pause, force-tick, stats, metrics.
//!
//! Exposed programmatically via [`AdminHandle`] and over a small axum
//! router served by the daemon when an admin port is configured.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use prometheus::Encoder;
use serde::Deserialize;
use tokio::sync::mpsc;

use govwatch_types::ChainId;

use crate::delivery::DeliveryGate;
use crate::metrics::{GovMetrics, Stats};
use crate::shutdown::ShutdownController;
use crate::NodeError;

/// Handle the host process uses to administer a running node.
#[derive(Clone)]
pub struct AdminHandle {
    gate: Arc<DeliveryGate>,
    metrics: Arc<GovMetrics>,
    force_ticks: Arc<HashMap<ChainId, mpsc::Sender<()>>>,
}

impl AdminHandle {
    pub fn new(
        gate: Arc<DeliveryGate>,
        metrics: Arc<GovMetrics>,
        force_ticks: HashMap<ChainId, mpsc::Sender<()>>,
    ) -> Self {
        Self {
            gate,
            metrics,
            force_ticks: Arc::new(force_ticks),
        }
    }

    /// Toggle the process-wide delivery pause.
    pub fn pause_delivery(&self, paused: bool) {
        self.gate.set_paused(paused);
    }

    pub fn is_delivery_paused(&self) -> bool {
        self.gate.is_paused()
    }

    /// Schedule an immediate watcher tick for one chain.
    pub fn force_tick(&self, chain: &ChainId) -> Result<(), NodeError> {
        let sender = self
            .force_ticks
            .get(chain)
            .ok_or_else(|| NodeError::UnknownChain(chain.to_string()))?;
        // A full command channel means ticks are already queued up; the
        // request is effectively satisfied.
        let _ = sender.try_send(());
        Ok(())
    }

    /// Counter snapshot.
    pub fn stats(&self) -> Stats {
        self.metrics.stats()
    }

    fn encode_metrics(&self) -> Result<Vec<u8>, NodeError> {
        let mut buf = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&self.metrics.registry.gather(), &mut buf)
            .map_err(|e| NodeError::Admin(e.to_string()))?;
        Ok(buf)
    }
}

#[derive(Debug, Deserialize)]
struct PauseRequest {
    paused: bool,
}

async fn get_stats(State(admin): State<AdminHandle>) -> Json<Stats> {
    Json(admin.stats())
}

async fn put_pause(
    State(admin): State<AdminHandle>,
    Json(request): Json<PauseRequest>,
) -> Json<serde_json::Value> {
    admin.pause_delivery(request.paused);
    Json(serde_json::json!({ "paused": request.paused }))
}

async fn post_tick(
    State(admin): State<AdminHandle>,
    Path(chain_id): Path<String>,
) -> impl IntoResponse {
    match admin.force_tick(&ChainId::new(chain_id)) {
        Ok(()) => (StatusCode::ACCEPTED, "tick scheduled").into_response(),
        Err(NodeError::UnknownChain(chain)) => {
            (StatusCode::NOT_FOUND, format!("unknown chain: {chain}")).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn get_metrics(State(admin): State<AdminHandle>) -> impl IntoResponse {
    match admin.encode_metrics() {
        Ok(buf) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            buf,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Build the admin router.
pub fn admin_router(admin: AdminHandle) -> Router {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/pause", put(put_pause))
        .route("/tick/:chain_id", post(post_tick))
        .route("/metrics", get(get_metrics))
        .with_state(admin)
}

/// Serve the admin router until shutdown.
pub async fn serve_admin(
    admin: AdminHandle,
    port: u16,
    shutdown: Arc<ShutdownController>,
) -> Result<(), NodeError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| NodeError::Admin(format!("bind {addr}: {e}")))?;
    tracing::info!(%addr, "admin server listening");

    let mut shutdown_rx = shutdown.subscribe();
    axum::serve(listener, admin_router(admin))
        .with_graceful_shutdown(async move {
            // The broadcast is not replayed for late subscribers; fall back
            // to the flag if shutdown already began.
            if !shutdown.is_triggered() {
                let _ = shutdown_rx.recv().await;
            }
        })
        .await
        .map_err(|e| NodeError::Admin(e.to_string()))
}
