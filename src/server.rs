//! HTTP control surface: start runs, read status and config, stream logs.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info};

use crate::config::FactoryConfig;
use crate::error::FactoryError;
use crate::orchestrator::{ApplicationRunner, RunGate};
use crate::telemetry::{LogEntry, LogHub, RUN_COMPLETE_MARKER};

#[derive(Clone)]
pub struct ServerState {
    config: Arc<FactoryConfig>,
    gate: RunGate,
    hub: LogHub,
}

impl ServerState {
    pub fn new(config: FactoryConfig, hub: LogHub) -> Self {
        Self {
            config: Arc::new(config),
            gate: RunGate::new(),
            hub,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default)]
    pub magic_link: Option<String>,
    #[serde(default)]
    pub overrides: Option<Value>,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/config", get(config_endpoint))
        .route("/api/status", get(status_endpoint))
        .route("/api/run", post(run_endpoint))
        .route("/api/logs", get(logs_endpoint))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: ServerState) -> Result<(), FactoryError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("App Factory control surface listening on http://{addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn config_endpoint(State(state): State<ServerState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "actors": config.actors,
        "defaults": config.defaults,
        "timeouts": config.timeouts,
        "retry": config.retry,
    }))
}

async fn status_endpoint(State(state): State<ServerState>) -> Json<Value> {
    Json(json!({ "running": state.gate.is_running() }))
}

async fn run_endpoint(
    State(state): State<ServerState>,
    Json(request): Json<RunRequest>,
) -> (StatusCode, Json<Value>) {
    let guard = match state.gate.try_acquire() {
        Ok(guard) => guard,
        Err(e) => return (StatusCode::CONFLICT, Json(json!({ "error": e.to_string() }))),
    };

    let Some(magic_link) = request.magic_link.filter(|link| !link.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "magicLink is required" })),
        );
    };

    let mut config = FactoryConfig::clone(&state.config);
    if let Some(overrides) = &request.overrides {
        if let Err(e) = config.apply_overrides(overrides) {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })));
        }
    }

    let hub = state.hub.clone();
    tokio::spawn(async move {
        let _guard = guard;
        match ApplicationRunner::new(config).run(&magic_link).await {
            Ok(outcome) => info!(
                "Run {} finished in {}ms",
                outcome.record.run_id, outcome.record.duration_ms
            ),
            Err(e) => error!("Run failed: {e}"),
        }
        hub.publish(LogEntry::info(module_path!(), RUN_COMPLETE_MARKER));
    });

    (StatusCode::OK, Json(json!({ "status": "started" })))
}

/// Entries from `rx` until the hub closes. Lagged observers skip ahead.
fn log_entries(rx: broadcast::Receiver<LogEntry>) -> impl Stream<Item = LogEntry> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(entry) => return Some((entry, rx)),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

async fn logs_endpoint(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    use futures::StreamExt;

    let events = log_entries(state.hub.subscribe()).map(|entry| {
        Ok(Event::default()
            .json_data(&entry)
            .unwrap_or_else(|_| Event::default().data(entry.message)))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
