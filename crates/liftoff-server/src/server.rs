//! `LaunchServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use liftoff_core::ConnectionId;
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::coordinator::{Coordinator, CoordinatorHandle};
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::limiter::ConnectionLimiter;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::handler::CommandGate;
use crate::websocket::session::{WsContext, run_ws_session};

/// Hard transport cap on a single inbound WebSocket message. Frames under
/// this but over the configured size are rejected as commands instead of
/// tearing down the connection.
const TRANSPORT_MESSAGE_LIMIT: usize = 1 << 20;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the session coordinator.
    pub coordinator: CoordinatorHandle,
    /// Per-connection context.
    pub ws: Arc<WsContext>,
    /// Concurrent connection cap.
    pub limiter: Arc<ConnectionLimiter>,
    /// Prometheus handle for `/metrics`.
    pub metrics: PrometheusHandle,
    /// When the server started.
    pub start_time: Instant,
}

/// The launch coordination server.
///
/// Construct inside a Tokio runtime: the coordinator task is spawned
/// immediately.
pub struct LaunchServer {
    config: ServerConfig,
    state: AppState,
    shutdown: Arc<ShutdownCoordinator>,
    coordinator_task: Mutex<Option<JoinHandle<()>>>,
}

impl LaunchServer {
    /// Create a new server and start its coordinator.
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (coordinator, task) = Coordinator::spawn(config.threshold, shutdown.token());

        if config.access.is_open() {
            warn!("no admin token configured: any peer may reset or reveal");
        }

        let ws = Arc::new(WsContext {
            coordinator: coordinator.clone(),
            gate: CommandGate {
                policy: config.access.clone(),
                max_participant_id_len: config.max_participant_id_len,
                max_message_size: config.max_message_size,
            },
            send_queue_capacity: config.send_queue_capacity,
            heartbeat_interval: config.heartbeat_interval(),
            heartbeat_timeout: config.heartbeat_timeout(),
            shutdown: shutdown.token(),
        });

        let state = AppState {
            coordinator,
            ws,
            limiter: ConnectionLimiter::new(config.max_connections),
            metrics,
            start_time: Instant::now(),
        };

        Self {
            config,
            state,
            shutdown,
            coordinator_task: Mutex::new(Some(task)),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/state", get(state_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind and serve in a background task.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task,
    /// which finishes once [`shutdown`](Self::shutdown) is triggered.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "server error");
            }
        });

        info!(
            %local_addr,
            threshold = %self.config.threshold,
            max_connections = self.config.max_connections,
            "launch server listening"
        );
        Ok((local_addr, handle))
    }

    /// Stop accepting, close every peer and wait for the coordinator and
    /// `serve_task` to finish.
    pub async fn shutdown_gracefully(&self, serve_task: JoinHandle<()>, timeout: Option<Duration>) {
        let mut tasks = vec![("http", serve_task)];
        if let Some(task) = self.coordinator_task.lock().take() {
            tasks.push(("coordinator", task));
        }
        let aborted = self.shutdown.graceful_shutdown(tasks, timeout).await;
        info!(?aborted, "launch server stopped");
    }

    /// Get the coordinator handle.
    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.state.coordinator
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET / and GET /ws: WebSocket upgrade.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let Some(slot) = state.limiter.try_acquire() else {
        warn!(active = state.limiter.active(), "connection limit reached, refusing upgrade");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    };
    let ctx = state.ws.clone();
    ws.max_message_size(TRANSPORT_MESSAGE_LIMIT)
        .on_upgrade(move |socket| async move {
            let _slot = slot;
            run_ws_session(socket, ConnectionId::new(), ctx).await;
        })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Response {
    match state.coordinator.status().await {
        Ok(status) => {
            let resp: HealthResponse = health::health_check(state.start_time, &status);
            Json(resp).into_response()
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

/// GET /state
async fn state_handler(State(state): State<AppState>) -> Response {
    match state.coordinator.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics)
}
