//! The launch coordinator: a single task that owns the session and the
//! peer registry.
//!
//! Every mutation, snapshot serialization and fan-out enqueue happens on
//! this task, so all peers observe snapshots in mutation order. Peers talk
//! to it through a cloneable [`CoordinatorHandle`].

use std::collections::HashMap;
use std::sync::Arc;

use liftoff_core::{Command, ConnectionId, Outcome, Phase, Session, Snapshot, Threshold};
use metrics::{counter, gauge};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::CoordinatorError;
use crate::metrics::{
    LAUNCH_CLICK_COUNT, LAUNCH_CLICKS_TOTAL, LAUNCHES_TOTAL, RESETS_TOTAL, REVEALS_TOTAL,
    WS_BROADCAST_DROPS_TOTAL,
};
use crate::websocket::connection::ClientConnection;

/// Depth of the coordinator's request queue.
pub const REQUEST_QUEUE_CAPACITY: usize = 1024;

/// Messages accepted by the coordinator task.
pub enum CoordinatorRequest {
    /// Register a peer and send it the current snapshot.
    Connect(Arc<ClientConnection>),
    /// Forget a peer.
    Disconnect(ConnectionId),
    /// Apply a validated command on behalf of a peer.
    Command {
        /// Originating connection.
        from: ConnectionId,
        /// The command to apply.
        command: Command,
    },
    /// Read the current state.
    Status(oneshot::Sender<CoordinatorStatus>),
}

/// Point-in-time view of the coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorStatus {
    /// Full session state.
    pub snapshot: Snapshot,
    /// Current phase.
    pub phase: Phase,
    /// Configured threshold.
    pub threshold: Threshold,
    /// Registered peers.
    pub connections: usize,
}

/// Cloneable sender side of the coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordinatorRequest>,
}

impl CoordinatorHandle {
    async fn request(&self, request: CoordinatorRequest) -> Result<(), CoordinatorError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| CoordinatorError::Closed)
    }

    /// Register a peer. It receives the current snapshot as its first frame.
    pub async fn connect(&self, connection: Arc<ClientConnection>) -> Result<(), CoordinatorError> {
        self.request(CoordinatorRequest::Connect(connection)).await
    }

    /// Remove a peer from the registry.
    pub async fn disconnect(&self, id: ConnectionId) -> Result<(), CoordinatorError> {
        self.request(CoordinatorRequest::Disconnect(id)).await
    }

    /// Submit a command from `from`.
    pub async fn submit(&self, from: ConnectionId, command: Command) -> Result<(), CoordinatorError> {
        self.request(CoordinatorRequest::Command { from, command }).await
    }

    /// Current status.
    pub async fn status(&self) -> Result<CoordinatorStatus, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.request(CoordinatorRequest::Status(reply)).await?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    /// Current snapshot.
    pub async fn snapshot(&self) -> Result<Snapshot, CoordinatorError> {
        Ok(self.status().await?.snapshot)
    }

    /// Whether the coordinator task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Owner of the session and the peer registry.
pub struct Coordinator {
    session: Session,
    peers: HashMap<ConnectionId, Arc<ClientConnection>>,
    rx: mpsc::Receiver<CoordinatorRequest>,
}

impl Coordinator {
    /// Create a coordinator for a fresh session and its handle.
    pub fn new(threshold: Threshold) -> (Self, CoordinatorHandle) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
        let coordinator = Self {
            session: Session::new(threshold),
            peers: HashMap::new(),
            rx,
        };
        (coordinator, CoordinatorHandle { tx })
    }

    /// Spawn the coordinator loop on the current runtime.
    pub fn spawn(
        threshold: Threshold,
        cancel: CancellationToken,
    ) -> (CoordinatorHandle, tokio::task::JoinHandle<()>) {
        let (coordinator, handle) = Self::new(threshold);
        let task = tokio::spawn(coordinator.run(cancel));
        (handle, task)
    }

    /// Process requests until cancelled or every handle is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(threshold = %self.session.threshold(), "launch coordinator started");
        gauge!(LAUNCH_CLICK_COUNT).set(0.0);
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                request = self.rx.recv() => match request {
                    Some(request) => self.handle(request),
                    None => break,
                },
            }
        }
        for peer in self.peers.values() {
            peer.close();
        }
        info!(peers = self.peers.len(), "launch coordinator stopped");
        self.peers.clear();
    }

    fn handle(&mut self, request: CoordinatorRequest) {
        match request {
            CoordinatorRequest::Connect(connection) => self.connect(connection),
            CoordinatorRequest::Disconnect(id) => {
                if self.peers.remove(&id).is_some() {
                    debug!(conn_id = %id, peers = self.peers.len(), "peer removed");
                }
            }
            CoordinatorRequest::Command { from, command } => self.apply(&from, command),
            CoordinatorRequest::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            snapshot: self.session.snapshot(),
            phase: self.session.phase(),
            threshold: self.session.threshold(),
            connections: self.peers.len(),
        }
    }

    fn connect(&mut self, connection: Arc<ClientConnection>) {
        let Some(frame) = self.snapshot_frame() else {
            connection.close();
            return;
        };
        if connection.send(frame) {
            debug!(conn_id = %connection.id, peers = self.peers.len() + 1, "peer registered");
            let _ = self.peers.insert(connection.id.clone(), connection);
        } else {
            warn!(conn_id = %connection.id, "could not deliver initial snapshot, closing");
            counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
            connection.close();
        }
    }

    fn apply(&mut self, from: &ConnectionId, command: Command) {
        let participant = match &command {
            Command::LaunchClick { user_id } => Some(user_id.as_str().to_owned()),
            Command::Reset { .. } | Command::RevealNow { .. } => None,
        };
        let name = command.name();
        let threshold = self.session.threshold().get();

        match self.session.apply(command) {
            Outcome::Unchanged => {
                debug!(conn_id = %from, command = name, "no state change");
                self.send_snapshot_to(from);
                return;
            }
            Outcome::Joined { click_count } => {
                counter!(LAUNCH_CLICKS_TOTAL).increment(1);
                info!(
                    conn_id = %from,
                    participant = participant.as_deref().unwrap_or_default(),
                    click_count,
                    threshold,
                    "launch click registered"
                );
            }
            Outcome::Launched { click_count } => {
                counter!(LAUNCH_CLICKS_TOTAL).increment(1);
                counter!(LAUNCHES_TOTAL).increment(1);
                info!(
                    conn_id = %from,
                    participant = participant.as_deref().unwrap_or_default(),
                    click_count,
                    threshold,
                    "launch threshold reached"
                );
            }
            Outcome::Reset => {
                counter!(RESETS_TOTAL).increment(1);
                info!(conn_id = %from, "session reset");
            }
            Outcome::RevealCompleted => {
                counter!(REVEALS_TOTAL).increment(1);
                info!(conn_id = %from, "reveal complete");
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let click_count = self.session.click_count() as f64;
        gauge!(LAUNCH_CLICK_COUNT).set(click_count);
        self.broadcast();
    }

    fn snapshot_frame(&self) -> Option<Arc<str>> {
        match self.session.snapshot().to_json() {
            Ok(json) => Some(Arc::from(json)),
            Err(e) => {
                error!(error = %e, "failed to serialize snapshot");
                None
            }
        }
    }

    fn send_snapshot_to(&mut self, id: &ConnectionId) {
        let Some(peer) = self.peers.get(id) else {
            return;
        };
        let Some(frame) = self.snapshot_frame() else {
            return;
        };
        if !peer.send(frame) {
            self.drop_peers(vec![id.clone()]);
        }
    }

    /// Send the current snapshot to every peer. Peers whose queue is full
    /// or closed are removed and closed.
    fn broadcast(&mut self) {
        let Some(frame) = self.snapshot_frame() else {
            return;
        };
        let failed: Vec<ConnectionId> = self
            .peers
            .values()
            .filter(|peer| !peer.send(Arc::clone(&frame)))
            .map(|peer| peer.id.clone())
            .collect();
        debug!(
            recipients = self.peers.len() - failed.len(),
            failed = failed.len(),
            "broadcast snapshot"
        );
        self.drop_peers(failed);
    }

    fn drop_peers(&mut self, ids: Vec<ConnectionId>) {
        for id in ids {
            if let Some(peer) = self.peers.remove(&id) {
                warn!(conn_id = %id, dropped = peer.drop_count(), "peer queue full or closed, dropping");
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                peer.close();
            }
        }
    }
}
