//! # liftoff-server
//!
//! Axum HTTP + WebSocket transport for the launch coordinator.
//!
//! A single [`coordinator::Coordinator`] task owns the session and the peer
//! registry; each WebSocket connection parses frames into commands, submits
//! them, and forwards the snapshots the coordinator fans out.

#![deny(unsafe_code)]

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod health;
pub mod limiter;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use coordinator::{CoordinatorHandle, CoordinatorStatus};
pub use errors::{CoordinatorError, ServerError};
pub use server::LaunchServer;
