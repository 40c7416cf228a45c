//! # liftoff-core
//!
//! The launch session state machine and the types that cross the wire.
//!
//! - [`session::Session`]: the single authoritative record of launch progress
//! - [`command::Command`]: the three peer commands, parsed from JSON frames
//! - [`session::Snapshot`]: the full state broadcast to every peer
//! - [`access::AccessPolicy`]: optional gating of `reset` / `reveal_now`
//!
//! Nothing in this crate performs I/O; the server crate owns the transport.

#![deny(unsafe_code)]

pub mod access;
pub mod command;
pub mod errors;
pub mod ids;
pub mod session;

pub use access::AccessPolicy;
pub use command::Command;
pub use errors::CommandError;
pub use ids::{ConnectionId, ParticipantId};
pub use session::{Outcome, Phase, Session, Snapshot, Threshold};
