//! Core protocol engine of a SWIM-based cluster membership service,
//! augmented with the Lifeguard extensions (Local Health Multiplier and
//! Local Health Aware Suspicion).
//!
//! The engine is a deterministic, side-effect-free state machine: given
//! configuration, the local peer's identity, and a stream of external
//! events (tick, incoming ping, incoming ping-request, probe responses,
//! gossip payloads), it produces state transitions over its membership
//! table and a stream of [`Directive`]s describing what the surrounding
//! shell should do next. The engine never performs I/O, never reads the
//! wall clock directly, and never spawns concurrent tasks — see
//! [`ProtocolEngine`] for the entry point.

#[macro_use]
extern crate log;

mod config;
mod engine;
mod error;
mod gossip;
mod lifeguard;
mod member;
mod node;
mod probe;
mod status;
mod time;

pub use config::{Config, ConfigBuilder};
pub use engine::{Directive, PingResponse, ProbeOutcome, ProtocolEngine};
pub use error::ConfigError;
pub use gossip::{Gossip, GossipPayload};
pub use lifeguard::LhmEvent;
pub use member::{MarkDirective, Member};
pub use node::{Incarnation, Node};
pub use status::Status;
pub use time::{Clock, SystemClock};
