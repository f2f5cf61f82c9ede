//! Kataribe runtime library.
//!
//! This crate assembles the bidirectional RPC + event runtime pair:
//! - Contract: declarative RPC endpoints and event channels with optional
//!   payload validators in both directions.
//! - Middleware: ordered pre-send / post-receive interception of envelopes.
//! - Pending table: correlation of outbound requests with inbound responses,
//!   timeout bookkeeping, shutdown draining.
//! - Transport: the minimal send/recv contract adapters satisfy, plus an
//!   in-process duplex pair.
//! - Client/Server runtimes: the symmetric dispatch state machines tying the
//!   above together (either side may initiate RPCs).
//!
//! The runtime is designed for panic-free operation: peer misbehavior and
//! handler failures surface as structured `KataribeError`s and `rpc_err`
//! envelopes instead of crashing the process.

pub mod client;
pub mod config;
pub mod contract;
pub mod dispatch;
pub mod log;
pub mod middleware;
pub mod obs;
pub mod server;
pub mod transport;

mod peer;
mod pending;

pub use client::Client;
pub use config::{IdGenerator, RuntimeOptions, UnknownEnvelopeHook, UuidIds};
pub use contract::{check, Contract, EventDescriptor, PayloadRule, RpcDescriptor, Validator};
pub use dispatch::{
    event_handler, rpc_service, EventHandler, EventHandlers, RpcHandlers, RpcService,
    Subscription,
};
pub use log::{Logger, SharedLogger, TracingLogger};
pub use middleware::{Direction, Middleware, MiddlewareCtx};
pub use obs::StatsSnapshot;
pub use server::{Connection, Server};
pub use transport::{duplex::duplex_pair, Frame, Transport};
