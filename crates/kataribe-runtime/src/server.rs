//! Server runtime.
//!
//! One [`Server`] holds the contract, the `rpc_to_server` handlers, the
//! per-channel event handlers and the set of open connections. Each accepted
//! transport becomes a [`Connection`]: the same dispatcher as the client
//! with the directions swapped, plus a typed proxy for server-initiated
//! (`rpc_to_client`) calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use kataribe_core::error::{KataribeError, Result};

use crate::config::RuntimeOptions;
use crate::contract::Contract;
use crate::dispatch::{EventHandlers, EventSubscribers, RpcHandlers};
use crate::obs::StatsSnapshot;
use crate::peer::{PeerCore, Role};
use crate::transport::Transport;

struct ServerShared {
    contract: Arc<Contract>,
    handlers: RpcHandlers,
    events: EventHandlers,
    opts: RuntimeOptions,
    connections: DashMap<u64, Arc<Connection>>,
    next_conn: AtomicU64,
}

pub struct Server {
    shared: Arc<ServerShared>,
}

impl Server {
    /// Build a server runtime. `handlers` serve `rpc_to_server`; `events`
    /// maps each event channel to its single handler.
    pub fn new(
        contract: Arc<Contract>,
        handlers: RpcHandlers,
        events: EventHandlers,
        opts: RuntimeOptions,
    ) -> Result<Self> {
        opts.validate()?;
        Ok(Self {
            shared: Arc::new(ServerShared {
                contract,
                handlers,
                events,
                opts,
                connections: DashMap::new(),
                next_conn: AtomicU64::new(1),
            }),
        })
    }

    /// Adopt one open transport as a connection: send `hello`, spawn its
    /// reader, register it in the connection set.
    pub async fn accept(&self, transport: Arc<dyn Transport>) -> Result<Arc<Connection>> {
        let shared = &self.shared;
        let subscribers = EventSubscribers::new();
        for (channel, handler) in shared.events.iter() {
            let _ = subscribers.subscribe(channel.clone(), handler.clone());
        }
        let core = PeerCore::new(
            Role::Server,
            transport,
            shared.contract.clone(),
            shared.handlers.clone(),
            subscribers,
            shared.opts.clone(),
        );
        core.send_hello().await?;

        let id = shared.next_conn.fetch_add(1, Ordering::Relaxed);
        let conn = Arc::new(Connection {
            id,
            core: core.clone(),
            server: Arc::downgrade(shared),
        });
        shared.connections.insert(id, conn.clone());

        let reader = core.clone();
        let server = Arc::downgrade(shared);
        tokio::spawn(async move {
            reader.run_reader().await;
            if let Some(shared) = server.upgrade() {
                shared.connections.remove(&id);
            }
        });

        Ok(conn)
    }

    pub fn connection_count(&self) -> usize {
        self.shared.connections.len()
    }

    /// Close every connection and empty the set. Individual connection
    /// close is idempotent, so racing with per-connection closes is fine.
    pub async fn close(&self) {
        let conns: Vec<Arc<Connection>> = self
            .shared
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for conn in conns {
            conn.close().await;
        }
        self.shared.connections.clear();
    }
}

/// One accepted transport: dispatcher plus the server→client call proxy.
pub struct Connection {
    id: u64,
    core: Arc<PeerCore>,
    server: Weak<ServerShared>,
}

impl Connection {
    /// Typed RPC against a `rpc_to_client` endpoint.
    pub async fn call<Req, Resp>(&self, method: &str, request: Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_value(request)
            .map_err(|e| KataribeError::BadRequest(format!("request encode: {e}")))?;
        let value = self.core.call(method, payload).await?;
        serde_json::from_value(value)
            .map_err(|e| KataribeError::Validation(format!("response decode: {e}")))
    }

    /// Payload-opaque RPC.
    pub async fn call_value(&self, method: &str, payload: Value) -> Result<Value> {
        self.core.call(method, payload).await
    }

    /// Fire-and-forget event emit; failures are logged, not surfaced.
    pub fn emit<P: Serialize>(&self, channel: &str, payload: P) {
        match serde_json::to_value(payload) {
            Ok(value) => self.core.emit(channel, value),
            Err(e) => self
                .core
                .logger()
                .error(&format!("event payload encode failed on '{channel}': {e}")),
        }
    }

    /// Payload-opaque emit.
    pub fn emit_value(&self, channel: &str, payload: Value) {
        self.core.emit(channel, payload);
    }

    /// Capabilities from the peer's last `hello`.
    pub fn peer_features(&self) -> Option<Vec<String>> {
        self.core.peer_features()
    }

    /// Outstanding server-initiated RPCs on this connection.
    pub fn outstanding_calls(&self) -> usize {
        self.core.pending_len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats()
    }

    /// Close this connection's transport, fail its outstanding calls and
    /// drop it from the server's set. Idempotent.
    pub async fn close(&self) {
        self.core.close().await;
        if let Some(shared) = self.server.upgrade() {
            shared.connections.remove(&self.id);
        }
    }
}
