//! Client runtime.
//!
//! Calls `rpc_to_server` endpoints, serves `rpc_to_client` requests, emits
//! and subscribes to events. Construction sends the initial `hello` and
//! spawns the reader task that serializes inbound dispatch.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use kataribe_core::error::{KataribeError, Result};

use crate::config::RuntimeOptions;
use crate::contract::Contract;
use crate::dispatch::{EventHandler, EventSubscribers, RpcHandlers, Subscription};
use crate::obs::StatsSnapshot;
use crate::peer::{PeerCore, Role};
use crate::transport::Transport;

pub struct Client {
    core: Arc<PeerCore>,
}

impl Client {
    /// Attach a client runtime to an open transport.
    ///
    /// `handlers` serve the contract's `rpc_to_client` endpoints. The
    /// `hello` goes out immediately; the peer's is observed but never
    /// awaited.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        contract: Arc<Contract>,
        handlers: RpcHandlers,
        opts: RuntimeOptions,
    ) -> Result<Self> {
        opts.validate()?;
        let core = PeerCore::new(
            Role::Client,
            transport,
            contract,
            handlers,
            EventSubscribers::new(),
            opts,
        );
        core.send_hello().await?;
        let reader = core.clone();
        tokio::spawn(async move { reader.run_reader().await });
        Ok(Self { core })
    }

    /// Typed RPC against a `rpc_to_server` endpoint.
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

    /// Subscribe a handler to an event channel.
    ///
    /// Subscribers on one channel run sequentially in registration order; a
    /// failing handler does not stop the rest. Returns a disposer.
    pub fn subscribe(
        &self,
        channel: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Subscription {
        self.core.subscribers().subscribe(channel, handler)
    }

    /// Capabilities from the peer's last `hello`.
    pub fn peer_features(&self) -> Option<Vec<String>> {
        self.core.peer_features()
    }

    /// Outstanding outbound RPCs.
    pub fn outstanding_calls(&self) -> usize {
        self.core.pending_len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats()
    }

    /// Close the transport and reject everything outstanding. Idempotent.
    pub async fn close(&self) {
        self.core.close().await;
    }
}
