//! Shared peer state machine.
//!
//! Client and server runtimes are the same dispatcher with the two contract
//! directions swapped; [`PeerCore`] is that dispatcher. It owns the pending
//! table and middleware chain, shares the transport, and serializes inbound
//! dispatch: the reader task awaits the full middleware + handler chain per
//! envelope, so envelopes from one transport are processed in receipt order.
//! Outbound calls run on the caller's task and do not block inbound dispatch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use kataribe_core::error::{KataribeError, Result};
use kataribe_core::{Envelope, Kind};

use crate::config::RuntimeOptions;
use crate::contract::{Contract, RpcDescriptor};
use crate::dispatch::{EventSubscribers, RpcHandlers};
use crate::middleware::{run_chain, Direction};
use crate::obs::{RuntimeStats, StatsSnapshot};
use crate::pending::PendingCalls;
use crate::transport::{codec, Frame, Transport};

/// Which contract direction this peer calls, and which it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Client,
    Server,
}

pub(crate) struct PeerCore {
    role: Role,
    transport: Arc<dyn Transport>,
    contract: Arc<Contract>,
    handlers: RpcHandlers,
    subscribers: EventSubscribers,
    pending: PendingCalls,
    opts: RuntimeOptions,
    stats: Arc<RuntimeStats>,
    peer_feat: Mutex<Option<Vec<String>>>,
    closed: AtomicBool,
}

impl PeerCore {
    pub fn new(
        role: Role,
        transport: Arc<dyn Transport>,
        contract: Arc<Contract>,
        handlers: RpcHandlers,
        subscribers: EventSubscribers,
        opts: RuntimeOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            role,
            transport,
            contract,
            handlers,
            subscribers,
            pending: PendingCalls::new(),
            opts,
            stats: Arc::new(RuntimeStats::new()),
            peer_feat: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    fn call_descriptor(&self, method: &str) -> Option<Arc<RpcDescriptor>> {
        match self.role {
            Role::Client => self.contract.rpc_to_server(method).cloned(),
            Role::Server => self.contract.rpc_to_client(method).cloned(),
        }
    }

    fn serve_descriptor(&self, method: &str) -> Option<Arc<RpcDescriptor>> {
        match self.role {
            Role::Client => self.contract.rpc_to_client(method).cloned(),
            Role::Server => self.contract.rpc_to_server(method).cloned(),
        }
    }

    pub fn subscribers(&self) -> &EventSubscribers {
        &self.subscribers
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn logger(&self) -> &crate::log::SharedLogger {
        &self.opts.logger
    }

    /// Capabilities the peer advertised in its last `hello`, if any.
    pub fn peer_features(&self) -> Option<Vec<String>> {
        self.peer_feat.lock().ok().and_then(|guard| guard.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Advertise our capabilities. Sent once on construction; receipt on the
    /// other side is logged, never gated on.
    pub async fn send_hello(&self) -> Result<()> {
        let mut env = Envelope::new(Kind::Hello, self.opts.version);
        if !self.opts.features.is_empty() {
            env.feat = Some(self.opts.features.clone());
        }
        self.send_envelope(env).await
    }

    /// Outbound middleware chain, then the transport. Envelopes are
    /// single-use; nothing touches them after this.
    async fn send_envelope(&self, mut env: Envelope) -> Result<()> {
        run_chain(&self.opts.middlewares, Direction::Out, &mut env).await?;
        let frame = codec::encode(&env)?;
        self.transport.send(frame).await?;
        RuntimeStats::inc(&self.stats.envelopes_out);
        Ok(())
    }

    /// Full outbound RPC: register, validate, send, await the settle, then
    /// response validation before the value reaches the application.
    pub async fn call(&self, method: &str, payload: Value) -> Result<Value> {
        if self.is_closed() {
            return Err(KataribeError::Closed);
        }
        let desc = self
            .call_descriptor(method)
            .ok_or_else(|| KataribeError::MethodNotFound(method.to_string()))?;

        RuntimeStats::inc(&self.stats.rpc_calls);
        let id = self.opts.id_gen.next_id();
        let rx = self.pending.register(&id, method, self.opts.timeout_ms);

        let request_leg: Result<()> = async {
            let validated = desc.request().validate(payload).await?;
            let mut env = Envelope::new(Kind::RpcReq, self.opts.version);
            env.id = Some(id.clone());
            env.ch = Some(method.to_string());
            env.p = Some(validated);
            self.send_envelope(env).await
        }
        .await;
        if let Err(e) = request_leg {
            if matches!(e, KataribeError::Validation(_)) {
                RuntimeStats::inc(&self.stats.validation_failures);
            }
            self.pending.settle(&id, Err(e));
        }

        let settled = rx.await.map_err(|_| KataribeError::Closed)?;
        let value = match settled {
            Ok(v) => v,
            Err(e) => {
                if matches!(e, KataribeError::Timeout(_)) {
                    RuntimeStats::inc(&self.stats.rpc_timeouts);
                }
                return Err(e);
            }
        };
        desc.response().validate(value).await.map_err(|e| {
            RuntimeStats::inc(&self.stats.validation_failures);
            e
        })
    }

    /// Validate-and-send one event envelope. Public emit wrappers run this
    /// on a detached task and log failures.
    pub async fn emit_now(&self, channel: &str, payload: Value) -> Result<()> {
        if self.is_closed() {
            return Err(KataribeError::Closed);
        }
        let validated = match self.contract.event(channel) {
            Some(desc) => desc.payload().validate(payload).await.map_err(|e| {
                RuntimeStats::inc(&self.stats.validation_failures);
                e
            })?,
            None => payload,
        };
        let mut env = Envelope::new(Kind::Event, self.opts.version);
        env.ch = Some(channel.to_string());
        env.p = Some(validated);
        self.send_envelope(env).await
    }

    /// Fire-and-forget emit: the validate → middleware → send flow runs on a
    /// detached task; failures are logged, never surfaced to the caller.
    pub fn emit(self: &Arc<Self>, channel: &str, payload: Value) {
        let core = self.clone();
        let channel = channel.to_string();
        tokio::spawn(async move {
            if let Err(e) = core.emit_now(&channel, payload).await {
                core.opts
                    .logger
                    .error(&format!("event emit failed on '{channel}': {e}"));
            }
        });
    }

    /// Pump the transport until it ends, dispatching frames in receipt
    /// order. When the link goes away, everything still pending fails.
    pub async fn run_reader(&self) {
        while let Some(frame) = self.transport.recv().await {
            if self.is_closed() {
                break;
            }
            self.dispatch_frame(frame).await;
        }
        self.pending.abandon_all(KataribeError::Closed);
    }

    /// Inbound dispatch: decode, inbound middleware, then route by kind.
    pub async fn dispatch_frame(&self, frame: Frame) {
        let mut env = match codec::decode(frame) {
            Ok(env) => env,
            Err(e) => {
                RuntimeStats::inc(&self.stats.frames_dropped);
                self.opts.logger.debug(&format!("undecodable frame dropped: {e}"));
                return;
            }
        };
        RuntimeStats::inc(&self.stats.envelopes_in);

        if let Err(e) = run_chain(&self.opts.middlewares, Direction::In, &mut env).await {
            RuntimeStats::inc(&self.stats.frames_dropped);
            self.opts
                .logger
                .error(&format!("inbound middleware failed, envelope dropped: {e}"));
            return;
        }

        match env.kind {
            Kind::RpcReq => self.handle_request(env).await,
            Kind::RpcRes => {
                let Some(id) = env.id.as_deref() else {
                    RuntimeStats::inc(&self.stats.frames_dropped);
                    self.opts.logger.debug("rpc_res without id dropped");
                    return;
                };
                let payload = env.p.clone().unwrap_or(Value::Null);
                if !self.pending.settle(id, Ok(payload)) {
                    self.opts
                        .logger
                        .debug(&format!("late or unknown rpc_res dropped (id={id})"));
                }
            }
            Kind::RpcErr => {
                let Some(id) = env.id.as_deref() else {
                    RuntimeStats::inc(&self.stats.frames_dropped);
                    self.opts.logger.debug("rpc_err without id dropped");
                    return;
                };
                let err = KataribeError::Remote {
                    code: env.code.clone(),
                    message: env.m.clone().unwrap_or_else(|| "remote error".into()),
                };
                if !self.pending.settle(id, Err(err)) {
                    self.opts
                        .logger
                        .debug(&format!("late or unknown rpc_err dropped (id={id})"));
                }
            }
            Kind::Event => self.handle_event(env).await,
            Kind::Hello => {
                if let Ok(mut guard) = self.peer_feat.lock() {
                    *guard = env.feat.clone();
                }
                self.opts
                    .logger
                    .debug(&format!("peer hello (v={}, feat={:?})", env.v, env.feat));
            }
            Kind::Other(ref kind) => {
                if let Some(hook) = &self.opts.on_unknown_envelope {
                    hook(&env);
                } else {
                    self.opts
                        .logger
                        .debug(&format!("unknown envelope kind '{kind}' dropped"));
                }
            }
        }
    }

    /// Inbound `rpc_req`: validate, run the handler, validate its response,
    /// answer with `rpc_res`. Any failure answers with `rpc_err` echoing the
    /// incoming id.
    async fn handle_request(&self, env: Envelope) {
        let Some(id) = env.id.clone() else {
            RuntimeStats::inc(&self.stats.frames_dropped);
            self.opts.logger.debug("rpc_req without id dropped");
            return;
        };
        let Some(method) = env.ch.clone() else {
            self.reply_err(&id, None, &KataribeError::BadRequest("rpc_req missing ch".into()))
                .await;
            return;
        };

        let outcome: Result<Value> = async {
            let desc = self
                .serve_descriptor(&method)
                .ok_or_else(|| KataribeError::MethodNotFound(method.clone()))?;
            let handler = self
                .handlers
                .get(&method)
                .ok_or_else(|| KataribeError::MethodNotFound(method.clone()))?;
            let request = desc.request().validate(env.p.unwrap_or(Value::Null)).await?;
            let response = handler.call(request).await?;
            desc.response().validate(response).await
        }
        .await;

        match outcome {
            Ok(value) => {
                let mut res = Envelope::new(Kind::RpcRes, self.opts.version);
                res.id = Some(id);
                res.ch = Some(method.clone());
                res.p = Some(value);
                if let Err(e) = self.send_envelope(res).await {
                    self.opts
                        .logger
                        .error(&format!("rpc_res delivery failed for '{method}': {e}"));
                }
            }
            Err(e) => {
                if matches!(e, KataribeError::Validation(_)) {
                    RuntimeStats::inc(&self.stats.validation_failures);
                }
                self.reply_err(&id, Some(&method), &e).await;
            }
        }
    }

    /// Answer a request with `rpc_err`. A middleware refusing the error
    /// envelope drops it; that is logged and nothing is retried.
    async fn reply_err(&self, id: &str, method: Option<&str>, err: &KataribeError) {
        let mut env = Envelope::new(Kind::RpcErr, self.opts.version);
        env.id = Some(id.to_string());
        env.ch = method.map(str::to_string);
        env.m = Some(err.to_string());
        env.code = Some(err.wire_code().as_str().to_string());
        if let Err(e) = self.send_envelope(env).await {
            self.opts.logger.warn(&format!("rpc_err delivery failed: {e}"));
        }
    }

    /// Inbound event: no subscriber → silent drop; validation failure →
    /// logged, handlers suppressed; handler errors → logged, the remaining
    /// subscribers still run, serially, in registration order.
    async fn handle_event(&self, env: Envelope) {
        let Some(channel) = env.ch.clone() else {
            self.opts.logger.debug("event without ch dropped");
            return;
        };
        let handlers = self.subscribers.handlers_for(&channel);
        if handlers.is_empty() {
            self.opts
                .logger
                .debug(&format!("event '{channel}' has no subscriber, dropped"));
            return;
        }
        let raw = env.p.unwrap_or(Value::Null);
        let payload = match self.contract.event(&channel) {
            Some(desc) => match desc.payload().validate(raw).await {
                Ok(p) => p,
                Err(e) => {
                    RuntimeStats::inc(&self.stats.validation_failures);
                    self.opts
                        .logger
                        .error(&format!("event '{channel}' failed validation: {e}"));
                    return;
                }
            },
            None => raw,
        };
        for handler in handlers {
            if let Err(e) = handler.on_event(payload.clone()).await {
                self.opts
                    .logger
                    .error(&format!("event handler failed on '{channel}': {e}"));
            }
        }
    }

    /// Close the transport, then fail everything outstanding. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.transport.close(None, None).await;
        self.pending.abandon_all(KataribeError::Closed);
    }
}
