//! Handler registry types.
//!
//! RPC endpoints and event channels are served by boxed async handlers keyed
//! by channel name. Typed closures are adapted into the payload-opaque
//! traits via [`rpc_service`] / [`event_handler`]; payloads cross the
//! boundary as `serde_json::Value` (the contract validators have already run
//! by the time a handler sees one).

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use kataribe_core::error::{KataribeError, Result};

/// Serves one inbound RPC endpoint.
#[async_trait]
pub trait RpcService: Send + Sync {
    async fn call(&self, payload: Value) -> Result<Value>;
}

/// Handles one inbound event envelope. Errors are logged, never propagated.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_event(&self, payload: Value) -> Result<()>;
}

struct FnRpcService<F, Req, Resp> {
    f: F,
    _marker: PhantomData<fn(Req) -> Resp>,
}

#[async_trait]
impl<F, Fut, Req, Resp> RpcService for FnRpcService<F, Req, Resp>
where
    F: Fn(Req) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Resp>> + Send,
    Req: DeserializeOwned + Send,
    Resp: Serialize + Send,
{
    async fn call(&self, payload: Value) -> Result<Value> {
        let req: Req = serde_json::from_value(payload)
            .map_err(|e| KataribeError::Handler(format!("request decode: {e}")))?;
        let resp = (self.f)(req).await?;
        serde_json::to_value(resp).map_err(|e| KataribeError::Handler(format!("response encode: {e}")))
    }
}

/// Adapt a typed async closure into an [`RpcService`].
pub fn rpc_service<F, Fut, Req, Resp>(f: F) -> Arc<dyn RpcService>
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp>> + Send + 'static,
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
{
    Arc::new(FnRpcService {
        f,
        _marker: PhantomData,
    })
}

struct FnEventHandler<F, P> {
    f: F,
    _marker: PhantomData<fn(P)>,
}

#[async_trait]
impl<F, Fut, P> EventHandler for FnEventHandler<F, P>
where
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
    P: DeserializeOwned + Send,
{
    async fn on_event(&self, payload: Value) -> Result<()> {
        let p: P = serde_json::from_value(payload)
            .map_err(|e| KataribeError::Handler(format!("event decode: {e}")))?;
        (self.f)(p).await
    }
}

/// Adapt a typed async closure into an [`EventHandler`].
pub fn event_handler<F, Fut, P>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
    P: DeserializeOwned + Send + 'static,
{
    Arc::new(FnEventHandler {
        f,
        _marker: PhantomData,
    })
}

/// RPC handler map, frozen at runtime construction.
#[derive(Default, Clone)]
pub struct RpcHandlers {
    map: HashMap<String, Arc<dyn RpcService>>,
}

impl RpcHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, service: Arc<dyn RpcService>) {
        self.map.insert(name.into(), service);
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<dyn RpcService>> {
        self.map.get(name).cloned()
    }
}

/// Event handler map supplied to the server at construction (one handler per
/// channel).
#[derive(Default, Clone)]
pub struct EventHandlers {
    map: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.map.insert(channel.into(), handler);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn EventHandler>)> {
        self.map.iter()
    }
}

struct SubscriberSlots {
    seq: AtomicU64,
    channels: DashMap<String, Vec<(u64, Arc<dyn EventHandler>)>>,
}

/// Disposer returned by `subscribe`. Dropping the handle keeps the
/// subscription alive; call [`Subscription::dispose`] to remove it.
pub struct Subscription {
    channel: String,
    token: u64,
    slots: Weak<SubscriberSlots>,
}

impl Subscription {
    pub fn dispose(self) {
        if let Some(slots) = self.slots.upgrade() {
            if let Some(mut entry) = slots.channels.get_mut(&self.channel) {
                entry.retain(|(token, _)| *token != self.token);
            }
        }
    }
}

/// Per-runtime registry of event subscribers.
///
/// Subscribers on one channel are invoked sequentially in registration
/// order; disposal prevents future invocations.
#[derive(Clone)]
pub(crate) struct EventSubscribers {
    slots: Arc<SubscriberSlots>,
}

impl EventSubscribers {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(SubscriberSlots {
                seq: AtomicU64::new(1),
                channels: DashMap::new(),
            }),
        }
    }

    pub fn subscribe(
        &self,
        channel: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Subscription {
        let channel = channel.into();
        let token = self.slots.seq.fetch_add(1, Ordering::Relaxed);
        self.slots
            .channels
            .entry(channel.clone())
            .or_default()
            .push((token, handler));
        Subscription {
            channel,
            token,
            slots: Arc::downgrade(&self.slots),
        }
    }

    /// Snapshot of a channel's handlers in registration order.
    pub fn handlers_for(&self, channel: &str) -> Vec<Arc<dyn EventHandler>> {
        self.slots
            .channels
            .get(channel)
            .map(|entry| entry.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Echo {
        text: String,
    }

    #[tokio::test]
    async fn typed_service_decodes_and_encodes() {
        let svc = rpc_service(|req: Echo| async move { Ok(json!({ "echo": req.text })) });
        let out = svc.call(json!({ "text": "hi" })).await.expect("ok");
        assert_eq!(out, json!({ "echo": "hi" }));
    }

    #[tokio::test]
    async fn typed_service_reports_decode_mismatch() {
        let svc = rpc_service(|req: Echo| async move { Ok(req.text) });
        let err = svc.call(json!(42)).await.expect_err("wrong shape");
        assert_eq!(err.wire_code().as_str(), "HANDLER");
    }

    #[tokio::test]
    async fn dispose_removes_only_the_disposed_subscriber() {
        let subs = EventSubscribers::new();
        let first = subs.subscribe("tick", event_handler(|_: Value| async { Ok(()) }));
        let _second = subs.subscribe("tick", event_handler(|_: Value| async { Ok(()) }));
        assert_eq!(subs.handlers_for("tick").len(), 2);
        first.dispose();
        assert_eq!(subs.handlers_for("tick").len(), 1);
        assert!(subs.handlers_for("other").is_empty());
    }
}
