//! Contract registry.
//!
//! A contract declares every RPC endpoint and event channel a peer pair may
//! use, in both directions, with optional payload validation. Contracts are
//! built once at application boot and immutable afterwards; the runtimes
//! share them behind an `Arc`.
//!
//! Payloads are opaque `serde_json::Value`s end to end. A [`PayloadRule`]
//! can attach up to two validators: a *check* (arbitrary, possibly async
//! function) and a *schema* (serde-typed decode/re-encode). The check wins
//! when both are present; the schema is consulted only without one.

use std::collections::HashMap;
use std::future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use kataribe_core::error::{KataribeError, Result};

/// A payload validator: receives the raw payload, returns the validated
/// (possibly normalized) payload or a validation error.
pub type Validator = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Wrap a synchronous closure into a [`Validator`].
pub fn check<F>(f: F) -> Validator
where
    F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(move |value| future::ready(f(value)).boxed())
}

/// Serde-backed schema validator: decodes into `T` and re-encodes, so the
/// validated payload is normalized to exactly what `T` expresses.
fn schema_of<T>() -> Validator
where
    T: DeserializeOwned + Serialize + Send + 'static,
{
    Arc::new(|value| {
        let normalized = serde_json::from_value::<T>(value)
            .map_err(|e| KataribeError::Validation(e.to_string()))
            .and_then(|typed| {
                serde_json::to_value(typed).map_err(|e| KataribeError::Internal(e.to_string()))
            });
        future::ready(normalized).boxed()
    })
}

/// Up to two validators for one payload position.
#[derive(Clone, Default)]
pub struct PayloadRule {
    check: Option<Validator>,
    schema: Option<Validator>,
}

impl PayloadRule {
    /// Validate a payload. The check takes precedence; the schema runs only
    /// when no check is set; with neither, the payload passes through.
    pub async fn validate(&self, value: Value) -> Result<Value> {
        if let Some(check) = &self.check {
            return check(value).await;
        }
        if let Some(schema) = &self.schema {
            return schema(value).await;
        }
        Ok(value)
    }
}

/// One RPC endpoint: request and response payload rules.
///
/// The request/response types are phantom at this level; typed wrappers on
/// the runtimes recover them at the call site.
#[derive(Clone, Default)]
pub struct RpcDescriptor {
    request: PayloadRule,
    response: PayloadRule,
}

impl RpcDescriptor {
    /// Endpoint with fully opaque payloads.
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint whose request and response are schema-validated against
    /// `Req` / `Resp`.
    pub fn typed<Req, Resp>() -> Self
    where
        Req: DeserializeOwned + Serialize + Send + 'static,
        Resp: DeserializeOwned + Serialize + Send + 'static,
    {
        Self {
            request: PayloadRule {
                check: None,
                schema: Some(schema_of::<Req>()),
            },
            response: PayloadRule {
                check: None,
                schema: Some(schema_of::<Resp>()),
            },
        }
    }

    /// Attach a request check (takes precedence over the schema).
    pub fn with_request_check(mut self, v: Validator) -> Self {
        self.request.check = Some(v);
        self
    }

    /// Attach a response check (takes precedence over the schema).
    pub fn with_response_check(mut self, v: Validator) -> Self {
        self.response.check = Some(v);
        self
    }

    pub fn request(&self) -> &PayloadRule {
        &self.request
    }

    pub fn response(&self) -> &PayloadRule {
        &self.response
    }
}

/// One event channel: a single payload rule.
#[derive(Clone, Default)]
pub struct EventDescriptor {
    payload: PayloadRule,
}

impl EventDescriptor {
    /// Channel with an opaque payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel whose payload is schema-validated against `P`.
    pub fn typed<P>() -> Self
    where
        P: DeserializeOwned + Serialize + Send + 'static,
    {
        Self {
            payload: PayloadRule {
                check: None,
                schema: Some(schema_of::<P>()),
            },
        }
    }

    /// Attach a payload check (takes precedence over the schema).
    pub fn with_check(mut self, v: Validator) -> Self {
        self.payload.check = Some(v);
        self
    }

    pub fn payload(&self) -> &PayloadRule {
        &self.payload
    }
}

/// The full contract: RPC endpoints in both directions plus event channels.
#[derive(Clone, Default)]
pub struct Contract {
    rpc_to_server: HashMap<String, Arc<RpcDescriptor>>,
    rpc_to_client: HashMap<String, Arc<RpcDescriptor>>,
    events: HashMap<String, Arc<EventDescriptor>>,
}

impl Contract {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an RPC endpoint the client calls on the server.
    pub fn register_rpc_to_server(&mut self, name: impl Into<String>, desc: RpcDescriptor) {
        self.rpc_to_server.insert(name.into(), Arc::new(desc));
    }

    /// Declare an RPC endpoint the server calls on the client.
    pub fn register_rpc_to_client(&mut self, name: impl Into<String>, desc: RpcDescriptor) {
        self.rpc_to_client.insert(name.into(), Arc::new(desc));
    }

    /// Declare an event channel (either side may emit).
    pub fn register_event(&mut self, name: impl Into<String>, desc: EventDescriptor) {
        self.events.insert(name.into(), Arc::new(desc));
    }

    pub fn rpc_to_server(&self, name: &str) -> Option<&Arc<RpcDescriptor>> {
        self.rpc_to_server.get(name)
    }

    pub fn rpc_to_client(&self, name: &str) -> Option<&Arc<RpcDescriptor>> {
        self.rpc_to_client.get(name)
    }

    pub fn event(&self, name: &str) -> Option<&Arc<EventDescriptor>> {
        self.events.get(name)
    }
}
