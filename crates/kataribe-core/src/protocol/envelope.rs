//! Wire envelope (JSON).
//!
//! The envelope is the single structural type exchanged between peers. The
//! core never inspects `p`; payloads stay opaque `serde_json::Value`s until a
//! contract validator specializes them. Unknown top-level fields are kept on
//! `extra` so middleware can read them.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Envelope discriminant.
///
/// On the wire every kind is a bare snake_case string. Unrecognized strings
/// deserialize into [`Kind::Other`] so they can be routed to the
/// unknown-envelope hook instead of failing the parse; serde's derived
/// representations cannot express that catch-all, so the impls are written
/// by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    RpcReq,
    RpcRes,
    RpcErr,
    Event,
    Hello,
    Other(String),
}

impl Kind {
    /// The wire string for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Kind::RpcReq => "rpc_req",
            Kind::RpcRes => "rpc_res",
            Kind::RpcErr => "rpc_err",
            Kind::Event => "event",
            Kind::Hello => "hello",
            Kind::Other(s) => s,
        }
    }

    fn from_string(s: String) -> Self {
        match s.as_str() {
            "rpc_req" => Kind::RpcReq,
            "rpc_res" => Kind::RpcRes,
            "rpc_err" => Kind::RpcErr,
            "event" => Kind::Event,
            "hello" => Kind::Hello,
            _ => Kind::Other(s),
        }
    }
}

impl Serialize for Kind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Kind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Kind::from_string(String::deserialize(deserializer)?))
    }
}

/// The unit of wire exchange.
///
/// `rpc_res`/`rpc_err` carry the `id` of the `rpc_req` they answer; `event`
/// and `rpc_req` carry a `ch`; `hello` carries neither. Envelopes are
/// single-use and never mutated after they leave the middleware chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version.
    pub v: u32,
    /// Sender wall-clock time, milliseconds since Unix epoch.
    pub ts: u64,
    /// Discriminant.
    pub kind: Kind,
    /// Correlation id (rpc_req / rpc_res / rpc_err).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Channel: method name for RPC, event name for events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ch: Option<String>,
    /// Opaque payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<Value>,
    /// Human-readable message (typically on rpc_err).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<String>,
    /// Machine-readable error code on rpc_err.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Cross-cutting metadata added by middleware.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
    /// Advertised capabilities (hello).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feat: Option<Vec<String>>,
    /// Unknown fields, preserved for middleware.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    /// Minimal envelope: `v`, `ts` and `kind` populated, everything else
    /// assigned by the caller.
    pub fn new(kind: Kind, version: u32) -> Self {
        Self {
            v: version,
            ts: now_ms(),
            kind,
            id: None,
            ch: None,
            p: None,
            m: None,
            code: None,
            meta: None,
            feat: None,
            extra: Map::new(),
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn minimal_envelope_has_only_kind_fields() {
        let env = Envelope::new(Kind::Hello, 1);
        let json = serde_json::to_value(&env).expect("serialize");
        let obj = json.as_object().expect("object");
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["v"], 1);
        assert_eq!(obj["kind"], "hello");
        assert!(obj["ts"].is_u64());
    }

    #[test]
    fn kind_round_trips_snake_case() {
        for (kind, s) in [
            (Kind::RpcReq, "\"rpc_req\""),
            (Kind::RpcRes, "\"rpc_res\""),
            (Kind::RpcErr, "\"rpc_err\""),
            (Kind::Event, "\"event\""),
            (Kind::Hello, "\"hello\""),
        ] {
            assert_eq!(serde_json::to_string(&kind).expect("ser"), s);
            let back: Kind = serde_json::from_str(s).expect("de");
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn unknown_kind_is_preserved() {
        let k: Kind = serde_json::from_str("\"probe\"").expect("de");
        assert_eq!(k, Kind::Other("probe".into()));
        // and goes back out as the bare string, not a tagged variant
        assert_eq!(serde_json::to_string(&k).expect("ser"), "\"probe\"");
    }

    #[test]
    fn ts_is_not_in_the_future() {
        let env = Envelope::new(Kind::Event, 1);
        assert!(env.ts <= now_ms());
    }
}
