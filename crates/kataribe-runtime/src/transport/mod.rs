//! Transport abstraction.
//!
//! The runtime speaks to the outside world through [`Transport`]: a reliable,
//! ordered, message-framed link. WebSocket is the canonical adapter; WebRTC
//! data channels and WebTransport streams fit the same shape. Adapters live
//! outside this crate; the in-process [`duplex`] pair is provided for tests
//! and loopback wiring.

pub mod codec;
pub mod duplex;

use async_trait::async_trait;

use kataribe_core::error::Result;

/// One message frame as produced/consumed by a transport.
///
/// Textual transports yield `Text` (the runtime JSON-decodes it); structured
/// transports yield `Value` directly. The runtime always sends `Value` and
/// leaves wire encoding to the adapter.
#[derive(Debug, Clone)]
pub enum Frame {
    Text(String),
    Value(serde_json::Value),
}

/// Minimal contract every transport adapter supplies.
///
/// Guarantees expected from the underlying link: reliable, in-order,
/// message-framed delivery with no duplicates. `recv` returning `None`
/// signals the link has ended.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Forward one frame to the peer. May suspend for back-pressure.
    async fn send(&self, frame: Frame) -> Result<()>;

    /// Next received frame, or `None` once the link is gone.
    async fn recv(&self) -> Option<Frame>;

    /// Terminate the underlying link.
    async fn close(&self, code: Option<u16>, reason: Option<&str>);

    /// Whether the link is still usable for sending.
    fn is_open(&self) -> bool;
}
