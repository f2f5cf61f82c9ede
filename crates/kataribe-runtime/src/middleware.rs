//! Envelope middleware.
//!
//! Middleware intercept every envelope in both directions, sequentially in
//! registration order, each one awaited before the next. They may mutate the
//! envelope through [`MiddlewareCtx::mutate`] but never replace or
//! short-circuit it. An error on the outbound path fails the send; on the
//! inbound path it is logged and the envelope discarded before any handler
//! runs.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use kataribe_core::error::Result;
use kataribe_core::Envelope;

/// Which way the envelope is traveling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// About to be handed to the transport.
    Out,
    /// Just received from the transport.
    In,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Out => write!(f, "out"),
            Direction::In => write!(f, "in"),
        }
    }
}

/// Per-invocation view handed to a middleware.
pub struct MiddlewareCtx<'a> {
    direction: Direction,
    envelope: &'a mut Envelope,
}

impl<'a> MiddlewareCtx<'a> {
    pub(crate) fn new(direction: Direction, envelope: &'a mut Envelope) -> Self {
        Self {
            direction,
            envelope,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Read access to the envelope.
    pub fn envelope(&self) -> &Envelope {
        self.envelope
    }

    /// Mutate the envelope through a short-lived exclusive borrow.
    ///
    /// All mutations go through here rather than a raw `&mut` so future
    /// versions can interpose (copy-on-write, audit hooks) without breaking
    /// middleware.
    pub fn mutate(&mut self, f: impl FnOnce(&mut Envelope)) {
        f(self.envelope);
    }
}

/// A user-supplied interceptor of envelopes traveling in either direction.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn apply(&self, ctx: &mut MiddlewareCtx<'_>) -> Result<()>;
}

/// Run the whole chain over one envelope. The envelope passes through every
/// middleware before the next dispatch stage sees it.
pub(crate) async fn run_chain(
    chain: &[Arc<dyn Middleware>],
    direction: Direction,
    envelope: &mut Envelope,
) -> Result<()> {
    for mw in chain {
        let mut ctx = MiddlewareCtx::new(direction, envelope);
        mw.apply(&mut ctx).await?;
    }
    Ok(())
}
