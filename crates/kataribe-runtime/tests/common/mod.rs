//! Shared helpers for the runtime integration tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use kataribe_core::error::Result;
use kataribe_core::{Envelope, Kind};
use kataribe_runtime::{Direction, Logger, Middleware, MiddlewareCtx};

/// Route default-logger output through `RUST_LOG` when debugging tests.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Logger that records every line per level.
#[derive(Default)]
pub struct RecordingLogger {
    pub lines: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, _)| *level == "error")
            .map(|(_, msg)| msg.clone())
            .collect()
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, msg: &str) {
        self.lines.lock().unwrap().push(("debug", msg.to_string()));
    }

    fn info(&self, msg: &str) {
        self.lines.lock().unwrap().push(("info", msg.to_string()));
    }

    fn warn(&self, msg: &str) {
        self.lines.lock().unwrap().push(("warn", msg.to_string()));
    }

    fn error(&self, msg: &str) {
        self.lines.lock().unwrap().push(("error", msg.to_string()));
    }
}

/// Middleware that records a clone of every envelope it sees.
#[derive(Default)]
pub struct Tap {
    pub seen: Mutex<Vec<(Direction, Envelope)>>,
}

impl Tap {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn outbound(&self, kind: Kind) -> Vec<Envelope> {
        self.filter(Direction::Out, kind)
    }

    pub fn inbound(&self, kind: Kind) -> Vec<Envelope> {
        self.filter(Direction::In, kind)
    }

    fn filter(&self, direction: Direction, kind: Kind) -> Vec<Envelope> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, env)| *d == direction && env.kind == kind)
            .map(|(_, env)| env.clone())
            .collect()
    }
}

#[async_trait]
impl Middleware for Tap {
    async fn apply(&self, ctx: &mut MiddlewareCtx<'_>) -> Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push((ctx.direction(), ctx.envelope().clone()));
        Ok(())
    }
}
