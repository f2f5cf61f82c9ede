//! Pluggable logging.
//!
//! The runtime never logs through a global facade directly; it goes through
//! the [`Logger`] injected at construction so embedders can capture or
//! silence it. The default forwards to `tracing`.

use std::sync::Arc;

/// Minimal leveled logger consumed by the runtimes.
pub trait Logger: Send + Sync {
    fn debug(&self, msg: &str);
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
}

/// Default logger: forwards to the `tracing` macros under the
/// `kataribe` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, msg: &str) {
        tracing::debug!(target: "kataribe", "{msg}");
    }

    fn info(&self, msg: &str) {
        tracing::info!(target: "kataribe", "{msg}");
    }

    fn warn(&self, msg: &str) {
        tracing::warn!(target: "kataribe", "{msg}");
    }

    fn error(&self, msg: &str) {
        tracing::error!(target: "kataribe", "{msg}");
    }
}

/// Shared logger handle.
pub type SharedLogger = Arc<dyn Logger>;
