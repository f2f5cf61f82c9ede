//! Runtime options (programmatic configuration).

use std::sync::Arc;

use kataribe_core::error::{KataribeError, Result};
use kataribe_core::Envelope;

use crate::log::{SharedLogger, TracingLogger};
use crate::middleware::Middleware;

/// Correlation-id source for outbound RPC requests.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Default id generator: random UUID v4.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Hook invoked for envelopes with an unrecognized `kind`.
pub type UnknownEnvelopeHook = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Options accepted by both runtimes.
///
/// Plain struct: set the fields you care about and leave the rest to
/// `..Default::default()`.
#[derive(Clone)]
pub struct RuntimeOptions {
    /// Protocol version stamped on all outbound envelopes.
    pub version: u32,
    /// Per-RPC timeout in milliseconds; 0 disables.
    pub timeout_ms: u64,
    /// Capability strings advertised in the initial `hello`.
    pub features: Vec<String>,
    /// Ordered middleware chain; applied to every envelope in both
    /// directions.
    pub middlewares: Vec<Arc<dyn Middleware>>,
    /// Correlation-id generator.
    pub id_gen: Arc<dyn IdGenerator>,
    /// Logger for contained errors and protocol chatter.
    pub logger: SharedLogger,
    /// Called for envelopes whose `kind` the runtime does not recognize.
    pub on_unknown_envelope: Option<UnknownEnvelopeHook>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            version: default_version(),
            timeout_ms: 0,
            features: Vec::new(),
            middlewares: Vec::new(),
            id_gen: Arc::new(UuidIds),
            logger: Arc::new(TracingLogger),
            on_unknown_envelope: None,
        }
    }
}

impl RuntimeOptions {
    /// Reject option combinations the protocol cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 {
            return Err(KataribeError::BadRequest(
                "version must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_version() -> u32 {
    1
}
