//! Pending-call table.
//!
//! One table per runtime instance, keyed by correlation id. Each entry is a
//! one-shot completion for an outstanding outbound RPC plus an optional
//! timeout timer. Entries leave the table on response, error, timeout or
//! shutdown; settling an id that is unknown or already settled is a silent
//! no-op, so a late `rpc_res` after a timeout is simply dropped.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use kataribe_core::error::{KataribeError, Result};

/// Terminal outcome of an outbound RPC, as seen by the caller.
pub(crate) type CallResult = Result<Value>;

struct PendingEntry {
    tx: oneshot::Sender<CallResult>,
    timer: Option<JoinHandle<()>>,
}

/// Correlation table for outstanding outbound RPCs.
#[derive(Clone, Default)]
pub(crate) struct PendingCalls {
    entries: Arc<DashMap<String, PendingEntry>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry and arm its timeout (0 disables). Returns the receiver
    /// the caller awaits.
    pub fn register(
        &self,
        id: &str,
        method: &str,
        timeout_ms: u64,
    ) -> oneshot::Receiver<CallResult> {
        let (tx, rx) = oneshot::channel();
        let timer = (timeout_ms > 0).then(|| {
            let table = self.clone();
            let id = id.to_string();
            let method = method.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
                table.expire(&id, method);
            })
        });
        self.entries.insert(id.to_string(), PendingEntry { tx, timer });
        rx
    }

    /// Complete an entry and clear its timer. Returns false when the id is
    /// unknown or already settled.
    pub fn settle(&self, id: &str, result: CallResult) -> bool {
        let Some((_, entry)) = self.entries.remove(id) else {
            return false;
        };
        if let Some(timer) = entry.timer {
            timer.abort();
        }
        // a dropped receiver just means the caller went away
        let _ = entry.tx.send(result);
        true
    }

    /// Timer path: reject with a timeout error naming the method. Runs inside
    /// the timer task itself, so the handle is not aborted.
    fn expire(&self, id: &str, method: String) {
        if let Some((_, entry)) = self.entries.remove(id) {
            let _ = entry.tx.send(Err(KataribeError::Timeout(method)));
        }
    }

    /// Reject every outstanding entry and clear all timers. Called on
    /// shutdown; best-effort, never fails.
    pub fn abandon_all(&self, err: KataribeError) {
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, entry)) = self.entries.remove(&id) {
                if let Some(timer) = entry.timer {
                    timer.abort();
                }
                let _ = entry.tx.send(Err(err.clone()));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
