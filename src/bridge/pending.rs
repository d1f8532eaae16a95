//! Correlation table for in-flight interpreter calls

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::errors::{LspError, LspResult};

struct PendingCall {
    /// Interpreter process the request was written to
    generation: u64,
    reply: oneshot::Sender<LspResult<Value>>,
}

/// Maps correlation ids to the callers awaiting their replies.
#[derive(Default)]
pub struct PendingCalls {
    calls: DashMap<u64, PendingCall>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` for a request sent to interpreter `generation`.
    pub fn register(&self, id: u64, generation: u64) -> oneshot::Receiver<LspResult<Value>> {
        let (reply, rx) = oneshot::channel();
        self.calls.insert(id, PendingCall { generation, reply });
        rx
    }

    /// Routes a reply to its caller. Returns `false` when the id is unknown
    /// (already retired) or the caller went away.
    pub fn complete(&self, id: u64, outcome: LspResult<Value>) -> bool {
        match self.calls.remove(&id) {
            Some((_, call)) => call.reply.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Forgets `id`; a reply arriving later is discarded.
    pub fn retire(&self, id: u64) -> bool {
        self.calls.remove(&id).is_some()
    }

    /// Fails every call sent to `generation`, returning how many were failed.
    pub fn fail_generation(&self, generation: u64, error: impl Fn() -> LspError) -> usize {
        let ids: Vec<u64> = self
            .calls
            .iter()
            .filter(|entry| entry.value().generation == generation)
            .map(|entry| *entry.key())
            .collect();
        let mut failed = 0;
        for id in ids {
            if let Some((_, call)) = self.calls.remove(&id) {
                let _ = call.reply.send(Err(error()));
                failed += 1;
            }
        }
        failed
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
