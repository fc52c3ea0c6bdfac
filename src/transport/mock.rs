//! A scripted transport that replays canned reply frames.
//!
//! Used by the test suite in place of a live instrument. Replies are queued
//! per method name; the last frame queued for a method repeats forever, so a
//! convergence loop can read the same value back indefinitely. Every request
//! handed to the transport is appended to a shared journal for later
//! assertions.

use crate::error::{AppResult, CommError};
use crate::protocol::{Request, Response};
use crate::transport::Transport;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Shared record of every request a [`ScriptedTransport`] has seen.
pub type RequestJournal = Arc<Mutex<Vec<Request>>>;

/// Counts journal entries for one method name.
pub fn sent_count(journal: &RequestJournal, method: &str) -> usize {
    journal
        .lock()
        .map(|requests| requests.iter().filter(|r| r.method == method).count())
        .unwrap_or(0)
}

#[derive(Default)]
pub struct ScriptedTransport {
    scripts: HashMap<String, VecDeque<String>>,
    failures: HashSet<String>,
    journal: RequestJournal,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a raw reply frame for the given method.
    ///
    /// The frame is parsed through the same path as a live reply, so an
    /// invalid frame exercises the malformed-reply handling.
    pub fn reply(mut self, method: &str, frame: impl Into<String>) -> Self {
        self.scripts
            .entry(method.to_string())
            .or_default()
            .push_back(frame.into());
        self
    }

    /// Queues a well-formed result reply for the given method.
    pub fn reply_result(self, method: &str, result: Value) -> Self {
        let frame = serde_json::json!({ "jsonrpc": "2.0", "result": result });
        self.reply(method, frame.to_string())
    }

    /// Makes every call to the given method fail at the socket level.
    pub fn fail(mut self, method: &str) -> Self {
        self.failures.insert(method.to_string());
        self
    }

    /// Returns a handle onto the request journal.
    pub fn journal(&self) -> RequestJournal {
        Arc::clone(&self.journal)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn roundtrip(&mut self, request: &Request) -> AppResult<Response> {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(request.clone());
        }

        if self.failures.contains(&request.method) {
            return Err(CommError::TransportUnavailable(format!(
                "scripted failure for '{}'",
                request.method
            )));
        }

        let queue = self.scripts.get_mut(&request.method).ok_or_else(|| {
            CommError::TransportUnavailable(format!("no scripted reply for '{}'", request.method))
        })?;
        // The last queued frame repeats forever.
        let frame = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };

        serde_json::from_str(&frame)
            .map_err(|err| CommError::MalformedReply(format!("scripted frame: {err}")))
    }
}
