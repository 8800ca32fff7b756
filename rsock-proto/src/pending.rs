//! Pending-request table.
//!
//! Maps outstanding stream ids to the completion that resolves them. The
//! table itself is not synchronised; the client keeps it behind the same
//! lock as the connection state so that id allocation, registration and
//! frame enqueueing form one step.

use crate::frame::MAX_STREAM_ID;
use futures::channel::oneshot;
use hashbrown::HashMap;
use rsock_core::payload::Payload;
use rsock_core::{Error, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::warn;

/// Client-initiated stream ids are odd.
const FIRST_STREAM_ID: u32 = 1;
const STREAM_ID_STEP: u32 = 2;

pub type ResponseCallback = Box<dyn FnOnce(Result<Payload>) + Send + 'static>;

/// How a request's outcome reaches its caller.
pub(crate) enum Completion {
    Future(oneshot::Sender<Result<Payload>>),
    Callback(ResponseCallback),
}

impl Completion {
    /// Deliver `result`. Consumes the completion, so it runs at most once.
    pub(crate) fn complete(self, result: Result<Payload>) {
        match self {
            // Receiver dropped: nobody is waiting any more.
            Self::Future(tx) => {
                let _ = tx.send(result);
            }
            Self::Callback(callback) => {
                if catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
                    warn!("[pending] response callback panicked");
                }
            }
        }
    }
}

pub(crate) struct PendingRequest {
    completion: Completion,
    created_at: Instant,
    deadline: Option<Instant>,
}

impl PendingRequest {
    pub(crate) fn complete(self, result: Result<Payload>) {
        self.completion.complete(result);
    }

    pub(crate) fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

pub(crate) struct PendingTable {
    next_id: u32,
    entries: HashMap<u32, PendingRequest>,
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self {
            next_id: FIRST_STREAM_ID,
            entries: HashMap::new(),
        }
    }

    #[cfg(test)]
    fn starting_at(next_id: u32) -> Self {
        Self {
            next_id,
            entries: HashMap::new(),
        }
    }

    /// Hand out the next stream id. Ids are never reused; once the 31-bit
    /// space is spent every call fails.
    pub(crate) fn allocate_id(&mut self) -> Result<u32> {
        let id = self.next_id;
        if id > MAX_STREAM_ID {
            return Err(Error::StreamIdsExhausted);
        }
        self.next_id = id.saturating_add(STREAM_ID_STEP);
        Ok(id)
    }

    /// Allocate an id and park `completion` under it.
    pub(crate) fn register(
        &mut self,
        completion: Completion,
        timeout: Option<Duration>,
    ) -> Result<u32> {
        let id = self.allocate_id()?;
        let created_at = Instant::now();
        self.entries.insert(
            id,
            PendingRequest {
                completion,
                created_at,
                deadline: timeout.map(|t| created_at + t),
            },
        );
        Ok(id)
    }

    /// Remove the entry for `id`, if it is still outstanding.
    pub(crate) fn take(&mut self, id: u32) -> Option<PendingRequest> {
        self.entries.remove(&id)
    }

    /// Remove every entry whose deadline is at or before `now`.
    pub(crate) fn expire(&mut self, now: Instant) -> Vec<(u32, PendingRequest)> {
        let expired: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, req)| req.deadline.is_some_and(|d| d <= now))
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|req| (id, req)))
            .collect()
    }

    /// Remove every entry.
    pub(crate) fn drain(&mut self) -> Vec<PendingRequest> {
        self.entries.drain().map(|(_, req)| req).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }
}
