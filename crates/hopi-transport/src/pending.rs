//! Pending response table shared by the reader task and waiters
//!
//! Responses and waiters meet here in either order: a response that arrives
//! first is parked until someone asks for it, a waiter that arrives first is
//! parked on a `oneshot` until the reader delivers.

use crate::error::{ChannelError, Result};
use hopi_protocol::{RequestId, Response};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

type Waiter = oneshot::Sender<Result<Response>>;

#[derive(Default)]
struct Slots {
    arrived: HashMap<RequestId, Response>,
    waiters: HashMap<RequestId, Waiter>,
    closed: Option<String>,
}

/// Where a waiter stands after checking the table
#[derive(Debug)]
pub(crate) enum Claim {
    /// The response was already there
    Ready(Response),
    /// The response will be delivered on this receiver
    Wait(oneshot::Receiver<Result<Response>>),
}

/// Mapping of request id to response, with parked waiters
#[derive(Default)]
pub(crate) struct PendingTable {
    slots: Mutex<Slots>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a response from the reader
    pub(crate) fn insert(&self, response: Response) {
        let mut slots = self.lock();
        if let Some(waiter) = slots.waiters.remove(&response.id) {
            // a dropped receiver means the caller gave up; nothing to do
            let _ = waiter.send(Ok(response));
            return;
        }
        if slots.arrived.contains_key(&response.id) {
            tracing::warn!(id = %response.id, "duplicate response replaced an undelivered one");
        }
        slots.arrived.insert(response.id, response);
    }

    /// Take the response for `id`, or park until it arrives
    pub(crate) fn claim(&self, id: RequestId) -> Result<Claim> {
        let mut slots = self.lock();
        if let Some(response) = slots.arrived.remove(&id) {
            return Ok(Claim::Ready(response));
        }
        if let Some(reason) = &slots.closed {
            return Err(ChannelError::Closed(reason.clone()));
        }
        if slots.waiters.get(&id).is_some_and(|w| !w.is_closed()) {
            return Err(ChannelError::AlreadyAwaited(id));
        }

        let (tx, rx) = oneshot::channel();
        slots.waiters.insert(id, tx);
        Ok(Claim::Wait(rx))
    }

    /// Fail every parked waiter and refuse future ones
    ///
    /// Responses that already arrived stay claimable. Only the first reason is
    /// kept.
    pub(crate) fn close(&self, reason: impl Into<String>) {
        let mut slots = self.lock();
        let reason = slots.closed.get_or_insert_with(|| reason.into()).clone();
        let waiters: Vec<_> = slots.waiters.drain().collect();
        drop(slots);

        if !waiters.is_empty() {
            tracing::debug!(count = waiters.len(), %reason, "failing outstanding requests");
        }
        for (_, waiter) in waiters {
            let _ = waiter.send(Err(ChannelError::Closed(reason.clone())));
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed.is_some()
    }

    pub(crate) fn close_reason(&self) -> Option<String> {
        self.lock().closed.clone()
    }

    #[cfg(test)]
    fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }
}
