//! Per-assignment notification handle given to workers.

use std::fmt;
use std::sync::Weak;

use crate::request::FetchEvent;
use crate::worker::WorkerId;

use super::QueueShared;

/// Assignment generation of a worker. Events carrying a ticket other than
/// the worker's outstanding one are stale and get dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Ticket(pub(crate) u64);

/// Where a worker sends the notifications of its current assignment.
///
/// Each emit is relayed under the queue lock: it reaches the request only
/// while the assignment that issued this sink is still bound.
#[derive(Clone)]
pub struct EventSink {
    shared: Weak<QueueShared>,
    worker: WorkerId,
    ticket: Ticket,
}

impl EventSink {
    pub(crate) fn new(shared: Weak<QueueShared>, worker: WorkerId, ticket: Ticket) -> Self {
        Self {
            shared,
            worker,
            ticket,
        }
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Relays `event` to the dispatch queue. No-op once the queue is gone.
    pub fn emit(&self, event: FetchEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.relay(self.worker, self.ticket, event);
        }
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("worker", &self.worker)
            .field("ticket", &self.ticket.0)
            .finish()
    }
}
