//! Lock-protected state machine of the dispatch queue.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};

use crate::request::{Descriptor, FetchEvent, RequestId};
use crate::worker::{FetchWorker, WorkerId};

use super::sink::{EventSink, Ticket};
use super::{QueueShared, QueueSnapshot};

/// Live binding between a busy worker and its request.
struct Assignment {
    request: Arc<Descriptor>,
    terminal_seen: bool,
}

pub(super) struct DispatchState {
    workers: Vec<Box<dyn FetchWorker>>,
    /// Requests not yet assigned, oldest first.
    pending: VecDeque<Arc<Descriptor>>,
    /// Membership mirror of `pending`.
    pending_set: HashSet<RequestId>,
    idle: Vec<WorkerId>,
    /// Busy worker -> its request. Removing an entry tears down the forwarding.
    assignment: HashMap<WorkerId, Assignment>,
    /// Reverse index of `assignment`.
    by_request: HashMap<RequestId, WorkerId>,
    /// Ticket of every busy worker, including canceled ones still unwinding.
    outstanding: HashMap<WorkerId, Ticket>,
    next_ticket: u64,
}

impl DispatchState {
    pub(super) fn new(workers: Vec<Box<dyn FetchWorker>>) -> Self {
        let idle = (0..workers.len()).rev().map(WorkerId).collect();
        Self {
            workers,
            pending: VecDeque::new(),
            pending_set: HashSet::new(),
            idle,
            assignment: HashMap::new(),
            by_request: HashMap::new(),
            outstanding: HashMap::new(),
            next_ticket: 1,
        }
    }

    pub(super) fn pool_size(&self) -> usize {
        self.workers.len()
    }

    pub(super) fn enqueue(&mut self, request: Arc<Descriptor>, shared: &Weak<QueueShared>) {
        let id = request.id();
        if self.pending_set.contains(&id) || self.by_request.contains_key(&id) {
            tracing::warn!(request = %id, "request already queued or in flight; ignoring enqueue");
            return;
        }
        tracing::debug!(request = %id, url = %request.params().url, "request enqueued");
        self.pending.push_back(request);
        self.pending_set.insert(id);
        if !self.idle.is_empty() {
            self.assign(shared);
        }
        self.check_invariants();
    }

    /// Binds the oldest pending request to an idle worker and starts it.
    fn assign(&mut self, shared: &Weak<QueueShared>) {
        debug_assert!(!self.idle.is_empty(), "assign without an idle worker");
        debug_assert!(!self.pending.is_empty(), "assign without a pending request");
        let Some(worker) = self.idle.pop() else {
            return;
        };
        let Some(request) = self.pending.pop_front() else {
            self.idle.push(worker);
            return;
        };
        let id = request.id();
        self.pending_set.remove(&id);

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.outstanding.insert(worker, ticket);
        self.by_request.insert(id, worker);

        self.workers[worker.0].configure(request.params());
        tracing::debug!(request = %id, %worker, "request dispatched");
        self.assignment.insert(
            worker,
            Assignment {
                request,
                terminal_seen: false,
            },
        );
        self.workers[worker.0].start(EventSink::new(shared.clone(), worker, ticket));
    }

    /// Returns true when the request was tracked (queued or in flight).
    pub(super) fn cancel(&mut self, id: RequestId) -> bool {
        let tracked = if self.pending_set.remove(&id) {
            self.pending.retain(|r| r.id() != id);
            tracing::debug!(request = %id, "queued request canceled");
            true
        } else if let Some(worker) = self.by_request.remove(&id) {
            // Unbind before asking the worker to stop, so nothing it emits
            // from here on reaches the request.
            self.assignment.remove(&worker);
            self.workers[worker.0].abort();
            tracing::debug!(request = %id, %worker, "in-flight request canceled; worker unwinding");
            true
        } else {
            false
        };
        self.check_invariants();
        tracked
    }

    /// Routes a worker notification to its bound request (compare-and-detach)
    /// and reclaims the worker on `Finished`.
    pub(super) fn relay(
        &mut self,
        worker: WorkerId,
        ticket: Ticket,
        event: FetchEvent,
        shared: &Weak<QueueShared>,
    ) {
        if self.outstanding.get(&worker) != Some(&ticket) {
            tracing::warn!(%worker, kind = event.kind(), "dropping notification from a finished assignment");
            return;
        }
        if let Some(assignment) = self.assignment.get_mut(&worker) {
            if event.is_terminal() {
                if assignment.terminal_seen {
                    tracing::warn!(%worker, request = %assignment.request.id(), "dropping second terminal notification");
                    return;
                }
                assignment.terminal_seen = true;
            }
            assignment.request.deliver(&event);
        }
        if matches!(event, FetchEvent::Finished) {
            self.on_worker_idle(worker, shared);
        }
        self.check_invariants();
    }

    fn on_worker_idle(&mut self, worker: WorkerId, shared: &Weak<QueueShared>) {
        if let Some(assignment) = self.assignment.remove(&worker) {
            let id = assignment.request.id();
            self.by_request.remove(&id);
            tracing::debug!(request = %id, %worker, "request finished");
        }
        self.outstanding.remove(&worker);
        self.idle.push(worker);
        if !self.pending.is_empty() {
            self.assign(shared);
        }
    }

    pub(super) fn snapshot(&self) -> QueueSnapshot {
        let mut assigned: Vec<(WorkerId, RequestId)> = self
            .assignment
            .iter()
            .map(|(w, a)| (*w, a.request.id()))
            .collect();
        assigned.sort();
        QueueSnapshot {
            pool_size: self.workers.len(),
            pending: self.pending.iter().map(|r| r.id()).collect(),
            idle: self.idle.len(),
            assigned,
            detached: self.outstanding.len() - self.assignment.len(),
        }
    }

    /// Structural invariants; a violation is a bug in this module.
    fn check_invariants(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        assert_eq!(self.pending.len(), self.pending_set.len(), "pending/pending_set diverged");
        assert!(
            self.pending.iter().all(|r| self.pending_set.contains(&r.id())),
            "pending/pending_set diverged"
        );
        assert!(
            self.pending_set.iter().all(|id| !self.by_request.contains_key(id)),
            "request both queued and in flight"
        );
        assert_eq!(self.assignment.len(), self.by_request.len(), "assignment index diverged");
        assert!(
            self.assignment
                .iter()
                .all(|(w, a)| self.by_request.get(&a.request.id()) == Some(w)),
            "assignment index diverged"
        );
        assert!(
            self.assignment.keys().all(|w| self.outstanding.contains_key(w)),
            "assigned worker without ticket"
        );
        assert!(
            self.idle.iter().all(|w| !self.outstanding.contains_key(w)),
            "worker both idle and busy"
        );
        assert_eq!(
            self.idle.len() + self.outstanding.len(),
            self.workers.len(),
            "worker pool not partitioned"
        );
        assert!(
            self.idle.is_empty() || self.pending.is_empty(),
            "request waiting while a worker is idle"
        );
    }
}
