//! Uploads currently waiting on the service.
//!
//! While a save is in flight its queued snapshot cannot tell a delete
//! whether the record will exist remotely. A delete that lands in that
//! window marks the upload instead, and the uploader deletes the record
//! from the service once its save returns.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use recsync_core::RecordId;

#[derive(Debug, Default)]
struct State {
    next: u64,
    /// Open tickets per record: (ticket, deleted while in flight).
    uploads: HashMap<RecordId, Vec<(u64, bool)>>,
}

#[derive(Debug, Default)]
pub(crate) struct InFlightUploads {
    state: Mutex<State>,
}

impl InFlightUploads {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a save of `id` that is about to be sent.
    pub(crate) fn begin(&self, id: &RecordId) -> InFlightGuard<'_> {
        let mut state = self.lock();
        let ticket = state.next;
        state.next = state.next.wrapping_add(1);
        state
            .uploads
            .entry(id.clone())
            .or_default()
            .push((ticket, false));
        InFlightGuard {
            owner: self,
            id: id.clone(),
            ticket,
            finished: false,
        }
    }

    /// Flag every save of `id` in flight as deleted. Returns false when
    /// nothing is in flight.
    pub(crate) fn mark_deleted(&self, id: &RecordId) -> bool {
        let mut state = self.lock();
        match state.uploads.get_mut(id) {
            Some(tickets) if !tickets.is_empty() => {
                for (_, deleted) in tickets.iter_mut() {
                    *deleted = true;
                }
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().uploads.values().map(Vec::len).sum()
    }

    fn release(&self, id: &RecordId, ticket: u64) -> bool {
        let mut state = self.lock();
        let Some(tickets) = state.uploads.get_mut(id) else {
            return false;
        };
        let deleted = tickets
            .iter()
            .position(|(t, _)| *t == ticket)
            .map(|i| tickets.remove(i).1)
            .unwrap_or(false);
        if tickets.is_empty() {
            state.uploads.remove(id);
        }
        deleted
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An in-flight save. Dropping it without [`finish`](Self::finish) still
/// releases the ticket.
#[derive(Debug)]
pub(crate) struct InFlightGuard<'a> {
    owner: &'a InFlightUploads,
    id: RecordId,
    ticket: u64,
    finished: bool,
}

impl InFlightGuard<'_> {
    /// Release the ticket. Returns true if the record was deleted while the
    /// save was in flight.
    pub(crate) fn finish(mut self) -> bool {
        self.finished = true;
        self.owner.release(&self.id, self.ticket)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.owner.release(&self.id, self.ticket);
        }
    }
}
