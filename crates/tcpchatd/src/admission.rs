//! Admission control: a hard cap on concurrent sessions.
//!
//! The count covers every admitted connection, including ones still in
//! the name handshake, so the cap also bounds unregistered sockets.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Atomic session counter with a fixed maximum.
#[derive(Debug)]
pub struct Admission {
    count: AtomicUsize,
    max: usize,
}

impl Admission {
    /// Creates a controller admitting at most `max` sessions.
    pub fn new(max: usize) -> Arc<Self> {
        Arc::new(Self {
            count: AtomicUsize::new(0),
            max,
        })
    }

    /// Takes a slot if one is free.
    ///
    /// The check and the increment are one atomic step, so concurrent
    /// accepts can never push the count past `max`.
    pub fn try_admit(self: &Arc<Self>) -> Option<AdmissionPermit> {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.max).then_some(current + 1)
            })
            .ok()
            .map(|_| AdmissionPermit {
                admission: Arc::clone(self),
            })
    }

    /// Current number of admitted sessions.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Configured maximum.
    pub fn max(&self) -> usize {
        self.max
    }

    fn release(&self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}

/// One admitted session's slot. Dropping it releases the slot, which
/// happens exactly once per admitted connection.
#[derive(Debug)]
pub struct AdmissionPermit {
    admission: Arc<Admission>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.admission.release();
    }
}
