use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::models::job::Job;
use crate::models::verification::VerificationKind;

/// Invoked once when the pending verification is proven.
pub type CompletionCallback = Box<dyn FnOnce(&Job, VerificationKind) + Send + 'static>;

struct PendingVerification {
    job: Job,
    kind: VerificationKind,
    on_complete: CompletionCallback,
}

/// Read-only view of the pending verification.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSnapshot {
    pub job: Job,
    pub kind: VerificationKind,
}

/// Handoff slot between the job list and the verification screen.
///
/// Holds at most one pending verification per courier session. A new
/// `set_pending` overwrites the previous one.
#[derive(Default)]
pub struct VerificationContext {
    pending: Mutex<Option<PendingVerification>>,
}

impl VerificationContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<PendingVerification>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_pending(&self, job: Job, kind: VerificationKind, on_complete: CompletionCallback) {
        let mut slot = self.lock();
        if let Some(previous) = slot.as_ref() {
            warn!(
                previous_job = %previous.job.id,
                previous_kind = %previous.kind,
                job_id = %job.id,
                "Overwriting pending verification"
            );
        }
        info!(job_id = %job.id, kind = %kind, "Verification pending");
        *slot = Some(PendingVerification {
            job,
            kind,
            on_complete,
        });
    }

    /// The pending verification; an error when none is set.
    pub fn pending(&self) -> Result<PendingSnapshot, ContextError> {
        self.lock()
            .as_ref()
            .map(|p| PendingSnapshot {
                job: p.job.clone(),
                kind: p.kind,
            })
            .ok_or(ContextError::NoPendingVerification)
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    /// Discard whatever is pending without running its callback.
    pub fn clear(&self) {
        if self.lock().take().is_some() {
            debug!("Pending verification cleared");
        }
    }

    /// Clear only if the pending verification belongs to `job_id`.
    pub fn clear_for(&self, job_id: &str) -> bool {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|p| p.job.id == job_id) {
            *slot = None;
            debug!(job_id, "Pending verification cleared for job");
            true
        } else {
            false
        }
    }

    /// Take the pending verification for (`job_id`, `kind`), run its callback
    /// and leave the slot empty. Returns false when nothing matched, in which
    /// case the slot is left as it was.
    pub fn complete(&self, job_id: &str, kind: VerificationKind) -> bool {
        let taken = {
            let mut slot = self.lock();
            let matches = slot
                .as_ref()
                .is_some_and(|p| p.job.id == job_id && p.kind == kind);
            if matches {
                slot.take()
            } else {
                None
            }
        };

        // Callback runs outside the lock so it may touch the context again.
        match taken {
            Some(pending) => {
                (pending.on_complete)(&pending.job, pending.kind);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ContextError {
    #[error("No verification is pending")]
    NoPendingVerification,
}
